use std::sync::Arc;

use lms_core::{
    model::{CourseId, Enrollment, EnrollmentStatus, LearnerId},
    time::Clock,
};
use storage::repository::{CompletionCheck, CompletionPersistence, EnrollmentRepository};

use crate::error::EnrollmentError;

/// Drives the `Active <-> Completed` half of the enrollment lifecycle.
///
/// Every write is a compare-and-swap on the prior status, so a caller that
/// loses a race gets `Ok(None)` instead of overwriting the winner.
#[derive(Clone)]
pub struct EnrollmentStateMachine {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
    completion: Arc<dyn CompletionPersistence>,
}

impl EnrollmentStateMachine {
    #[must_use]
    pub fn new(
        clock: Clock,
        enrollments: Arc<dyn EnrollmentRepository>,
        completion: Arc<dyn CompletionPersistence>,
    ) -> Self {
        Self {
            clock,
            enrollments,
            completion,
        }
    }

    /// Move an `Active` enrollment to `Completed`.
    ///
    /// Returns the written enrollment, or `None` if the stored status was no
    /// longer `Active` when the write landed.
    ///
    /// This does not recheck lesson counts. The lesson pipeline completes
    /// courses through [`Self::settle_completion`]; use this for direct
    /// administrative transitions.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Transition` if `enrollment` is not `Active`,
    /// or `EnrollmentError::Storage` if the write fails.
    pub async fn mark_completed(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Option<Enrollment>, EnrollmentError> {
        let mut next = enrollment.clone();
        next.mark_completed(self.clock.now())?;
        self.swap(EnrollmentStatus::Active, next).await
    }

    /// Move a `Completed` enrollment back to `Active`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Transition` if `enrollment` is not
    /// `Completed`, or `EnrollmentError::Storage` if the write fails.
    pub async fn revert_to_active(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Option<Enrollment>, EnrollmentError> {
        let mut next = enrollment.clone();
        next.revert_to_active()?;
        self.swap(EnrollmentStatus::Completed, next).await
    }

    /// Recount the learner's published lessons and complete the enrollment
    /// in one storage transaction when every lesson is done.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Storage` if the enrollment is missing or the
    /// transaction fails.
    pub async fn settle_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<CompletionCheck, EnrollmentError> {
        Ok(self
            .completion
            .settle_completion(learner_id, course_id, self.clock.now())
            .await?)
    }

    async fn swap(
        &self,
        expected: EnrollmentStatus,
        next: Enrollment,
    ) -> Result<Option<Enrollment>, EnrollmentError> {
        if self.enrollments.transition_enrollment(expected, &next).await? {
            tracing::debug!(
                learner = %next.learner_id(),
                course = %next.course_id(),
                from = %expected,
                to = %next.status(),
                "enrollment transitioned"
            );
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn machine(repo: &InMemoryRepository) -> EnrollmentStateMachine {
        EnrollmentStateMachine::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn mark_then_revert_round_trips_status() {
        let repo = InMemoryRepository::new();
        let active = Enrollment::new(LearnerId::new(1), CourseId::new(1), fixed_now());
        repo.save_enrollment(&active).await.unwrap();
        let sm = machine(&repo);

        let completed = sm.mark_completed(&active).await.unwrap().expect("won");
        assert_eq!(completed.status(), EnrollmentStatus::Completed);
        assert_eq!(completed.completed_at(), Some(fixed_now()));

        let reverted = sm.revert_to_active(&completed).await.unwrap().expect("won");
        assert_eq!(reverted.status(), EnrollmentStatus::Active);
        assert_eq!(reverted.completed_at(), None);
    }

    #[tokio::test]
    async fn stale_snapshot_loses_the_swap() {
        let repo = InMemoryRepository::new();
        let active = Enrollment::new(LearnerId::new(1), CourseId::new(1), fixed_now());
        repo.save_enrollment(&active).await.unwrap();
        let sm = machine(&repo);

        assert!(sm.mark_completed(&active).await.unwrap().is_some());
        // Same stale `Active` snapshot: the stored row is already `Completed`.
        assert!(sm.mark_completed(&active).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn illegal_transition_is_typed() {
        let repo = InMemoryRepository::new();
        let active = Enrollment::new(LearnerId::new(1), CourseId::new(1), fixed_now());
        repo.save_enrollment(&active).await.unwrap();

        let err = machine(&repo).revert_to_active(&active).await.unwrap_err();
        assert!(matches!(
            err,
            EnrollmentError::Transition(e)
                if e.from == EnrollmentStatus::Active && e.to == EnrollmentStatus::Active
        ));
    }
}
