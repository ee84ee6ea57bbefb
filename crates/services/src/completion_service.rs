use std::sync::Arc;

use serde::Serialize;

use lms_core::model::{Certificate, Course, LearnerId, NotificationType};
use storage::repository::UserDirectory;

use crate::certificate_service::CertificateIssuer;
use crate::enrollment_service::EnrollmentStateMachine;
use crate::error::CompletionError;
use crate::notification_service::NotificationEmitter;

pub const COMPLETION_TITLE: &str = "Course completed";
pub const CERTIFICATES_LINK: &str = "/my-certificates";

/// What one completion check did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionOutcome {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    /// This call moved the enrollment to `Completed`.
    pub newly_completed: bool,
    pub certificate: Option<Certificate>,
}

/// Reacts to a newly completed lesson: completes the enrollment, issues the
/// certificate and notifies the learner.
///
/// The three steps run in sequence without a shared transaction. A failed
/// issuance leaves the enrollment `Completed`, and a failed notification is
/// only logged.
#[derive(Clone)]
pub struct CompletionDetector {
    enrollments: Arc<EnrollmentStateMachine>,
    certificates: Arc<CertificateIssuer>,
    notifications: Arc<NotificationEmitter>,
    learners: Arc<dyn UserDirectory>,
}

impl CompletionDetector {
    #[must_use]
    pub fn new(
        enrollments: Arc<EnrollmentStateMachine>,
        certificates: Arc<CertificateIssuer>,
        notifications: Arc<NotificationEmitter>,
        learners: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            enrollments,
            certificates,
            notifications,
            learners,
        }
    }

    /// # Errors
    ///
    /// Returns `CompletionError` if the transition or the certificate write
    /// fails. Notification failures never surface here.
    pub async fn on_lesson_completed(
        &self,
        learner_id: LearnerId,
        course: &Course,
    ) -> Result<CompletionOutcome, CompletionError> {
        let check = self
            .enrollments
            .settle_completion(learner_id, course.id)
            .await?;
        let mut outcome = CompletionOutcome {
            total_lessons: check.total_lessons,
            completed_lessons: check.completed_lessons,
            newly_completed: check.transitioned.is_some(),
            certificate: None,
        };
        if !outcome.newly_completed {
            tracing::debug!(
                learner = %learner_id,
                course = %course.id,
                completed = check.completed_lessons,
                total = check.total_lessons,
                "course not newly completed"
            );
            return Ok(outcome);
        }
        tracing::info!(learner = %learner_id, course = %course.id, "course completed");

        let Some(learner) = self.learners.get_learner(learner_id).await? else {
            tracing::warn!(
                learner = %learner_id,
                course = %course.id,
                "learner missing from directory; skipping certificate"
            );
            return Ok(outcome);
        };

        let issuance = self
            .certificates
            .issue_if_absent(learner.id, course.id)
            .await?;

        let message = format!("Your certificate for \"{}\" has been issued.", course.title);
        self.notifications
            .emit(
                learner.id,
                COMPLETION_TITLE,
                &message,
                NotificationType::Certificate,
                Some(CERTIFICATES_LINK),
            )
            .await;

        outcome.certificate = Some(issuance.certificate);
        Ok(outcome)
    }
}
