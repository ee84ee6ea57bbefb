use std::sync::Arc;

use serde::Serialize;

use lms_core::{
    model::{
        Course, CourseId, CourseProgress, CourseProgressSummary, Enrollment, EnrollmentStatus,
        LearnerId, Lesson, LessonId, LessonProgress,
    },
    time::Clock,
};
use storage::repository::{
    CourseCatalog, EnrollmentRepository, LessonProgressRepository, StorageError,
};

use crate::completion_service::CompletionDetector;
use crate::enrollment_service::EnrollmentStateMachine;
use crate::error::{Precondition, ProgressError, Resource};

//
// ─── RESULTS ───────────────────────────────────────────────────────────────────
//

/// Result of completing or uncompleting a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonUpdate {
    pub ok: bool,
    /// The lesson was already in the requested state; nothing was written.
    pub already_in_state: bool,
    pub message: String,
    /// This call completed the whole course.
    pub course_completed: bool,
}

impl LessonUpdate {
    fn applied(message: &str, course_completed: bool) -> Self {
        Self {
            ok: true,
            already_in_state: false,
            message: message.to_owned(),
            course_completed,
        }
    }

    fn unchanged(message: &str) -> Self {
        Self {
            ok: true,
            already_in_state: true,
            message: message.to_owned(),
            course_completed: false,
        }
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Records lesson completion and reports per-course progress.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    catalog: Arc<dyn CourseCatalog>,
    enrollments: Arc<dyn EnrollmentRepository>,
    progress: Arc<dyn LessonProgressRepository>,
    state_machine: Arc<EnrollmentStateMachine>,
    detector: Arc<CompletionDetector>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CourseCatalog>,
        enrollments: Arc<dyn EnrollmentRepository>,
        progress: Arc<dyn LessonProgressRepository>,
        state_machine: Arc<EnrollmentStateMachine>,
        detector: Arc<CompletionDetector>,
    ) -> Self {
        Self {
            clock,
            catalog,
            enrollments,
            progress,
            state_machine,
            detector,
        }
    }

    /// Mark a lesson completed and, if it was the last one, complete the
    /// course.
    ///
    /// A lesson that is already completed keeps its original `completed_at`.
    ///
    /// # Errors
    ///
    /// - `NotFound(Course)` / `NotFound(Lesson)` for unknown ids or a lesson
    ///   of another course.
    /// - `Precondition(EnrollmentRequired)` without an active or completed
    ///   enrollment.
    /// - `Completion` if the enrollment transition or certificate issuance
    ///   fails after the progress was saved.
    pub async fn complete_lesson(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonUpdate, ProgressError> {
        let course = self.require_course(course_id).await?;
        self.require_enrollment(learner_id, course_id).await?;
        self.require_lesson(lesson_id, course_id).await?;

        let now = self.clock.now();
        let record = match self.progress.find_progress(learner_id, lesson_id).await? {
            Some(mut existing) => {
                if !existing.complete(now) {
                    tracing::debug!(learner = %learner_id, lesson = %lesson_id, "lesson already completed");
                    return Ok(LessonUpdate::unchanged("Lesson already completed"));
                }
                existing
            }
            None => LessonProgress::completed(learner_id, lesson_id, now),
        };
        self.progress.save_progress(&record).await?;

        let outcome = self.detector.on_lesson_completed(learner_id, &course).await?;
        let message = if outcome.newly_completed {
            "Lesson completed; course completed"
        } else {
            "Lesson completed"
        };
        Ok(LessonUpdate::applied(message, outcome.newly_completed))
    }

    /// Clear a lesson's completion. A completed course drops back to active;
    /// its certificate is left in place.
    ///
    /// # Errors
    ///
    /// Same as `complete_lesson`, plus `NotFound(Progress)` when the learner
    /// never touched the lesson.
    pub async fn uncomplete_lesson(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonUpdate, ProgressError> {
        self.require_course(course_id).await?;
        let enrollment = self.require_enrollment(learner_id, course_id).await?;
        self.require_lesson(lesson_id, course_id).await?;

        let mut record = self
            .progress
            .find_progress(learner_id, lesson_id)
            .await?
            .ok_or(ProgressError::NotFound(Resource::Progress))?;

        let changed = record.uncomplete();
        if changed {
            self.progress.save_progress(&record).await?;
        }

        if enrollment.status() == EnrollmentStatus::Completed {
            // Lost swaps are fine: someone else already reverted it.
            if self
                .state_machine
                .revert_to_active(&enrollment)
                .await?
                .is_some()
            {
                tracing::info!(learner = %learner_id, course = %course_id, "course reopened");
            }
        }

        if changed {
            Ok(LessonUpdate::applied("Lesson completion undone", false))
        } else {
            Ok(LessonUpdate::unchanged("Lesson was not completed"))
        }
    }

    /// Per-lesson progress for one enrolled course.
    ///
    /// # Errors
    ///
    /// `NotFound(Course)` or `Precondition(EnrollmentRequired)`.
    pub async fn get_course_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressError> {
        let course = self.require_course(course_id).await?;
        self.require_enrollment(learner_id, course_id).await?;

        let lessons = self.catalog.list_published_lessons(course_id).await?;
        let records = self
            .progress
            .list_course_progress(learner_id, course_id)
            .await?;
        Ok(CourseProgress::from_lessons(&course, &lessons, &records))
    }

    /// Course-level summaries for every enrollment, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if any lookup fails.
    pub async fn get_my_progress(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<CourseProgressSummary>, ProgressError> {
        let enrollments = self.enrollments.list_enrollments(learner_id).await?;
        let mut out = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let Some(course) = self.catalog.get_course(enrollment.course_id()).await? else {
                tracing::warn!(course = %enrollment.course_id(), "enrollment references missing course");
                continue;
            };
            let total = self.catalog.list_published_lessons(course.id).await?.len();
            let total = u32::try_from(total)
                .map_err(|_| StorageError::Serialization(format!("lesson count overflow: {total}")))?;
            let completed = self.progress.count_completed(learner_id, course.id).await?;
            out.push(CourseProgressSummary::new(&course, total, completed));
        }
        Ok(out)
    }

    async fn require_course(&self, course_id: CourseId) -> Result<Course, ProgressError> {
        self.catalog
            .get_course(course_id)
            .await?
            .ok_or(ProgressError::NotFound(Resource::Course))
    }

    async fn require_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Enrollment, ProgressError> {
        self.enrollments
            .find_enrollment(learner_id, course_id)
            .await?
            .filter(Enrollment::allows_progress)
            .ok_or(ProgressError::Precondition(Precondition::EnrollmentRequired))
    }

    async fn require_lesson(
        &self,
        lesson_id: LessonId,
        course_id: CourseId,
    ) -> Result<Lesson, ProgressError> {
        self.catalog
            .get_lesson(lesson_id)
            .await?
            .filter(|lesson| lesson.belongs_to(course_id))
            .ok_or(ProgressError::NotFound(Resource::Lesson))
    }
}
