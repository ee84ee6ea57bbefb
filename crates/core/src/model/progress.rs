use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{LearnerId, LessonId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressStateError {
    #[error("completed lesson progress is missing completed_at")]
    MissingCompletedAt,

    #[error("incomplete lesson progress carries completed_at")]
    UnexpectedCompletedAt,
}

//
// ─── LESSON PROGRESS ──────────────────────────────────────────────────────────
//

/// Per-learner completion record for a single lesson.
///
/// `completed_at` is the single source of truth: a record is completed exactly
/// when it carries a completion timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonProgress {
    learner_id: LearnerId,
    lesson_id: LessonId,
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// First completion attempt for a (learner, lesson) pair.
    #[must_use]
    pub fn completed(learner_id: LearnerId, lesson_id: LessonId, at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            lesson_id,
            completed_at: Some(at),
        }
    }

    /// Rehydrate a record from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStateError` if the flag and timestamp disagree.
    pub fn from_persisted(
        learner_id: LearnerId,
        lesson_id: LessonId,
        completed: bool,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressStateError> {
        match (completed, completed_at) {
            (true, None) => Err(ProgressStateError::MissingCompletedAt),
            (false, Some(_)) => Err(ProgressStateError::UnexpectedCompletedAt),
            _ => Ok(Self {
                learner_id,
                lesson_id,
                completed_at,
            }),
        }
    }

    /// Mark the lesson completed at `at`.
    ///
    /// Returns `false` and leaves the original timestamp alone when the record
    /// was already completed.
    pub fn complete(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_completed() {
            return false;
        }
        self.completed_at = Some(at);
        true
    }

    /// Clear completion. Returns `true` if the record was completed before.
    pub fn uncomplete(&mut self) -> bool {
        self.completed_at.take().is_some()
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
