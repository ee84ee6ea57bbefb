use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::{CourseId, LearnerId};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// A transition the enrollment lifecycle does not allow.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot move enrollment from {from} to {to}")]
pub struct EnrollmentTransitionError {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnrollmentStateError {
    #[error("completed enrollment is missing completed_at")]
    MissingCompletedAt,

    #[error("{0} enrollment carries completed_at")]
    UnexpectedCompletedAt(EnrollmentStatus),

    #[error("invalid enrollment status: {0}")]
    InvalidStatus(String),
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Lifecycle status of a learner's enrollment in a course.
///
/// `Dropped` is owned by the enrollment flow; the completion pipeline never
/// enters or leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }

    /// Parse the storage representation produced by [`EnrollmentStatus::as_str`].
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentStateError::InvalidStatus` for unknown values.
    pub fn parse(s: &str) -> Result<Self, EnrollmentStateError> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "dropped" => Ok(Self::Dropped),
            other => Err(EnrollmentStateError::InvalidStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── ENROLLMENT ───────────────────────────────────────────────────────────────
//

/// Record linking a learner to a course.
///
/// Invariant: `completed_at` is set if and only if the status is `Completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    learner_id: LearnerId,
    course_id: CourseId,
    status: EnrollmentStatus,
    enrolled_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// A fresh, active enrollment.
    #[must_use]
    pub fn new(learner_id: LearnerId, course_id: CourseId, enrolled_at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            course_id,
            status: EnrollmentStatus::Active,
            enrolled_at,
            completed_at: None,
        }
    }

    /// Rehydrate an enrollment from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentStateError` if status and `completed_at` disagree.
    pub fn from_persisted(
        learner_id: LearnerId,
        course_id: CourseId,
        status: EnrollmentStatus,
        enrolled_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, EnrollmentStateError> {
        match (status, completed_at) {
            (EnrollmentStatus::Completed, None) => Err(EnrollmentStateError::MissingCompletedAt),
            (EnrollmentStatus::Active | EnrollmentStatus::Dropped, Some(_)) => {
                Err(EnrollmentStateError::UnexpectedCompletedAt(status))
            }
            _ => Ok(Self {
                learner_id,
                course_id,
                status,
                enrolled_at,
                completed_at,
            }),
        }
    }

    /// `Active -> Completed`, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentTransitionError` unless the enrollment is `Active`.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), EnrollmentTransitionError> {
        self.require(EnrollmentStatus::Active, EnrollmentStatus::Completed)?;
        self.status = EnrollmentStatus::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// `Completed -> Active`, clearing `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentTransitionError` unless the enrollment is `Completed`.
    pub fn revert_to_active(&mut self) -> Result<(), EnrollmentTransitionError> {
        self.require(EnrollmentStatus::Completed, EnrollmentStatus::Active)?;
        self.status = EnrollmentStatus::Active;
        self.completed_at = None;
        Ok(())
    }

    fn require(
        &self,
        expected: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<(), EnrollmentTransitionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(EnrollmentTransitionError {
                from: self.status,
                to,
            })
        }
    }

    /// Whether lesson progress may be recorded against this enrollment.
    #[must_use]
    pub fn allows_progress(&self) -> bool {
        matches!(
            self.status,
            EnrollmentStatus::Active | EnrollmentStatus::Completed
        )
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn enrolled_at(&self) -> DateTime<Utc> {
        self.enrolled_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
