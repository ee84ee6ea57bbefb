//! Shared error types for the services crate.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use lms_core::model::EnrollmentTransitionError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Records a lookup can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resource {
    Course,
    Lesson,
    Progress,
    Certificate,
    Learner,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Course => "course",
            Self::Lesson => "lesson",
            Self::Progress => "lesson progress",
            Self::Certificate => "certificate",
            Self::Learner => "learner",
        };
        f.write_str(name)
    }
}

/// Caller-side conditions that must hold before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Precondition {
    /// No ACTIVE or COMPLETED enrollment for the (learner, course) pair.
    EnrollmentRequired,
    /// The record belongs to a different learner.
    NotOwner,
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnrollmentRequired => f.write_str("learner is not enrolled in this course"),
            Self::NotOwner => f.write_str("record belongs to another learner"),
        }
    }
}

/// Errors emitted by `EnrollmentStateMachine`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error(transparent)]
    Transition(#[from] EnrollmentTransitionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CertificateIssuer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("precondition failed: {0}")]
    Precondition(Precondition),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CompletionDetector`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error(transparent)]
    Certificate(#[from] CertificateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressTracker`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("{0} not found")]
    NotFound(Resource),
    #[error("precondition failed: {0}")]
    Precondition(Precondition),
    #[error(transparent)]
    Transition(#[from] EnrollmentTransitionError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

impl From<EnrollmentError> for ProgressError {
    fn from(err: EnrollmentError) -> Self {
        match err {
            EnrollmentError::Transition(e) => Self::Transition(e),
            EnrollmentError::Storage(e) => Self::Storage(e),
        }
    }
}
