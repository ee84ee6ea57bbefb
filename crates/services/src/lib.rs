#![forbid(unsafe_code)]

pub mod app_services;
pub mod certificate_service;
pub mod completion_service;
pub mod enrollment_service;
pub mod error;
pub mod notification_service;
pub mod progress_service;

pub use lms_core::Clock;

pub use app_services::AppServices;
pub use certificate_service::{CertificateIssuer, Issuance};
pub use completion_service::{CompletionDetector, CompletionOutcome};
pub use enrollment_service::EnrollmentStateMachine;
pub use error::{
    AppServicesError, CertificateError, CompletionError, EnrollmentError, Precondition,
    ProgressError, Resource,
};
pub use notification_service::{Inbox, NotificationEmitter};
pub use progress_service::{LessonUpdate, ProgressTracker};
