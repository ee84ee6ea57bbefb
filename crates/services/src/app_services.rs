use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::certificate_service::CertificateIssuer;
use crate::completion_service::CompletionDetector;
use crate::enrollment_service::EnrollmentStateMachine;
use crate::error::AppServicesError;
use crate::notification_service::NotificationEmitter;
use crate::progress_service::ProgressTracker;

/// Wires every service against one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    progress: Arc<ProgressTracker>,
    certificates: Arc<CertificateIssuer>,
    notifications: Arc<NotificationEmitter>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock) -> Self {
        let enrollments = Arc::new(EnrollmentStateMachine::new(
            clock,
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.completion),
        ));
        let certificates = Arc::new(CertificateIssuer::new(
            clock,
            Arc::clone(&storage.certificates),
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.learners),
        ));
        let notifications = Arc::new(NotificationEmitter::new(
            clock,
            Arc::clone(&storage.notifications),
        ));
        let detector = Arc::new(CompletionDetector::new(
            Arc::clone(&enrollments),
            Arc::clone(&certificates),
            Arc::clone(&notifications),
            Arc::clone(&storage.learners),
        ));
        let progress = Arc::new(ProgressTracker::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.progress),
            enrollments,
            detector,
        ));

        Self {
            storage,
            progress,
            certificates,
            notifications,
        }
    }

    /// Raw repositories, for seeding and administrative reads.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateIssuer> {
        Arc::clone(&self.certificates)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationEmitter> {
        Arc::clone(&self.notifications)
    }
}
