use std::sync::Arc;

use serde::Serialize;

use lms_core::{
    model::{LearnerId, NewNotification, Notification, NotificationType},
    time::Clock,
};
use storage::repository::{NotificationRepository, StorageError};

/// A user's notifications together with how many are still unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inbox {
    pub unread: u64,
    pub notifications: Vec<Notification>,
}

/// Best-effort writer for user notifications.
#[derive(Clone)]
pub struct NotificationEmitter {
    clock: Clock,
    notifications: Arc<dyn NotificationRepository>,
}

impl NotificationEmitter {
    #[must_use]
    pub fn new(clock: Clock, notifications: Arc<dyn NotificationRepository>) -> Self {
        Self {
            clock,
            notifications,
        }
    }

    /// Append a notification to the user's inbox.
    ///
    /// Failures are logged and swallowed; `None` means nothing was stored.
    pub async fn emit(
        &self,
        user_id: LearnerId,
        title: &str,
        message: &str,
        kind: NotificationType,
        link: Option<&str>,
    ) -> Option<Notification> {
        let draft = match NewNotification::new(
            user_id,
            title,
            message,
            kind,
            link.map(str::to_owned),
            self.clock.now(),
        ) {
            Ok(draft) => draft,
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "dropping invalid notification");
                return None;
            }
        };

        match self.notifications.append_notification(draft).await {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::warn!(user = %user_id, error = %err, "failed to store notification");
                None
            }
        }
    }

    /// # Errors
    ///
    /// Returns `StorageError` if the inbox cannot be read.
    pub async fn inbox(&self, user_id: LearnerId) -> Result<Inbox, StorageError> {
        let notifications = self.notifications.list_notifications(user_id).await?;
        let unread = self.notifications.unread_count(user_id).await?;
        Ok(Inbox {
            unread,
            notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn emit_appends_unread_notification() {
        let repo = InMemoryRepository::new();
        let emitter = NotificationEmitter::new(Clock::fixed(fixed_now()), Arc::new(repo));
        let user = LearnerId::new(3);

        let stored = emitter
            .emit(user, "Hello", "World", NotificationType::Info, None)
            .await
            .expect("stored");
        assert_eq!(stored.created_at, fixed_now());
        assert!(!stored.read);

        let inbox = emitter.inbox(user).await.unwrap();
        assert_eq!(inbox.unread, 1);
        assert_eq!(inbox.notifications, vec![stored]);
    }

    #[tokio::test]
    async fn blank_title_is_swallowed() {
        let repo = InMemoryRepository::new();
        let emitter = NotificationEmitter::new(Clock::fixed(fixed_now()), Arc::new(repo));

        let stored = emitter
            .emit(LearnerId::new(3), "  ", "body", NotificationType::Info, None)
            .await;
        assert!(stored.is_none());
        assert_eq!(emitter.inbox(LearnerId::new(3)).await.unwrap().unread, 0);
    }
}
