use lms_core::model::{LearnerId, NewNotification, Notification, NotificationId};

use super::{
    SqliteRepository,
    mapping::{db_err, id_i64, map_notification_row},
};
use crate::repository::{NotificationRepository, StorageError};

#[async_trait::async_trait]
impl NotificationRepository for SqliteRepository {
    async fn append_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO notifications (user_id, title, message, type, is_read, link, created_at)
                VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)
            ",
        )
        .bind(id_i64("user_id", notification.user_id.value())?)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(notification.link.as_deref())
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("notification_id sign overflow".into()))?;
        Ok(notification.assign_id(NotificationId::new(id)))
    }

    async fn list_notifications(
        &self,
        user_id: LearnerId,
    ) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, user_id, title, message, type, is_read, link, created_at
                FROM notifications
                WHERE user_id = ?1
                ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_notification_row).collect()
    }

    async fn unread_count(&self, user_id: LearnerId) -> Result<u64, StorageError> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        )
        .bind(id_i64("user_id", user_id.value())?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        u64::try_from(n).map_err(|_| StorageError::Serialization(format!("invalid unread count: {n}")))
    }
}
