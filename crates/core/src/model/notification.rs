use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LearnerId, NotificationId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("notification title cannot be empty")]
    EmptyTitle,

    #[error("invalid notification type: {0}")]
    InvalidType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    Info,
    Certificate,
}

impl NotificationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Info => "INFO",
            NotificationType::Certificate => "CERTIFICATE",
        }
    }

    /// # Errors
    ///
    /// Returns `NotificationError::InvalidType` for unknown values.
    pub fn parse(s: &str) -> Result<Self, NotificationError> {
        match s {
            "INFO" => Ok(Self::Info),
            "CERTIFICATE" => Ok(Self::Certificate),
            other => Err(NotificationError::InvalidType(other.to_owned())),
        }
    }
}

/// A notice waiting to be appended to a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: LearnerId,
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    /// # Errors
    ///
    /// Returns `NotificationError::EmptyTitle` if the title is blank.
    pub fn new(
        user_id: LearnerId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationType,
        link: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, NotificationError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(NotificationError::EmptyTitle);
        }
        Ok(Self {
            user_id,
            title,
            message: message.into(),
            kind,
            link,
            created_at,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: NotificationId) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            read: false,
            link: self.link,
            created_at: self.created_at,
        }
    }
}

/// A stored notification. New notifications always start unread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: LearnerId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn blank_title_is_rejected() {
        let err = NewNotification::new(
            LearnerId::new(1),
            "  ",
            "body",
            NotificationType::Info,
            None,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, NotificationError::EmptyTitle);
    }

    #[test]
    fn stored_notifications_start_unread() {
        let n = NewNotification::new(
            LearnerId::new(1),
            "Course completed",
            "well done",
            NotificationType::Certificate,
            Some("/my-certificates".into()),
            fixed_now(),
        )
        .unwrap()
        .assign_id(NotificationId::new(5));

        assert!(!n.read);
        assert_eq!(n.kind.as_str(), "CERTIFICATE");
        assert_eq!(NotificationType::parse("CERTIFICATE").unwrap(), n.kind);
    }
}
