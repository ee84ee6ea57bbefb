use lms_core::model::{
    Certificate, CertificateId, CertificateNumber, CourseId, Enrollment, EnrollmentStatus,
    LearnerId, Lesson, LessonId, LessonProgress, Notification, NotificationId, NotificationType,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors; uniqueness violations become `StorageError::Conflict`.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn count_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn learner_id(row: &SqliteRow, column: &str) -> Result<LearnerId, StorageError> {
    let raw: i64 = row.try_get(column).map_err(ser)?;
    Ok(LearnerId::new(i64_to_u64("learner_id", raw)?))
}

fn course_id(row: &SqliteRow) -> Result<CourseId, StorageError> {
    let raw: i64 = row.try_get("course_id").map_err(ser)?;
    Ok(CourseId::new(i64_to_u64("course_id", raw)?))
}

fn lesson_id(row: &SqliteRow, column: &str) -> Result<LessonId, StorageError> {
    let raw: i64 = row.try_get(column).map_err(ser)?;
    Ok(LessonId::new(i64_to_u64("lesson_id", raw)?))
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    Ok(Lesson {
        id: lesson_id(row, "id")?,
        course_id: course_id(row)?,
        title: row.try_get("title").map_err(ser)?,
        sort_order: row.try_get("sort_order").map_err(ser)?,
        published: row.try_get("published").map_err(ser)?,
    })
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let status: String = row.try_get("status").map_err(ser)?;
    Enrollment::from_persisted(
        learner_id(row, "learner_id")?,
        course_id(row)?,
        EnrollmentStatus::parse(&status).map_err(ser)?,
        row.try_get("enrolled_at").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    LessonProgress::from_persisted(
        learner_id(row, "learner_id")?,
        lesson_id(row, "lesson_id")?,
        row.try_get("completed").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_certificate_row(row: &SqliteRow) -> Result<Certificate, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let number: String = row.try_get("certificate_number").map_err(ser)?;
    Ok(Certificate {
        id: CertificateId::new(i64_to_u64("certificate_id", id)?),
        learner_id: learner_id(row, "learner_id")?,
        course_id: course_id(row)?,
        certificate_number: CertificateNumber::parse(&number).map_err(ser)?,
        issued_at: row.try_get("issued_at").map_err(ser)?,
    })
}

pub(crate) fn map_notification_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let kind: String = row.try_get("type").map_err(ser)?;
    Ok(Notification {
        id: NotificationId::new(i64_to_u64("notification_id", id)?),
        user_id: learner_id(row, "user_id")?,
        title: row.try_get("title").map_err(ser)?,
        message: row.try_get("message").map_err(ser)?,
        kind: NotificationType::parse(&kind).map_err(ser)?,
        read: row.try_get("is_read").map_err(ser)?,
        link: row.try_get("link").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}
