use chrono::{DateTime, Utc};
use lms_core::model::{CourseId, LearnerId, LessonId, LessonProgress};

use super::{
    SqliteRepository,
    mapping::{count_u32, db_err, id_i64, map_enrollment_row, map_progress_row},
};
use crate::repository::{
    CompletionCheck, CompletionPersistence, LessonProgressRepository, StorageError,
};

const COUNT_PUBLISHED: &str = r"
    SELECT COUNT(*) FROM lessons
    WHERE course_id = ?1 AND published = 1
";

const COUNT_COMPLETED: &str = r"
    SELECT COUNT(*)
    FROM lesson_progress p
    JOIN lessons l ON l.id = p.lesson_id
    WHERE p.learner_id = ?1 AND l.course_id = ?2 AND l.published = 1 AND p.completed = 1
";

const SETTLE_COMPLETION: &str = r"
    UPDATE enrollments
    SET status = 'completed', completed_at = ?3
    WHERE learner_id = ?1 AND course_id = ?2 AND status = 'active'
      AND (SELECT COUNT(*) FROM lessons WHERE course_id = ?2 AND published = 1) > 0
      AND (
          SELECT COUNT(*)
          FROM lesson_progress p
          JOIN lessons l ON l.id = p.lesson_id
          WHERE p.learner_id = ?1 AND l.course_id = ?2 AND l.published = 1 AND p.completed = 1
      ) >= (SELECT COUNT(*) FROM lessons WHERE course_id = ?2 AND published = 1)
    RETURNING learner_id, course_id, status, enrolled_at, completed_at
";

#[async_trait::async_trait]
impl LessonProgressRepository for SqliteRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT learner_id, lesson_id, completed, completed_at
                FROM lesson_progress
                WHERE learner_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO lesson_progress (learner_id, lesson_id, completed, completed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(learner_id, lesson_id) DO UPDATE SET
                    completed = excluded.completed,
                    completed_at = excluded.completed_at
            ",
        )
        .bind(id_i64("learner_id", progress.learner_id().value())?)
        .bind(id_i64("lesson_id", progress.lesson_id().value())?)
        .bind(progress.is_completed())
        .bind(progress.completed_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_course_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT p.learner_id, p.lesson_id, p.completed, p.completed_at
                FROM lesson_progress p
                JOIN lessons l ON l.id = p.lesson_id
                WHERE p.learner_id = ?1 AND l.course_id = ?2
                ORDER BY l.sort_order ASC, l.id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_progress_row).collect()
    }

    async fn count_completed(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<u32, StorageError> {
        let n: i64 = sqlx::query_scalar(COUNT_COMPLETED)
            .bind(id_i64("learner_id", learner_id.value())?)
            .bind(id_i64("course_id", course_id.value())?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        count_u32("completed_lessons", n)
    }
}

#[async_trait::async_trait]
impl CompletionPersistence for SqliteRepository {
    async fn settle_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CompletionCheck, StorageError> {
        let learner = id_i64("learner_id", learner_id.value())?;
        let course = id_i64("course_id", course_id.value())?;

        // Recheck and transition in one statement. A write statement takes
        // the write lock before reading, so a concurrent winner is seen as
        // zero rows instead of a stale-snapshot `SQLITE_BUSY`.
        let transitioned = sqlx::query(SETTLE_COMPLETION)
            .bind(learner)
            .bind(course)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(map_enrollment_row)
            .transpose()?;

        if transitioned.is_none() {
            let exists = sqlx::query(
                "SELECT 1 FROM enrollments WHERE learner_id = ?1 AND course_id = ?2",
            )
            .bind(learner)
            .bind(course)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            if exists.is_none() {
                return Err(StorageError::NotFound);
            }
        }

        let total: i64 = sqlx::query_scalar(COUNT_PUBLISHED)
            .bind(course)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let completed: i64 = sqlx::query_scalar(COUNT_COMPLETED)
            .bind(learner)
            .bind(course)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(CompletionCheck {
            total_lessons: count_u32("total_lessons", total)?,
            completed_lessons: count_u32("completed_lessons", completed)?,
            transitioned,
        })
    }
}
