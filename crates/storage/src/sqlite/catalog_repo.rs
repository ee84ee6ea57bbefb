use lms_core::model::{Course, CourseId, Learner, LearnerId, Lesson, LessonId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{db_err, id_i64, map_lesson_row, ser},
};
use crate::repository::{CourseCatalog, StorageError, UserDirectory};

#[async_trait::async_trait]
impl CourseCatalog for SqliteRepository {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query("SELECT id, title FROM courses WHERE id = ?1")
            .bind(id_i64("course_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| {
            Ok::<_, StorageError>(Course::new(
                id,
                row.try_get::<String, _>("title").map_err(ser)?,
            ))
        })
        .transpose()
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, course_id, title, sort_order, published
                FROM lessons
                WHERE id = ?1
            ",
        )
        .bind(id_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_lesson_row).transpose()
    }

    async fn list_published_lessons(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Lesson>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, course_id, title, sort_order, published
                FROM lessons
                WHERE course_id = ?1 AND published = 1
                ORDER BY sort_order ASC, id ASC
            ",
        )
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_lesson_row).collect()
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO courses (id, title)
                VALUES (?1, ?2)
                ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(id_i64("course_id", course.id.value())?)
        .bind(&course.title)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if self.get_course(lesson.course_id).await?.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
                INSERT INTO lessons (id, course_id, title, sort_order, published)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                    course_id = excluded.course_id,
                    title = excluded.title,
                    sort_order = excluded.sort_order,
                    published = excluded.published
            ",
        )
        .bind(id_i64("lesson_id", lesson.id.value())?)
        .bind(id_i64("course_id", lesson.course_id.value())?)
        .bind(&lesson.title)
        .bind(lesson.sort_order)
        .bind(lesson.published)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserDirectory for SqliteRepository {
    async fn get_learner(&self, id: LearnerId) -> Result<Option<Learner>, StorageError> {
        let row = sqlx::query("SELECT id, name, email FROM learners WHERE id = ?1")
            .bind(id_i64("learner_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| {
            Ok::<_, StorageError>(Learner::new(
                id,
                row.try_get::<String, _>("name").map_err(ser)?,
                row.try_get::<String, _>("email").map_err(ser)?,
            ))
        })
        .transpose()
    }

    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO learners (id, name, email)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    email = excluded.email
            ",
        )
        .bind(id_i64("learner_id", learner.id.value())?)
        .bind(&learner.name)
        .bind(&learner.email)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
