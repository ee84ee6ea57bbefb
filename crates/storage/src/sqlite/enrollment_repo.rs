use lms_core::model::{CourseId, Enrollment, EnrollmentStatus, LearnerId};

use super::{
    SqliteRepository,
    mapping::{db_err, id_i64, map_enrollment_row},
};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT learner_id, course_id, status, enrolled_at, completed_at
                FROM enrollments
                WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn list_enrollments(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT learner_id, course_id, status, enrolled_at, completed_at
                FROM enrollments
                WHERE learner_id = ?1
                ORDER BY enrolled_at DESC, course_id ASC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_enrollment_row).collect()
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO enrollments (learner_id, course_id, status, enrolled_at, completed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(learner_id, course_id) DO UPDATE SET
                    -- enrolled_at belongs to the enrollment flow; keep the original
                    status = excluded.status,
                    completed_at = excluded.completed_at
            ",
        )
        .bind(id_i64("learner_id", enrollment.learner_id().value())?)
        .bind(id_i64("course_id", enrollment.course_id().value())?)
        .bind(enrollment.status().as_str())
        .bind(enrollment.enrolled_at())
        .bind(enrollment.completed_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn transition_enrollment(
        &self,
        expected: EnrollmentStatus,
        enrollment: &Enrollment,
    ) -> Result<bool, StorageError> {
        let learner = id_i64("learner_id", enrollment.learner_id().value())?;
        let course = id_i64("course_id", enrollment.course_id().value())?;

        let res = sqlx::query(
            r"
                UPDATE enrollments
                SET status = ?3, completed_at = ?4
                WHERE learner_id = ?1 AND course_id = ?2 AND status = ?5
            ",
        )
        .bind(learner)
        .bind(course)
        .bind(enrollment.status().as_str())
        .bind(enrollment.completed_at())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if res.rows_affected() == 1 {
            return Ok(true);
        }

        // Lost the race, or there is nothing to transition.
        let exists = sqlx::query("SELECT 1 FROM enrollments WHERE learner_id = ?1 AND course_id = ?2")
            .bind(learner)
            .bind(course)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound),
        }
    }
}
