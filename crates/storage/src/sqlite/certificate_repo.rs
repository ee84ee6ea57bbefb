use lms_core::model::{Certificate, CertificateId, CourseId, LearnerId, NewCertificate};

use super::{
    SqliteRepository,
    mapping::{db_err, id_i64, map_certificate_row},
};
use crate::repository::{CertificateRepository, StorageError};

#[async_trait::async_trait]
impl CertificateRepository for SqliteRepository {
    async fn find_certificate(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, learner_id, course_id, certificate_number, issued_at
                FROM certificates
                WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn get_certificate(
        &self,
        id: CertificateId,
    ) -> Result<Option<Certificate>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, learner_id, course_id, certificate_number, issued_at
                FROM certificates
                WHERE id = ?1
            ",
        )
        .bind(id_i64("certificate_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_certificate_row).transpose()
    }

    async fn insert_certificate(
        &self,
        cert: NewCertificate,
    ) -> Result<Certificate, StorageError> {
        // UNIQUE(learner_id, course_id) turns a lost race into `Conflict`.
        let res = sqlx::query(
            r"
                INSERT INTO certificates (learner_id, course_id, certificate_number, issued_at)
                VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("learner_id", cert.learner_id.value())?)
        .bind(id_i64("course_id", cert.course_id.value())?)
        .bind(cert.certificate_number.as_str())
        .bind(cert.issued_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("certificate_id sign overflow".into()))?;
        Ok(cert.assign_id(CertificateId::new(id)))
    }

    async fn list_certificates(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, learner_id, course_id, certificate_number, issued_at
                FROM certificates
                WHERE learner_id = ?1
                ORDER BY issued_at DESC, id DESC
            ",
        )
        .bind(id_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_certificate_row).collect()
    }
}
