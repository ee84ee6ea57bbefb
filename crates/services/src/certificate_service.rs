use std::sync::Arc;

use serde::Serialize;

use lms_core::{
    model::{Certificate, CertificateId, CertificateView, CourseId, LearnerId, NewCertificate},
    time::Clock,
};
use storage::repository::{CertificateRepository, CourseCatalog, StorageError, UserDirectory};

use crate::error::{CertificateError, Precondition, Resource};

/// Outcome of `CertificateIssuer::issue_if_absent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issuance {
    pub certificate: Certificate,
    /// `false` when an existing certificate was returned unchanged.
    pub newly_issued: bool,
}

/// Issues and serves course certificates, at most one per (learner, course).
#[derive(Clone)]
pub struct CertificateIssuer {
    clock: Clock,
    certificates: Arc<dyn CertificateRepository>,
    catalog: Arc<dyn CourseCatalog>,
    learners: Arc<dyn UserDirectory>,
}

impl CertificateIssuer {
    #[must_use]
    pub fn new(
        clock: Clock,
        certificates: Arc<dyn CertificateRepository>,
        catalog: Arc<dyn CourseCatalog>,
        learners: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            clock,
            certificates,
            catalog,
            learners,
        }
    }

    /// Return the learner's certificate for the course, issuing one if none
    /// exists yet.
    ///
    /// The lookup is only a shortcut. A concurrent issuer that wins the
    /// insert makes ours fail with `StorageError::Conflict`, and the winner's
    /// record is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::Storage` if the store fails.
    pub async fn issue_if_absent(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Issuance, CertificateError> {
        if let Some(existing) = self.certificates.find_certificate(learner_id, course_id).await? {
            tracing::debug!(
                learner = %learner_id,
                course = %course_id,
                number = %existing.certificate_number,
                "certificate already issued"
            );
            return Ok(Issuance {
                certificate: existing,
                newly_issued: false,
            });
        }

        let draft = NewCertificate::generate(learner_id, course_id, self.clock.now());
        match self.certificates.insert_certificate(draft).await {
            Ok(certificate) => {
                tracing::info!(
                    learner = %learner_id,
                    course = %course_id,
                    number = %certificate.certificate_number,
                    "certificate issued"
                );
                Ok(Issuance {
                    certificate,
                    newly_issued: true,
                })
            }
            Err(StorageError::Conflict) => {
                // Lost the race. A conflict with no stored row means the
                // generated number collided, which is surfaced as is.
                let winner = self
                    .certificates
                    .find_certificate(learner_id, course_id)
                    .await?
                    .ok_or(StorageError::Conflict)?;
                tracing::debug!(
                    learner = %learner_id,
                    course = %course_id,
                    "concurrent issuance absorbed"
                );
                Ok(Issuance {
                    certificate: winner,
                    newly_issued: false,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The learner's certificates, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::Storage` if the store fails.
    pub async fn list_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Certificate>, CertificateError> {
        Ok(self.certificates.list_certificates(learner_id).await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound(Certificate)` when the id is unknown and
    /// `Precondition(NotOwner)` when it belongs to another learner.
    pub async fn get_certificate(
        &self,
        certificate_id: CertificateId,
        learner_id: LearnerId,
    ) -> Result<Certificate, CertificateError> {
        let certificate = self
            .certificates
            .get_certificate(certificate_id)
            .await?
            .ok_or(CertificateError::NotFound(Resource::Certificate))?;
        if certificate.learner_id != learner_id {
            return Err(CertificateError::Precondition(Precondition::NotOwner));
        }
        Ok(certificate)
    }

    /// Everything a renderer needs to draw the certificate.
    ///
    /// # Errors
    ///
    /// Same access rules as `get_certificate`, plus `NotFound(Course)` or
    /// `NotFound(Learner)` if the referenced records are gone.
    pub async fn render_input(
        &self,
        certificate_id: CertificateId,
        learner_id: LearnerId,
    ) -> Result<CertificateView, CertificateError> {
        let certificate = self.get_certificate(certificate_id, learner_id).await?;
        let course = self
            .catalog
            .get_course(certificate.course_id)
            .await?
            .ok_or(CertificateError::NotFound(Resource::Course))?;
        let learner = self
            .learners
            .get_learner(certificate.learner_id)
            .await?
            .ok_or(CertificateError::NotFound(Resource::Learner))?;
        Ok(CertificateView::new(&certificate, course.title, learner.name))
    }
}
