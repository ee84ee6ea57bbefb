use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{CertificateId, CourseId, LearnerId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid certificate number: {0}")]
pub struct CertificateNumberError(String);

/// Globally unique, human-quotable certificate number (hyphenated UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CertificateNumber(String);

impl CertificateNumber {
    /// Generate a fresh random certificate number.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Parse a persisted certificate number.
    ///
    /// # Errors
    ///
    /// Returns `CertificateNumberError` if the value is not a UUID.
    pub fn parse(raw: &str) -> Result<Self, CertificateNumberError> {
        Uuid::parse_str(raw)
            .map(|u| Self(u.hyphenated().to_string()))
            .map_err(|_| CertificateNumberError(raw.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CertificateNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A certificate that has been generated but not yet stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub certificate_number: CertificateNumber,
    pub issued_at: DateTime<Utc>,
}

impl NewCertificate {
    #[must_use]
    pub fn generate(learner_id: LearnerId, course_id: CourseId, issued_at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            course_id,
            certificate_number: CertificateNumber::generate(),
            issued_at,
        }
    }

    #[must_use]
    pub fn assign_id(self, id: CertificateId) -> Certificate {
        Certificate {
            id,
            learner_id: self.learner_id,
            course_id: self.course_id,
            certificate_number: self.certificate_number,
            issued_at: self.issued_at,
        }
    }
}

/// Proof of completion for a (learner, course) pair. Never mutated once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub certificate_number: CertificateNumber,
    pub issued_at: DateTime<Utc>,
}

/// Everything a renderer needs to produce the downloadable artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateView {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub certificate_number: CertificateNumber,
    pub issued_at: DateTime<Utc>,
    pub course_title: String,
    pub learner_name: String,
}

impl CertificateView {
    #[must_use]
    pub fn new(
        certificate: &Certificate,
        course_title: impl Into<String>,
        learner_name: impl Into<String>,
    ) -> Self {
        Self {
            learner_id: certificate.learner_id,
            course_id: certificate.course_id,
            certificate_number: certificate.certificate_number.clone(),
            issued_at: certificate.issued_at,
            course_title: course_title.into(),
            learner_name: learner_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn generated_numbers_are_distinct_uuids() {
        let a = CertificateNumber::generate();
        let b = CertificateNumber::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
        assert_eq!(CertificateNumber::parse(a.as_str()).unwrap(), a);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(CertificateNumber::parse("CERT-0001").is_err());
    }

    #[test]
    fn assign_id_keeps_payload() {
        let draft = NewCertificate::generate(LearnerId::new(3), CourseId::new(4), fixed_now());
        let number = draft.certificate_number.clone();
        let cert = draft.assign_id(CertificateId::new(9));

        assert_eq!(cert.id, CertificateId::new(9));
        assert_eq!(cert.certificate_number, number);

        let view = CertificateView::new(&cert, "Rust 101", "Ada");
        assert_eq!(view.course_id, CourseId::new(4));
        assert_eq!(view.learner_name, "Ada");
    }
}
