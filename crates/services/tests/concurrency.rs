use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lms_core::model::{
    Certificate, CertificateId, Course, CourseId, Enrollment, EnrollmentStatus, Learner,
    LearnerId, Lesson, LessonId, NewCertificate,
};
use lms_core::time::{fixed_clock, fixed_now};
use services::{AppServices, CertificateIssuer};
use storage::repository::{
    CertificateRepository, CourseCatalog, EnrollmentRepository, InMemoryRepository,
    NotificationRepository, Storage, StorageError, UserDirectory,
};

const LEARNER: LearnerId = LearnerId::new(7);
const COURSE: CourseId = CourseId::new(1);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuers_store_exactly_one_certificate() {
    let repo = InMemoryRepository::new();
    let issuer = Arc::new(CertificateIssuer::new(
        fixed_clock(),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    ));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let issuer = Arc::clone(&issuer);
        handles.push(tokio::spawn(async move {
            issuer.issue_if_absent(LEARNER, COURSE).await
        }));
    }

    let mut numbers = Vec::new();
    let mut fresh = 0;
    for handle in handles {
        let issuance = handle.await.expect("task").expect("issuance");
        if issuance.newly_issued {
            fresh += 1;
        }
        numbers.push(issuance.certificate.certificate_number);
    }

    assert_eq!(fresh, 1);
    numbers.dedup();
    assert_eq!(numbers.len(), 1);
    assert_eq!(repo.list_certificates(LEARNER).await.unwrap().len(), 1);
}

/// Reports "no certificate" on the first lookup, as a reader racing the
/// winning insert would.
struct StaleFirstLookup {
    inner: InMemoryRepository,
    stale: AtomicBool,
}

#[async_trait::async_trait]
impl CertificateRepository for StaleFirstLookup {
    async fn find_certificate(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        if self.stale.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.find_certificate(learner_id, course_id).await
    }

    async fn get_certificate(
        &self,
        id: CertificateId,
    ) -> Result<Option<Certificate>, StorageError> {
        self.inner.get_certificate(id).await
    }

    async fn insert_certificate(
        &self,
        cert: NewCertificate,
    ) -> Result<Certificate, StorageError> {
        self.inner.insert_certificate(cert).await
    }

    async fn list_certificates(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Certificate>, StorageError> {
        self.inner.list_certificates(learner_id).await
    }
}

#[tokio::test]
async fn losing_insert_returns_the_winners_certificate() {
    let repo = InMemoryRepository::new();
    let winner = repo
        .insert_certificate(NewCertificate::generate(LEARNER, COURSE, fixed_now()))
        .await
        .unwrap();

    let issuer = CertificateIssuer::new(
        fixed_clock(),
        Arc::new(StaleFirstLookup {
            inner: repo.clone(),
            stale: AtomicBool::new(true),
        }),
        Arc::new(repo.clone()),
        Arc::new(repo.clone()),
    );

    let issuance = issuer.issue_if_absent(LEARNER, COURSE).await.unwrap();
    assert!(!issuance.newly_issued);
    assert_eq!(issuance.certificate, winner);
    assert_eq!(repo.list_certificates(LEARNER).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_last_lessons_complete_the_course_once() {
    let repo = InMemoryRepository::new();
    repo.upsert_learner(&Learner::new(LEARNER, "Ada", "ada@example.com"))
        .await
        .unwrap();
    repo.upsert_course(&Course::new(COURSE, "Rust 101")).await.unwrap();
    let lessons: Vec<LessonId> = (1..=8).map(LessonId::new).collect();
    for (order, id) in (1..).zip(&lessons) {
        repo.upsert_lesson(&Lesson::published(*id, COURSE, format!("Lesson {order}"), order))
            .await
            .unwrap();
    }
    repo.save_enrollment(&Enrollment::new(LEARNER, COURSE, fixed_now()))
        .await
        .unwrap();

    let tracker =
        AppServices::from_storage(Storage::from_repository(repo.clone()), fixed_clock()).progress();
    let mut handles = Vec::new();
    for id in lessons {
        let tracker = Arc::clone(&tracker);
        handles.push(tokio::spawn(async move {
            tracker.complete_lesson(LEARNER, COURSE, id).await
        }));
    }

    let mut completions = 0;
    for handle in handles {
        let update = handle.await.expect("task").expect("update");
        if update.course_completed {
            completions += 1;
        }
    }

    assert_eq!(completions, 1);
    let enrollment = repo
        .find_enrollment(LEARNER, COURSE)
        .await
        .unwrap()
        .expect("enrollment");
    assert_eq!(enrollment.status(), EnrollmentStatus::Completed);
    assert_eq!(repo.list_certificates(LEARNER).await.unwrap().len(), 1);
    assert_eq!(repo.list_notifications(LEARNER).await.unwrap().len(), 1);
}
