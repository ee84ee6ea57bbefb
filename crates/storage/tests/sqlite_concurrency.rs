//! File-backed `SQLite` races. Unlike the shared-cache memory databases these
//! run through WAL with real connection-level locking.

use lms_core::model::{
    Course, CourseId, Enrollment, EnrollmentStatus, Learner, LearnerId, Lesson, LessonId,
    LessonProgress, NewCertificate,
};
use lms_core::time::fixed_now;
use storage::repository::{
    CertificateRepository, CompletionPersistence, CourseCatalog, EnrollmentRepository,
    LessonProgressRepository, StorageError, UserDirectory,
};
use storage::sqlite::SqliteRepository;
use tempfile::TempDir;

const RACERS: usize = 8;

async fn open_file_db() -> (TempDir, SqliteRepository) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("lms.sqlite3").display());
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    (dir, repo)
}

/// One learner enrolled in a two-lesson course with both lessons done.
async fn seed_finished(repo: &SqliteRepository) -> (LearnerId, CourseId) {
    let learner = Learner::new(LearnerId::new(1), "Grace", "grace@example.com");
    repo.upsert_learner(&learner).await.unwrap();
    let course = Course::new(CourseId::new(1), "Rust 101");
    repo.upsert_course(&course).await.unwrap();
    for (id, title, order) in [(1, "Ownership", 1), (2, "Borrowing", 2)] {
        let lesson = LessonId::new(id);
        repo.upsert_lesson(&Lesson::published(lesson, course.id, title, order))
            .await
            .unwrap();
        repo.save_progress(&LessonProgress::completed(learner.id, lesson, fixed_now()))
            .await
            .unwrap();
    }
    repo.save_enrollment(&Enrollment::new(learner.id, course.id, fixed_now()))
        .await
        .unwrap();
    (learner.id, course.id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_settle_completion_transitions_once() {
    let (_dir, repo) = open_file_db().await;
    let (learner, course) = seed_finished(&repo).await;

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.settle_completion(learner, course, fixed_now()).await })
        })
        .collect();

    let mut transitions = 0;
    for handle in handles {
        let check = handle.await.unwrap().expect("settle_completion must not fail");
        assert_eq!(check.total_lessons, 2);
        assert_eq!(check.completed_lessons, 2);
        if check.transitioned.is_some() {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);

    let stored = repo
        .find_enrollment(learner, course)
        .await
        .unwrap()
        .expect("enrollment");
    assert_eq!(stored.status(), EnrollmentStatus::Completed);
    assert_eq!(stored.completed_at(), Some(fixed_now()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_certificate_inserts_keep_one_row() {
    let (_dir, repo) = open_file_db().await;
    let (learner, course) = seed_finished(&repo).await;

    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.insert_certificate(NewCertificate::generate(learner, course, fixed_now()))
                    .await
            })
        })
        .collect();

    let mut inserted = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(cert) => inserted.push(cert),
            Err(StorageError::Conflict) => {}
            Err(other) => panic!("unexpected storage error: {other}"),
        }
    }
    assert_eq!(inserted.len(), 1);

    let listed = repo.list_certificates(learner).await.unwrap();
    assert_eq!(listed, inserted);
}
