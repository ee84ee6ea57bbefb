use chrono::Duration;
use lms_core::model::{
    Course, CourseId, Enrollment, EnrollmentStatus, Learner, LearnerId, Lesson, LessonId,
    LessonProgress, NewCertificate, NewNotification, NotificationType,
};
use lms_core::time::fixed_now;
use storage::repository::{
    CertificateRepository, CompletionPersistence, CourseCatalog, EnrollmentRepository,
    LessonProgressRepository, NotificationRepository, StorageError, UserDirectory,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:memdb_{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

/// One course with two published lessons and a draft, one enrolled learner.
async fn seed(repo: &SqliteRepository) -> (LearnerId, CourseId) {
    let learner = Learner::new(LearnerId::new(7), "Ada", "ada@example.com");
    repo.upsert_learner(&learner).await.unwrap();

    let course = Course::new(CourseId::new(1), "Rust 101");
    repo.upsert_course(&course).await.unwrap();
    repo.upsert_lesson(&Lesson::published(LessonId::new(1), course.id, "Ownership", 1))
        .await
        .unwrap();
    repo.upsert_lesson(&Lesson::published(LessonId::new(2), course.id, "Borrowing", 2))
        .await
        .unwrap();
    repo.upsert_lesson(&Lesson::draft(LessonId::new(3), course.id, "Unsafe", 3))
        .await
        .unwrap();

    repo.save_enrollment(&Enrollment::new(learner.id, course.id, fixed_now()))
        .await
        .unwrap();
    (learner.id, course.id)
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let repo = connect("migrate_twice").await;
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn catalog_roundtrip_orders_published_lessons() {
    let repo = connect("catalog").await;
    let (_, course_id) = seed(&repo).await;

    let course = repo.get_course(course_id).await.unwrap().expect("course");
    assert_eq!(course.title, "Rust 101");

    let lessons = repo.list_published_lessons(course_id).await.unwrap();
    let ids: Vec<u64> = lessons.iter().map(|l| l.id.value()).collect();
    assert_eq!(ids, vec![1, 2]);

    let draft = repo.get_lesson(LessonId::new(3)).await.unwrap().expect("draft");
    assert!(!draft.published);

    let orphan = Lesson::published(LessonId::new(9), CourseId::new(99), "Nowhere", 1);
    assert!(matches!(
        repo.upsert_lesson(&orphan).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn progress_roundtrip_and_published_count() {
    let repo = connect("progress").await;
    let (learner, course) = seed(&repo).await;
    let at = fixed_now() + Duration::minutes(5);

    repo.save_progress(&LessonProgress::completed(learner, LessonId::new(1), at))
        .await
        .unwrap();
    repo.save_progress(&LessonProgress::completed(learner, LessonId::new(3), at))
        .await
        .unwrap();

    let found = repo
        .find_progress(learner, LessonId::new(1))
        .await
        .unwrap()
        .expect("progress row");
    assert!(found.is_completed());
    assert_eq!(found.completed_at(), Some(at));

    // The draft lesson is stored but never counted.
    assert_eq!(repo.count_completed(learner, course).await.unwrap(), 1);
    assert_eq!(repo.list_course_progress(learner, course).await.unwrap().len(), 2);

    let mut undone = found;
    assert!(undone.uncomplete());
    repo.save_progress(&undone).await.unwrap();
    let reread = repo
        .find_progress(learner, LessonId::new(1))
        .await
        .unwrap()
        .expect("progress row");
    assert!(!reread.is_completed());
    assert_eq!(reread.completed_at(), None);
    assert_eq!(repo.count_completed(learner, course).await.unwrap(), 0);
}

#[tokio::test]
async fn settle_completion_transitions_only_once() {
    let repo = connect("settle").await;
    let (learner, course) = seed(&repo).await;
    let now = fixed_now() + Duration::hours(1);

    repo.save_progress(&LessonProgress::completed(learner, LessonId::new(1), now))
        .await
        .unwrap();
    let partial = repo.settle_completion(learner, course, now).await.unwrap();
    assert_eq!(partial.total_lessons, 2);
    assert_eq!(partial.completed_lessons, 1);
    assert!(partial.transitioned.is_none());

    repo.save_progress(&LessonProgress::completed(learner, LessonId::new(2), now))
        .await
        .unwrap();
    let first = repo.settle_completion(learner, course, now).await.unwrap();
    let written = first.transitioned.expect("first call transitions");
    assert_eq!(written.status(), EnrollmentStatus::Completed);
    assert_eq!(written.completed_at(), Some(now));

    let second = repo.settle_completion(learner, course, now).await.unwrap();
    assert!(second.all_lessons_done());
    assert!(second.transitioned.is_none());

    let stored = repo
        .find_enrollment(learner, course)
        .await
        .unwrap()
        .expect("enrollment");
    assert_eq!(stored.status(), EnrollmentStatus::Completed);
    assert_eq!(stored.enrolled_at(), fixed_now());
}

#[tokio::test]
async fn settle_completion_without_enrollment_is_not_found() {
    let repo = connect("settle_missing").await;
    let (_, course) = seed(&repo).await;

    let err = repo
        .settle_completion(LearnerId::new(404), course, fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn transition_is_conditional_on_expected_status() {
    let repo = connect("transition").await;
    let (learner, course) = seed(&repo).await;

    let mut completed = repo
        .find_enrollment(learner, course)
        .await
        .unwrap()
        .expect("enrollment");
    completed.mark_completed(fixed_now()).unwrap();

    assert!(
        repo.transition_enrollment(EnrollmentStatus::Active, &completed)
            .await
            .unwrap()
    );
    // Already completed: the guard no longer matches.
    assert!(
        !repo
            .transition_enrollment(EnrollmentStatus::Active, &completed)
            .await
            .unwrap()
    );

    let mut reverted = completed.clone();
    reverted.revert_to_active().unwrap();
    assert!(
        repo.transition_enrollment(EnrollmentStatus::Completed, &reverted)
            .await
            .unwrap()
    );
    let stored = repo
        .find_enrollment(learner, course)
        .await
        .unwrap()
        .expect("enrollment");
    assert_eq!(stored.status(), EnrollmentStatus::Active);
    assert_eq!(stored.completed_at(), None);

    let stranger = Enrollment::new(LearnerId::new(404), course, fixed_now());
    assert!(matches!(
        repo.transition_enrollment(EnrollmentStatus::Active, &stranger).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn duplicate_certificate_is_a_conflict() {
    let repo = connect("certificates").await;
    let (learner, course) = seed(&repo).await;

    let issued = repo
        .insert_certificate(NewCertificate::generate(learner, course, fixed_now()))
        .await
        .unwrap();
    let err = repo
        .insert_certificate(NewCertificate::generate(learner, course, fixed_now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let found = repo
        .find_certificate(learner, course)
        .await
        .unwrap()
        .expect("certificate");
    assert_eq!(found, issued);
    assert_eq!(repo.get_certificate(issued.id).await.unwrap(), Some(issued.clone()));
    assert_eq!(repo.list_certificates(learner).await.unwrap(), vec![issued]);
}

#[tokio::test]
async fn notifications_are_listed_newest_first() {
    let repo = connect("notifications").await;
    let (learner, _) = seed(&repo).await;

    for (offset, title) in [(0, "older"), (10, "newer")] {
        let note = NewNotification::new(
            learner,
            title,
            "body",
            NotificationType::Certificate,
            Some("/my-certificates".to_string()),
            fixed_now() + Duration::seconds(offset),
        )
        .unwrap();
        repo.append_notification(note).await.unwrap();
    }

    let listed = repo.list_notifications(learner).await.unwrap();
    let titles: Vec<&str> = listed.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["newer", "older"]);
    assert!(listed.iter().all(|n| !n.read));
    assert_eq!(listed[0].link.as_deref(), Some("/my-certificates"));
    assert_eq!(repo.unread_count(learner).await.unwrap(), 2);
}
