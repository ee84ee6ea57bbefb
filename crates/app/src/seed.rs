use chrono::Utc;
use serde::Serialize;

use lms_core::model::{Course, CourseId, Enrollment, Learner, LearnerId, Lesson, LessonId};
use storage::repository::{Storage, StorageError};

#[derive(Debug, Serialize)]
pub struct Seeded {
    pub learner: Learner,
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

/// Upsert a demo catalog and enroll the demo learner.
///
/// Running it again leaves existing progress alone; an existing enrollment is
/// not touched.
pub async fn demo(storage: &Storage) -> Result<Seeded, StorageError> {
    let learner = Learner::new(LearnerId::new(1), "Demo Learner", "learner@example.com");
    storage.learners.upsert_learner(&learner).await?;

    let course = Course::new(CourseId::new(1), "Introduction to Rust");
    storage.catalog.upsert_course(&course).await?;

    let lessons = vec![
        Lesson::published(LessonId::new(1), course.id, "Getting started", 1),
        Lesson::published(LessonId::new(2), course.id, "Ownership", 2),
        Lesson::published(LessonId::new(3), course.id, "Traits", 3),
        Lesson::draft(LessonId::new(4), course.id, "Async (coming soon)", 4),
    ];
    for lesson in &lessons {
        storage.catalog.upsert_lesson(lesson).await?;
    }

    if storage
        .enrollments
        .find_enrollment(learner.id, course.id)
        .await?
        .is_none()
    {
        storage
            .enrollments
            .save_enrollment(&Enrollment::new(learner.id, course.id, Utc::now()))
            .await?;
    }
    tracing::info!(learner = %learner.id, course = %course.id, "demo data seeded");

    Ok(Seeded {
        learner,
        course,
        lessons,
    })
}
