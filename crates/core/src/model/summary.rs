use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::model::{
    catalog::{Course, Lesson},
    ids::{CourseId, LessonId},
    progress::LessonProgress,
};

/// Share of completed lessons as a percentage rounded to one decimal place.
///
/// A course without lessons is reported as `0.0`.
#[must_use]
pub fn progress_percentage(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let ratio = f64::from(completed) / f64::from(total) * 100.0;
    (ratio * 10.0).round() / 10.0
}

/// One lesson's row in a course progress report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LessonProgressDetail {
    pub lesson_id: LessonId,
    pub lesson_title: String,
    pub sort_order: i32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Course-level aggregate without per-lesson rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgressSummary {
    pub course_id: CourseId,
    pub course_title: String,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub progress_percentage: f64,
}

impl CourseProgressSummary {
    #[must_use]
    pub fn new(course: &Course, total_lessons: u32, completed_lessons: u32) -> Self {
        Self {
            course_id: course.id,
            course_title: course.title.clone(),
            total_lessons,
            completed_lessons,
            progress_percentage: progress_percentage(completed_lessons, total_lessons),
        }
    }
}

/// Full progress report for one course, including a row per published lesson.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgress {
    #[serde(flatten)]
    pub summary: CourseProgressSummary,
    pub lessons: Vec<LessonProgressDetail>,
}

impl CourseProgress {
    /// Left-join the published lessons (already in display order) against the
    /// learner's progress records. Lessons without a record count as incomplete.
    #[must_use]
    pub fn from_lessons(course: &Course, lessons: &[Lesson], progress: &[LessonProgress]) -> Self {
        let by_lesson: HashMap<LessonId, &LessonProgress> =
            progress.iter().map(|p| (p.lesson_id(), p)).collect();

        let details: Vec<LessonProgressDetail> = lessons
            .iter()
            .map(|lesson| {
                let record = by_lesson.get(&lesson.id);
                LessonProgressDetail {
                    lesson_id: lesson.id,
                    lesson_title: lesson.title.clone(),
                    sort_order: lesson.sort_order,
                    completed: record.is_some_and(|p| p.is_completed()),
                    completed_at: record.and_then(|p| p.completed_at()),
                }
            })
            .collect();

        let total = u32::try_from(details.len()).unwrap_or(u32::MAX);
        let completed =
            u32::try_from(details.iter().filter(|d| d.completed).count()).unwrap_or(u32::MAX);

        Self {
            summary: CourseProgressSummary::new(course, total, completed),
            lessons: details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::LearnerId;
    use crate::time::fixed_now;

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert_eq!(progress_percentage(1, 2), 50.0);
        assert_eq!(progress_percentage(0, 2), 0.0);
        assert_eq!(progress_percentage(1, 3), 33.3);
        assert_eq!(progress_percentage(2, 3), 66.7);
        assert_eq!(progress_percentage(3, 3), 100.0);
        assert_eq!(progress_percentage(0, 0), 0.0);
    }

    #[test]
    fn lessons_without_records_are_incomplete() {
        let course = Course::new(CourseId::new(1), "Rust 101");
        let lessons = vec![
            Lesson::published(LessonId::new(1), course.id, "Ownership", 1),
            Lesson::published(LessonId::new(2), course.id, "Borrowing", 2),
            Lesson::published(LessonId::new(3), course.id, "Lifetimes", 3),
        ];
        let mut undone = LessonProgress::completed(LearnerId::new(1), LessonId::new(3), fixed_now());
        undone.uncomplete();
        let progress = vec![
            LessonProgress::completed(LearnerId::new(1), LessonId::new(2), fixed_now()),
            undone,
        ];

        let report = CourseProgress::from_lessons(&course, &lessons, &progress);

        assert_eq!(report.summary.total_lessons, 3);
        assert_eq!(report.summary.completed_lessons, 1);
        assert_eq!(report.summary.progress_percentage, 33.3);
        let flags: Vec<bool> = report.lessons.iter().map(|d| d.completed).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(report.lessons[1].completed_at, Some(fixed_now()));
        assert_eq!(report.lessons[0].completed_at, None);
    }

    #[test]
    fn progress_for_lessons_outside_the_list_is_ignored() {
        let course = Course::new(CourseId::new(1), "Rust 101");
        let lessons = vec![Lesson::published(LessonId::new(1), course.id, "Ownership", 1)];
        let progress = vec![
            LessonProgress::completed(LearnerId::new(1), LessonId::new(1), fixed_now()),
            LessonProgress::completed(LearnerId::new(1), LessonId::new(99), fixed_now()),
        ];

        let report = CourseProgress::from_lessons(&course, &lessons, &progress);
        assert_eq!(report.summary.completed_lessons, 1);
        assert_eq!(report.summary.progress_percentage, 100.0);
    }

    #[test]
    fn empty_course_reports_zero_percent() {
        let course = Course::new(CourseId::new(1), "Empty");
        let report = CourseProgress::from_lessons(&course, &[], &[]);
        assert_eq!(report.summary.total_lessons, 0);
        assert_eq!(report.summary.progress_percentage, 0.0);
    }
}
