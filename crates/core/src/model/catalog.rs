use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, LearnerId, LessonId};

//
// ─── CATALOG RECORDS ───────────────────────────────────────────────────────────
//

/// A course as seen by the progress core: only its identity and title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
}

impl Course {
    #[must_use]
    pub fn new(id: CourseId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// A lesson belongs to exactly one course and is looked up by id.
///
/// Only published lessons count towards course completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub sort_order: i32,
    pub published: bool,
}

impl Lesson {
    #[must_use]
    pub fn published(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        sort_order: i32,
    ) -> Self {
        Self {
            id,
            course_id,
            title: title.into(),
            sort_order,
            published: true,
        }
    }

    #[must_use]
    pub fn draft(
        id: LessonId,
        course_id: CourseId,
        title: impl Into<String>,
        sort_order: i32,
    ) -> Self {
        Self {
            published: false,
            ..Self::published(id, course_id, title, sort_order)
        }
    }

    #[must_use]
    pub fn belongs_to(&self, course_id: CourseId) -> bool {
        self.course_id == course_id
    }
}

/// The acting learner as resolved by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Learner {
    pub id: LearnerId,
    pub name: String,
    pub email: String,
}

impl Learner {
    #[must_use]
    pub fn new(id: LearnerId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_membership_is_by_course_id() {
        let lesson = Lesson::published(LessonId::new(1), CourseId::new(10), "Intro", 1);
        assert!(lesson.belongs_to(CourseId::new(10)));
        assert!(!lesson.belongs_to(CourseId::new(11)));
    }

    #[test]
    fn draft_lesson_is_unpublished() {
        let lesson = Lesson::draft(LessonId::new(2), CourseId::new(10), "WIP", 2);
        assert!(!lesson.published);
        assert_eq!(lesson.sort_order, 2);
    }
}
