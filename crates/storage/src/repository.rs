use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lms_core::model::{
    Certificate, CertificateId, Course, CourseId, Enrollment, EnrollmentStatus, Learner,
    LearnerId, Lesson, LessonId, LessonProgress, NewCertificate, NewNotification, Notification,
    NotificationId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result of re-checking a learner's course after a lesson was completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionCheck {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    /// The enrollment as written, when this call performed the
    /// `Active -> Completed` transition.
    pub transitioned: Option<Enrollment>,
}

impl CompletionCheck {
    #[must_use]
    pub fn all_lessons_done(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons >= self.total_lessons
    }
}

/// Read side of the course catalog, plus the writes used to seed it.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Fetch a course by ID. Returns `Ok(None)` when missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// Fetch a lesson by ID regardless of course or publication state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Published lessons of a course ordered by `sort_order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the catalog cannot be read.
    async fn list_published_lessons(&self, course_id: CourseId)
    -> Result<Vec<Lesson>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson's course is missing.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the directory cannot be read.
    async fn get_learner(&self, id: LearnerId) -> Result<Option<Learner>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the learner cannot be stored.
    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError>;
}

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// All enrollments of a learner, most recently enrolled first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_enrollments(&self, learner_id: LearnerId)
    -> Result<Vec<Enrollment>, StorageError>;

    /// Insert or overwrite an enrollment unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the enrollment cannot be stored.
    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError>;

    /// Write `enrollment` only if the stored status still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be written.
    async fn transition_enrollment(
        &self,
        expected: EnrollmentStatus,
        enrollment: &Enrollment,
    ) -> Result<bool, StorageError>;
}

#[async_trait]
pub trait LessonProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Insert or update the record keyed by (learner, lesson).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError>;

    /// Every progress record the learner holds for lessons of `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_course_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError>;

    /// Number of completed records for published lessons of `course_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn count_completed(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<u32, StorageError>;
}

/// The narrow unit of work behind course completion.
#[async_trait]
pub trait CompletionPersistence: Send + Sync {
    /// If every published lesson is done while the enrollment is still
    /// `Active`, move it to `Completed` at `now` with a single conditional
    /// write that rechecks the counts, then report the counts.
    ///
    /// Of several concurrent callers, at most one sees `transitioned`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if there is no enrollment, or other
    /// storage errors.
    async fn settle_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CompletionCheck, StorageError>;
}

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn find_certificate(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_certificate(&self, id: CertificateId)
    -> Result<Option<Certificate>, StorageError>;

    /// Store a new certificate.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if (learner, course) or the certificate
    /// number is already taken.
    async fn insert_certificate(&self, cert: NewCertificate)
    -> Result<Certificate, StorageError>;

    /// A learner's certificates, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_certificates(&self, learner_id: LearnerId)
    -> Result<Vec<Certificate>, StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the notification cannot be stored.
    async fn append_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StorageError>;

    /// A user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list_notifications(&self, user_id: LearnerId)
    -> Result<Vec<Notification>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn unread_count(&self, user_id: LearnerId) -> Result<u64, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Locks are always taken in field order when more than one is needed.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    learners: Arc<Mutex<HashMap<LearnerId, Learner>>>,
    enrollments: Arc<Mutex<HashMap<(LearnerId, CourseId), Enrollment>>>,
    progress: Arc<Mutex<HashMap<(LearnerId, LessonId), LessonProgress>>>,
    certificates: Arc<Mutex<Vec<Certificate>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn count_u32(n: usize) -> Result<u32, StorageError> {
    u32::try_from(n).map_err(|_| StorageError::Serialization(format!("count overflow: {n}")))
}

fn next_id(len: usize) -> Result<u64, StorageError> {
    u64::try_from(len + 1).map_err(|_| StorageError::Serialization("id overflow".into()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn published_lessons(
        lessons: &HashMap<LessonId, Lesson>,
        course_id: CourseId,
    ) -> Vec<Lesson> {
        let mut out: Vec<Lesson> = lessons
            .values()
            .filter(|l| l.course_id == course_id && l.published)
            .cloned()
            .collect();
        out.sort_by_key(|l| (l.sort_order, l.id));
        out
    }

    fn completed_count(
        lessons: &HashMap<LessonId, Lesson>,
        progress: &HashMap<(LearnerId, LessonId), LessonProgress>,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> usize {
        progress
            .values()
            .filter(|p| p.learner_id() == learner_id && p.is_completed())
            .filter(|p| {
                lessons
                    .get(&p.lesson_id())
                    .is_some_and(|l| l.course_id == course_id && l.published)
            })
            .count()
    }
}

#[async_trait]
impl CourseCatalog for InMemoryRepository {
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(lock(&self.courses)?.get(&id).cloned())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(lock(&self.lessons)?.get(&id).cloned())
    }

    async fn list_published_lessons(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Lesson>, StorageError> {
        let guard = lock(&self.lessons)?;
        Ok(Self::published_lessons(&guard, course_id))
    }

    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        lock(&self.courses)?.insert(course.id, course.clone());
        Ok(())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if !lock(&self.courses)?.contains_key(&lesson.course_id) {
            return Err(StorageError::NotFound);
        }
        lock(&self.lessons)?.insert(lesson.id, lesson.clone());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryRepository {
    async fn get_learner(&self, id: LearnerId) -> Result<Option<Learner>, StorageError> {
        Ok(lock(&self.learners)?.get(&id).cloned())
    }

    async fn upsert_learner(&self, learner: &Learner) -> Result<(), StorageError> {
        lock(&self.learners)?.insert(learner.id, learner.clone());
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn find_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(lock(&self.enrollments)?
            .get(&(learner_id, course_id))
            .cloned())
    }

    async fn list_enrollments(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let mut out: Vec<Enrollment> = lock(&self.enrollments)?
            .values()
            .filter(|e| e.learner_id() == learner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.enrolled_at()
                .cmp(&a.enrolled_at())
                .then(a.course_id().cmp(&b.course_id()))
        });
        Ok(out)
    }

    async fn save_enrollment(&self, enrollment: &Enrollment) -> Result<(), StorageError> {
        lock(&self.enrollments)?.insert(
            (enrollment.learner_id(), enrollment.course_id()),
            enrollment.clone(),
        );
        Ok(())
    }

    async fn transition_enrollment(
        &self,
        expected: EnrollmentStatus,
        enrollment: &Enrollment,
    ) -> Result<bool, StorageError> {
        let mut guard = lock(&self.enrollments)?;
        let key = (enrollment.learner_id(), enrollment.course_id());
        match guard.get(&key) {
            Some(current) if current.status() == expected => {
                guard.insert(key, enrollment.clone());
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl LessonProgressRepository for InMemoryRepository {
    async fn find_progress(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        Ok(lock(&self.progress)?.get(&(learner_id, lesson_id)).cloned())
    }

    async fn save_progress(&self, progress: &LessonProgress) -> Result<(), StorageError> {
        lock(&self.progress)?.insert(
            (progress.learner_id(), progress.lesson_id()),
            progress.clone(),
        );
        Ok(())
    }

    async fn list_course_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let lessons = lock(&self.lessons)?;
        let progress = lock(&self.progress)?;
        Ok(progress
            .values()
            .filter(|p| p.learner_id() == learner_id)
            .filter(|p| {
                lessons
                    .get(&p.lesson_id())
                    .is_some_and(|l| l.course_id == course_id)
            })
            .cloned()
            .collect())
    }

    async fn count_completed(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<u32, StorageError> {
        let lessons = lock(&self.lessons)?;
        let progress = lock(&self.progress)?;
        count_u32(Self::completed_count(
            &lessons, &progress, learner_id, course_id,
        ))
    }
}

#[async_trait]
impl CompletionPersistence for InMemoryRepository {
    async fn settle_completion(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        now: DateTime<Utc>,
    ) -> Result<CompletionCheck, StorageError> {
        let lessons = lock(&self.lessons)?;
        let mut enrollments = lock(&self.enrollments)?;
        let progress = lock(&self.progress)?;

        let total_lessons = count_u32(Self::published_lessons(&lessons, course_id).len())?;
        let completed_lessons = count_u32(Self::completed_count(
            &lessons, &progress, learner_id, course_id,
        ))?;
        let mut check = CompletionCheck {
            total_lessons,
            completed_lessons,
            transitioned: None,
        };

        let enrollment = enrollments
            .get_mut(&(learner_id, course_id))
            .ok_or(StorageError::NotFound)?;
        if check.all_lessons_done() && enrollment.status() == EnrollmentStatus::Active {
            enrollment
                .mark_completed(now)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            check.transitioned = Some(enrollment.clone());
        }
        Ok(check)
    }
}

#[async_trait]
impl CertificateRepository for InMemoryRepository {
    async fn find_certificate(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Certificate>, StorageError> {
        Ok(lock(&self.certificates)?
            .iter()
            .find(|c| c.learner_id == learner_id && c.course_id == course_id)
            .cloned())
    }

    async fn get_certificate(
        &self,
        id: CertificateId,
    ) -> Result<Option<Certificate>, StorageError> {
        Ok(lock(&self.certificates)?
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn insert_certificate(
        &self,
        cert: NewCertificate,
    ) -> Result<Certificate, StorageError> {
        let mut guard = lock(&self.certificates)?;
        let taken = guard.iter().any(|c| {
            (c.learner_id == cert.learner_id && c.course_id == cert.course_id)
                || c.certificate_number == cert.certificate_number
        });
        if taken {
            return Err(StorageError::Conflict);
        }
        let stored = cert.assign_id(CertificateId::new(next_id(guard.len())?));
        guard.push(stored.clone());
        Ok(stored)
    }

    async fn list_certificates(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Certificate>, StorageError> {
        let mut out: Vec<Certificate> = lock(&self.certificates)?
            .iter()
            .filter(|c| c.learner_id == learner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.issued_at.cmp(&a.issued_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryRepository {
    async fn append_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, StorageError> {
        let mut guard = lock(&self.notifications)?;
        let stored = notification.assign_id(NotificationId::new(next_id(guard.len())?));
        guard.push(stored.clone());
        Ok(stored)
    }

    async fn list_notifications(
        &self,
        user_id: LearnerId,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut out: Vec<Notification> = lock(&self.notifications)?
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn unread_count(&self, user_id: LearnerId) -> Result<u64, StorageError> {
        let n = lock(&self.notifications)?
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count();
        u64::try_from(n).map_err(|_| StorageError::Serialization("count overflow".into()))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CourseCatalog>,
    pub learners: Arc<dyn UserDirectory>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub progress: Arc<dyn LessonProgressRepository>,
    pub completion: Arc<dyn CompletionPersistence>,
    pub certificates: Arc<dyn CertificateRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Share one repository value across every trait object.
    #[must_use]
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: CourseCatalog
            + UserDirectory
            + EnrollmentRepository
            + LessonProgressRepository
            + CompletionPersistence
            + CertificateRepository
            + NotificationRepository
            + Clone
            + 'static,
    {
        Self {
            catalog: Arc::new(repo.clone()),
            learners: Arc::new(repo.clone()),
            enrollments: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            completion: Arc::new(repo.clone()),
            certificates: Arc::new(repo.clone()),
            notifications: Arc::new(repo),
        }
    }
}
