mod catalog;
mod certificate;
mod enrollment;
mod ids;
mod notification;
mod progress;
mod summary;

pub use ids::{CertificateId, CourseId, LearnerId, LessonId, NotificationId, ParseIdError};

pub use catalog::{Course, Learner, Lesson};
pub use certificate::{
    Certificate, CertificateNumber, CertificateNumberError, CertificateView, NewCertificate,
};
pub use enrollment::{
    Enrollment, EnrollmentStateError, EnrollmentStatus, EnrollmentTransitionError,
};
pub use notification::{NewNotification, Notification, NotificationError, NotificationType};
pub use progress::{LessonProgress, ProgressStateError};
pub use summary::{CourseProgress, CourseProgressSummary, LessonProgressDetail, progress_percentage};
