use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY,
            course_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            published INTEGER NOT NULL CHECK (published IN (0, 1)),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learners (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS enrollments (
            learner_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('active', 'completed', 'dropped')),
            enrolled_at TEXT NOT NULL,
            completed_at TEXT,
            PRIMARY KEY (learner_id, course_id),
            CHECK ((status = 'completed') = (completed_at IS NOT NULL)),
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lesson_progress (
            learner_id INTEGER NOT NULL,
            lesson_id INTEGER NOT NULL,
            completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
            completed_at TEXT,
            PRIMARY KEY (learner_id, lesson_id),
            CHECK (completed = (completed_at IS NOT NULL)),
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
            FOREIGN KEY (lesson_id) REFERENCES lessons(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS certificates (
            id INTEGER PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            certificate_number TEXT NOT NULL UNIQUE,
            issued_at TEXT NOT NULL,
            UNIQUE (learner_id, course_id),
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'INFO',
            is_read INTEGER NOT NULL DEFAULT 0 CHECK (is_read IN (0, 1)),
            link TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES learners(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lessons_course_published_order
            ON lessons (course_id, published, sort_order);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_enrollments_learner_enrolled
            ON enrollments (learner_id, enrolled_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_certificates_learner_issued
            ON certificates (learner_id, issued_at);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_notifications_user_created
            ON notifications (user_id, created_at);
    ",
];

/// Runs the versioned schema migrations.
///
/// Version 1 creates the catalog, directory, enrollment, progress,
/// certificate and notification tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if is_applied(pool, 1).await? {
        tracing::debug!("schema v1 already applied");
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    for statement in SCHEMA_V1 {
        sqlx::query(*statement).execute(&mut *tx).await?;
    }

    sqlx::query(
        r"
            INSERT INTO schema_migrations (version, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT(version) DO NOTHING
        ",
    )
    .bind(1_i64)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::debug!("applied schema v1");

    Ok(())
}
