//! `lms` command line: drive lesson progress and inspect certificates and
//! notifications against a `SQLite` database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lms_core::model::{CertificateId, CourseId, LearnerId, LessonId};
use services::{AppServices, Clock};

mod db;
mod seed;

#[derive(Parser)]
#[command(name = "lms")]
#[command(about = "Course progress and completion tracking", long_about = None)]
struct Cli {
    /// `SQLite` database (`sqlite:<path>`, `sqlite://<abs path>` or `sqlite::memory:`)
    #[arg(long, env = "LMS_DB_URL", default_value = "sqlite:lms.sqlite3", global = true)]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a demo course, its lessons, a learner and an enrollment
    Seed,
    /// Mark a lesson as completed
    Complete {
        #[arg(long)]
        learner: u64,
        #[arg(long)]
        course: u64,
        #[arg(long)]
        lesson: u64,
    },
    /// Undo a lesson completion
    Uncomplete {
        #[arg(long)]
        learner: u64,
        #[arg(long)]
        course: u64,
        #[arg(long)]
        lesson: u64,
    },
    /// Show progress for one course, or a summary of every enrollment
    Progress {
        #[arg(long)]
        learner: u64,
        #[arg(long)]
        course: Option<u64>,
    },
    /// List a learner's certificates
    Certificates {
        #[arg(long)]
        learner: u64,
    },
    /// Show the renderer input for one certificate
    Certificate {
        #[arg(long)]
        learner: u64,
        #[arg(long)]
        id: u64,
    },
    /// Show a learner's notifications
    Notifications {
        #[arg(long)]
        learner: u64,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let db_url = db::normalize_sqlite_url(&cli.db);
    db::prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(&db_url, Clock::default_clock())
        .await
        .with_context(|| format!("opening {db_url}"))?;
    tracing::debug!(db = %db_url, "storage ready");

    match cli.command {
        Commands::Seed => {
            let seeded = seed::demo(app.storage()).await?;
            print_json(&seeded)?;
        }
        Commands::Complete {
            learner,
            course,
            lesson,
        } => {
            let update = app
                .progress()
                .complete_lesson(
                    LearnerId::new(learner),
                    CourseId::new(course),
                    LessonId::new(lesson),
                )
                .await?;
            print_json(&update)?;
        }
        Commands::Uncomplete {
            learner,
            course,
            lesson,
        } => {
            let update = app
                .progress()
                .uncomplete_lesson(
                    LearnerId::new(learner),
                    CourseId::new(course),
                    LessonId::new(lesson),
                )
                .await?;
            print_json(&update)?;
        }
        Commands::Progress { learner, course } => {
            let learner = LearnerId::new(learner);
            match course {
                Some(course) => {
                    let report = app
                        .progress()
                        .get_course_progress(learner, CourseId::new(course))
                        .await?;
                    print_json(&report)?;
                }
                None => print_json(&app.progress().get_my_progress(learner).await?)?,
            }
        }
        Commands::Certificates { learner } => {
            let certificates = app
                .certificates()
                .list_for_learner(LearnerId::new(learner))
                .await?;
            print_json(&certificates)?;
        }
        Commands::Certificate { learner, id } => {
            let view = app
                .certificates()
                .render_input(CertificateId::new(id), LearnerId::new(learner))
                .await?;
            print_json(&view)?;
        }
        Commands::Notifications { learner } => {
            let inbox = app.notifications().inbox(LearnerId::new(learner)).await?;
            print_json(&inbox)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}
