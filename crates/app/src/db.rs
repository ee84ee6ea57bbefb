use std::path::{Path, PathBuf};

use thiserror::Error;

pub const MEMORY_URL: &str = "sqlite::memory:";

#[derive(Debug, Error)]
pub enum DbUrlError {
    #[error("invalid --db value: {raw} (expected sqlite:<path> or sqlite://<path>)")]
    Invalid { raw: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Turn `sqlite:<relative path>` or a bare path into an absolute `sqlite://`
/// URL so the database location does not depend on the working directory.
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == MEMORY_URL || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }

    let path_str = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    let path = Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Create the database file (and its parent directory) if it is missing.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), DbUrlError> {
    if db_url == MEMORY_URL {
        return Ok(());
    }

    let invalid = || DbUrlError::Invalid {
        raw: db_url.to_string(),
    };
    let path = db_url.strip_prefix("sqlite://").ok_or_else(invalid)?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(invalid());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(normalize_sqlite_url("sqlite:///tmp/lms.db"), "sqlite:///tmp/lms.db");
        assert_eq!(normalize_sqlite_url(MEMORY_URL), MEMORY_URL);
    }

    #[test]
    fn relative_paths_become_absolute() {
        let url = normalize_sqlite_url("sqlite:lms.sqlite3");
        let path = url.strip_prefix("sqlite://").expect("prefix");
        assert!(Path::new(path).is_absolute());
        assert!(path.ends_with("lms.sqlite3"));
    }

    #[test]
    fn non_sqlite_urls_are_rejected() {
        assert!(matches!(
            prepare_sqlite_file("postgres://localhost/lms"),
            Err(DbUrlError::Invalid { .. })
        ));
        assert!(prepare_sqlite_file(MEMORY_URL).is_ok());
    }
}
