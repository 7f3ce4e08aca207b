use std::io;
use std::path::{Path, PathBuf};

/// Turns `sqlite:relative/path` into an absolute `sqlite://` URL.
///
/// In-memory URLs and URLs that are already absolute are returned trimmed.
#[must_use]
pub fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:"
        || trimmed.starts_with("sqlite://")
        || trimmed.starts_with("sqlite:file:")
    {
        return trimmed.to_string();
    }

    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// Creates the database file and its directory so `SQLite` can open it.
///
/// # Errors
///
/// Returns `io::ErrorKind::InvalidInput` for a `sqlite://` URL without a path,
/// or the underlying error if the directory or file cannot be created.
pub fn prepare_sqlite_file(db_url: &str) -> io::Result<()> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        // In-memory URLs need no file.
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("sqlite url has no path: {db_url}"),
        ));
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
