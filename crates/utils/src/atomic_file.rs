//! Crash-safe file writes for ticket and service definition files

use cas_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Write data to a file atomically by writing to a temporary file and renaming
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::configuration(format!("invalid file path '{}': no parent directory", path.display()))
    })?;

    fs::create_dir_all(parent)
        .map_err(|e| Error::file_system(parent, "create parent directory", e))?;

    // Same directory so the rename never crosses file systems. The leading dot
    // keeps readers that skip hidden files from picking up partial writes.
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let written = (|| -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| Error::file_system(&temp_path, "create temporary file", e))?;
        file.write_all(content)
            .map_err(|e| Error::file_system(&temp_path, "write temporary file", e))?;
        file.sync_all()
            .map_err(|e| Error::file_system(&temp_path, "sync temporary file", e))
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
        return written;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::file_system(path, "atomic rename", e)
    })
}

/// Write string content to a file atomically
pub fn write_atomic_string(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Remove a file, treating a missing file as already removed.
///
/// Returns whether a file was actually deleted.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::file_system(path, "remove file", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("ab").join("service-1.json");

        write_atomic_string(&file_path, "{}").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[test]
    fn test_atomic_write_overwrites_and_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("ticket.bin");
        fs::write(&file_path, b"old").unwrap();

        write_atomic(&file_path, b"new").unwrap();

        assert_eq!(fs::read(&file_path).unwrap(), b"new");
        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_remove_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("gone.json");
        assert!(!remove_if_exists(&file_path).unwrap());

        fs::write(&file_path, b"x").unwrap();
        assert!(remove_if_exists(&file_path).unwrap());
        assert!(!file_path.exists());
    }
}
