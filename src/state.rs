use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// The "last notified" marker: one session id in one flat file.
///
/// Holds either nothing or the id of the most recent stream session that was
/// successfully announced.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Trimmed marker contents. Any I/O error or an empty file reads as `None`.
    pub fn read(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Err(e) => {
                debug!("No marker at {}: {e}", self.path.display());
                None
            }
        }
    }

    /// Overwrite the marker with `session_id`.
    pub fn write(&self, session_id: &str) -> Result<()> {
        std::fs::write(&self.path, format!("{}\n", session_id.trim()))
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    /// True if `session_id` is the one already announced.
    pub fn is_already_notified(&self, session_id: &str) -> bool {
        self.read().as_deref() == Some(session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path().join("last_notified.txt"));
        assert_eq!(store.read(), None);
        assert!(!store.is_already_notified("42"));
    }

    #[test]
    fn directory_path_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(MarkerStore::new(dir.path()).read(), None);
    }

    #[test]
    fn write_then_read_trims() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path().join("m.txt"));
        store.write("  42 ").unwrap();
        assert_eq!(store.read().as_deref(), Some("42"));
        assert!(store.is_already_notified("42"));
        assert!(!store.is_already_notified("4"));
    }

    #[test]
    fn overwrite_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path().join("m.txt"));
        store.write("41").unwrap();
        store.write("42").unwrap();
        assert_eq!(store.read().as_deref(), Some("42"));
    }

    #[test]
    fn blank_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "\n  \n").unwrap();
        assert_eq!(MarkerStore::new(path).read(), None);
    }

    #[test]
    fn write_into_missing_dir_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarkerStore::new(dir.path().join("no/such/dir/m.txt"));
        let err = store.write("1").unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }
}
