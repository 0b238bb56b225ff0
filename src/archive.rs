//! Writes the finished document into a timestamped directory

use crate::{Error, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Prefix of every snapshot directory name
pub const DIRECTORY_PREFIX: &str = "site_";
/// Name of the archived document inside a snapshot directory
pub const FILE_NAME: &str = "page.html";

/// Location of a persisted snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArtifact {
    /// Absolute path of the `site_<timestamp>` directory
    pub directory: PathBuf,
    /// Path of `page.html` inside `directory`
    pub file: PathBuf,
}

/// Persists serialized documents under a root directory
///
/// Each call to [`persist`](ArchiveWriter::persist) creates (or reuses) a
/// directory named `site_YYYYMMDD_HHMMSS` from the current local time. Two
/// runs finishing within the same second share a directory and the later
/// one overwrites `page.html`.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    root: PathBuf,
}

impl ArchiveWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn persist(&self, html: &str) -> Result<SnapshotArtifact> {
        self.persist_at(html, Local::now())
    }

    /// Persist as if captured at `captured_at`.
    pub fn persist_at(&self, html: &str, captured_at: DateTime<Local>) -> Result<SnapshotArtifact> {
        let dir = self.root.join(directory_name(&captured_at));

        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::PersistError(format!("{}: {}", dir.display(), e)))?;
        let directory = std::fs::canonicalize(&dir)
            .map_err(|e| Error::PersistError(format!("{}: {}", dir.display(), e)))?;

        let file = directory.join(FILE_NAME);
        std::fs::write(&file, html)
            .map_err(|e| Error::PersistError(format!("{}: {}", file.display(), e)))?;

        log::debug!("wrote {} bytes to {}", html.len(), file.display());
        Ok(SnapshotArtifact { directory, file })
    }
}

/// `site_` followed by the timestamp at second precision
pub fn directory_name(captured_at: &DateTime<Local>) -> String {
    format!("{}{}", DIRECTORY_PREFIX, captured_at.format("%Y%m%d_%H%M%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).single().unwrap()
    }

    #[test]
    fn directory_name_is_second_precision() {
        assert_eq!(directory_name(&fixed_time()), "site_20240309_070502");
    }

    #[test]
    fn persist_writes_page_html() {
        let tmp = tempfile::TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());

        let artifact = writer.persist_at("<p>hi</p>", fixed_time()).unwrap();

        assert!(artifact.directory.is_absolute());
        assert!(artifact.directory.ends_with("site_20240309_070502"));
        assert!(artifact.file.ends_with(FILE_NAME));
        assert_eq!(std::fs::read_to_string(&artifact.file).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn persisting_twice_in_the_same_second_overwrites() {
        let tmp = tempfile::TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path());

        let first = writer.persist_at("first", fixed_time()).unwrap();
        let second = writer.persist_at("second", fixed_time()).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&second.file).unwrap(), "second");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn persist_creates_missing_root() {
        let tmp = tempfile::TempDir::new().unwrap();
        let writer = ArchiveWriter::new(tmp.path().join("nested/archives"));
        let artifact = writer.persist("<p>x</p>").unwrap();
        assert!(artifact.file.exists());
    }

    #[test]
    fn persist_fails_when_root_is_a_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let err = ArchiveWriter::new(&blocker).persist("<p>x</p>").unwrap_err();
        assert!(matches!(err, Error::PersistError(_)));
    }
}
