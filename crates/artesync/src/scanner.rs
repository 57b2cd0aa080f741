//! Registry discovery: turning a directory tree into cycle input.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;
use walkdir::WalkDir;

use crate::coordinator::{RegistrySnapshot, SourceFile};
use crate::error::{Result, SyncError};

/// Supplies the per-cycle discovery input.
pub trait RegistryScanner: Send + Sync {
    /// Produces the current snapshot: all registry files plus the
    /// locations that disappeared since the previous snapshot.
    fn snapshot(&self) -> Result<RegistrySnapshot>;
}

/// Scans a registry root on the local file system.
///
/// Locations are root-relative paths with a leading slash and forward
/// slashes, so keys stay stable across platforms.
pub struct DirectoryScanner {
    root: PathBuf,
    /// Locations seen by the previous snapshot, for orphan detection.
    previous: Mutex<HashSet<String>>,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            previous: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn location_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut location = String::new();
        for part in relative.components() {
            location.push('/');
            location.push_str(&part.as_os_str().to_string_lossy());
        }
        Some(location)
    }
}

impl RegistryScanner for DirectoryScanner {
    fn snapshot(&self) -> Result<RegistrySnapshot> {
        if !self.root.exists() {
            return Err(SyncError::RegistryRootNotFound(self.root.clone()));
        }

        let mut files = Vec::new();
        let mut current = HashSet::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            // a traversal error would make live files look vanished, so
            // it aborts the snapshot instead of being skipped
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.root.clone());
                SyncError::ReadDirectory {
                    path,
                    source: e.into(),
                }
            })?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            let Some(location) = self.location_of(path) else {
                continue;
            };
            let content = std::fs::read(path).map_err(|source| SyncError::ReadFile {
                path: path.to_path_buf(),
                source,
            })?;
            debug!("Discovered registry file: {location}");
            current.insert(location.clone());
            files.push(SourceFile::new(location, content));
        }

        files.sort_by(|a, b| a.location.cmp(&b.location));

        let mut previous = self
            .previous
            .lock()
            .map_err(|e| SyncError::Store(e.to_string()))?;
        let mut vanished: Vec<String> = previous.difference(&current).cloned().collect();
        vanished.sort();
        *previous = current;

        Ok(RegistrySnapshot { files, vanished })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_snapshot_collects_files_with_relative_locations() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("project")).unwrap();
        fs::write(dir.path().join("project/security.role"), b"{}").unwrap();
        fs::write(dir.path().join("mail.job"), b"{}").unwrap();

        let scanner = DirectoryScanner::new(dir.path());
        let snapshot = scanner.snapshot().unwrap();

        let locations: Vec<&str> = snapshot
            .files
            .iter()
            .map(|f| f.location.as_str())
            .collect();
        assert_eq!(locations, vec!["/mail.job", "/project/security.role"]);
        assert!(snapshot.vanished.is_empty());
    }

    #[test]
    fn test_snapshot_reports_vanished_locations() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("security.role");
        fs::write(&file, b"{}").unwrap();

        let scanner = DirectoryScanner::new(dir.path());
        let first = scanner.snapshot().unwrap();
        assert_eq!(first.files.len(), 1);

        fs::remove_file(&file).unwrap();
        let second = scanner.snapshot().unwrap();
        assert!(second.files.is_empty());
        assert_eq!(second.vanished, vec!["/security.role".to_string()]);

        // vanished is reported once, not repeatedly
        let third = scanner.snapshot().unwrap();
        assert!(third.vanished.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_traversal_error_aborts_snapshot() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(dir.path().join("security.role"), b"{}").unwrap();
        // symlink cycle back to the root; followed links make this a
        // traversal error
        std::os::unix::fs::symlink(dir.path(), sub.join("loop")).unwrap();

        let scanner = DirectoryScanner::new(dir.path());
        let err = scanner.snapshot().unwrap_err();
        assert!(matches!(err, SyncError::ReadDirectory { .. }));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let scanner = DirectoryScanner::new(&missing);
        let err = scanner.snapshot().unwrap_err();
        assert!(matches!(err, SyncError::RegistryRootNotFound(_)));
    }
}
