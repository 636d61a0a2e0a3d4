//! Per-request working directories and their cleanup.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;
use tracing::{debug, warn};

#[cfg(test)]
pub(crate) fn is_empty_dir(path: impl AsRef<Path>) -> io::Result<bool> {
    let path = path.as_ref();
    let mut entries = fs::read_dir(path)?;
    Ok(entries.next().is_none())
}

/// A uniquely named directory under the output root.
///
/// Owns everything written into it. Dropping it removes the directory tree,
/// whichever way the request ended.
#[derive(Debug)]
pub struct WorkDir {
    inner: Option<TempDir>,
}

impl WorkDir {
    pub fn create_in(root: &Path) -> io::Result<Self> {
        fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix("epub-").tempdir_in(root)?;
        debug!(target: "pipeline", dir = %dir.path().display(), "working directory created");
        Ok(Self { inner: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        match &self.inner {
            Some(dir) => dir.path(),
            None => Path::new(""),
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(dir) = self.inner.take() else {
            return;
        };
        let path = dir.path().to_path_buf();
        match dir.close() {
            Ok(()) => debug!(target: "pipeline", dir = %path.display(), "working directory removed"),
            Err(err) => {
                warn!(target: "pipeline", dir = %path.display(), error = %err, "working directory cleanup failed")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_directory_and_contents() {
        let root = tempfile::tempdir().unwrap();
        let work = WorkDir::create_in(root.path()).unwrap();
        let path = work.path().to_path_buf();
        fs::create_dir_all(path.join("nested")).unwrap();
        fs::write(path.join("vol1.epub"), b"epub").unwrap();
        fs::write(path.join("nested").join("partial.tmp"), b"x").unwrap();
        assert!(path.starts_with(root.path()));

        drop(work);

        assert!(!path.exists());
        assert!(is_empty_dir(root.path()).unwrap());
    }

    #[test]
    fn concurrent_requests_get_distinct_directories() {
        let root = tempfile::tempdir().unwrap();
        let a = WorkDir::create_in(root.path()).unwrap();
        let b = WorkDir::create_in(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn creates_missing_root() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("output").join("deep");
        let work = WorkDir::create_in(&root).unwrap();
        assert!(work.path().is_dir());
    }
}
