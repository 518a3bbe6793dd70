use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A scratch directory that is removed when the test finishes
pub struct TestDir {
    dir: TempDir,
}

impl TestDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::Builder::new()
                .prefix("pagedb_test_")
                .tempdir()
                .unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh database file path inside this directory
    pub fn db_file(&self) -> PathBuf {
        self.dir.path().join("test.db")
    }
}

impl AsRef<Path> for TestDir {
    fn as_ref(&self) -> &Path {
        self.dir.path()
    }
}
