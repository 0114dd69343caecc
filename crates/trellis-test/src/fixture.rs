//! Temporary `www` and `project` trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A pair of temporary directories removed on drop.
///
/// ```
/// use trellis_test::FsFixture;
///
/// let fs = FsFixture::new().unwrap();
/// let file = fs.mk_www("blog/%slug.html.spt", "{slug}").unwrap();
/// assert!(file.ends_with("blog/%slug.html.spt"));
/// assert!(fs.www_root().join("blog").is_dir());
/// ```
#[derive(Debug)]
pub struct FsFixture {
    www: TempDir,
    project: TempDir,
}

impl FsFixture {
    /// Creates both trees, empty.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            www: tempfile::tempdir()?,
            project: tempfile::tempdir()?,
        })
    }

    /// Root of the served tree.
    #[must_use]
    pub fn www_root(&self) -> &Path {
        self.www.path()
    }

    /// Root of the project tree.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        self.project.path()
    }

    /// Writes a file under `www`, creating parent directories.
    pub fn mk_www(&self, path: &str, contents: impl AsRef<[u8]>) -> io::Result<PathBuf> {
        mk_file(self.www_root(), path, contents.as_ref())
    }

    /// Creates a directory (and parents) under `www`.
    pub fn mk_www_dir(&self, path: &str) -> io::Result<PathBuf> {
        mk_dir(self.www_root(), path)
    }

    /// Writes a file under `project`, creating parent directories.
    pub fn mk_project(&self, path: &str, contents: impl AsRef<[u8]>) -> io::Result<PathBuf> {
        mk_file(self.project_root(), path, contents.as_ref())
    }

    /// Creates a directory (and parents) under `project`.
    pub fn mk_project_dir(&self, path: &str) -> io::Result<PathBuf> {
        mk_dir(self.project_root(), path)
    }
}

fn mk_file(root: &Path, path: &str, contents: &[u8]) -> io::Result<PathBuf> {
    let full = root.join(path.trim_start_matches('/'));
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&full, contents)?;
    Ok(full)
}

fn mk_dir(root: &Path, path: &str) -> io::Result<PathBuf> {
    let full = root.join(path.trim_start_matches('/'));
    fs::create_dir_all(&full)?;
    Ok(full)
}
