//! Scoped staging environments for channel builds.
//!
//! Build-only dependencies and intermediate packaging trees live in a
//! staging environment that exists for the duration of one build invocation.
//! Teardown happens on every exit path, success or failure, so nothing
//! staged here can accumulate across invocations or leak into the produced
//! artifact's runtime dependency graph.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use walkdir::WalkDir;

use crate::channel::error::{ErrorExt, Result};

/// A scoped staging directory, discarded on drop.
#[derive(Debug)]
pub struct StagingEnv {
    dir: TempDir,
}

impl StagingEnv {
    /// Acquire a clean staging environment.
    pub fn acquire() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("guibender-dist-")
            .tempdir()
            .fs_context("creating staging environment", std::env::temp_dir())?;
        log::debug!("staging environment at {}", dir.path().display());
        Ok(StagingEnv { dir })
    }

    /// Root of the staging environment.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create and return a subdirectory inside the environment.
    pub fn subdir(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::create_dir_all(&path).fs_context("creating staging subdirectory", &path)?;
        Ok(path)
    }
}

/// Copy a directory tree into the staging area, preserving layout.
///
/// Unix permissions are carried over by `fs::copy`; symlinks are followed.
/// Paths in `exclude` are skipped along with everything under them, which
/// keeps previously emitted artifacts out of a freshly staged payload when
/// the output directory sits inside the source tree.
pub(crate) fn copy_tree(src: &Path, dst: &Path, exclude: &[PathBuf]) -> Result<()> {
    let walker = WalkDir::new(src)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !exclude.iter().any(|skipped| entry.path() == skipped));
    for dir_entry in walker {
        let dir_entry = dir_entry?;
        let rel = dir_entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        if dir_entry.file_type().is_dir() {
            fs::create_dir_all(&target).fs_context("creating staged directory", &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).fs_context("creating staged directory", parent)?;
            }
            fs::copy(dir_entry.path(), &target).fs_context("copying into staging", &target)?;
        }
    }
    Ok(())
}
