//! Local mirror of the retrieved files
use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use std::fs;
use std::path::{Component, Path, PathBuf};

/// Convert a remote path to the relative path it is mirrored at: strip one leading and
/// one trailing '/'.
///
/// A path without a leading '/' keeps its start as is.
pub fn local_path(remote: &str) -> &str {
    let path = remote.strip_prefix('/').unwrap_or(remote);
    path.strip_suffix('/').unwrap_or(path)
}

/// Writes files below a root directory.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a local path below the root, refusing anything that would land outside it.
    fn resolve(&self, local_path: &str) -> Result<PathBuf> {
        let relative = Path::new(local_path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || local_path.is_empty() {
            return Err(anyhow!("Refusing to save outside {}: {:?}", self.root.display(), local_path));
        }
        Ok(self.root.join(relative))
    }

    /// Save content to local_path, creating missing directories and overwriting any
    /// existing file.
    ///
    /// Directory creation is best effort, a failure there shows up as a write error.
    pub fn save(&self, local_path: &str, content: &str) -> Result<PathBuf> {
        info!("saving {}", local_path);
        let target = self.resolve(local_path)?;
        if let Some((dir, _)) = local_path.rsplit_once('/') {
            let dir = self.root.join(dir);
            debug!("creating dir {}", dir.display());
            if let Err(err) = fs::create_dir_all(&dir) {
                warn!("could not create {}: {}", dir.display(), err);
            }
        }
        debug!("write to {}", target.display());
        fs::write(&target, content).with_context(|| format!("Could not write {}", target.display()))?;
        Ok(target)
    }
}
