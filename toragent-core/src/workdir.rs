//! Per-agent data directories

use crate::error::{AgentError, Result};
use std::path::Path;
use tempfile::TempDir;

/// A private directory for one Tor instance, removed on drop
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a fresh directory under `base`, or the system temp dir
    pub fn create(base: Option<&Path>) -> Result<Self> {
        let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = tempfile::Builder::new()
            .prefix("toragent-")
            .tempdir_in(&base)
            .map_err(AgentError::DataDir)?;

        tracing::debug!("Created data directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_and_removed() {
        let base = TempDir::new().unwrap();
        let a = WorkDir::create(Some(base.path())).unwrap();
        let b = WorkDir::create(Some(base.path())).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().starts_with(base.path()));
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("toragent-"));

        let path = a.path().to_path_buf();
        drop(a);
        assert!(!path.exists());
        assert!(b.path().exists());
    }

    #[test]
    fn test_missing_base() {
        let result = WorkDir::create(Some(Path::new("/nonexistent/toragent")));
        assert!(matches!(result, Err(AgentError::DataDir(_))));
    }
}
