use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::config_file::FileSystemRepo;
use crate::error::{AppError, Result};

/// Stores files below a base directory on the local disk.
pub struct LocalFileSystem {
    base_path: PathBuf,
}

impl LocalFileSystem {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Resolves `path` below the base directory. Absolute paths and parent
    /// components are rejected.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(AppError::precondition(format!("invalid file path {path:?}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl FileSystemRepo for LocalFileSystem {
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&target, contents).await?;
        tracing::debug!("Wrote {} bytes to {}", contents.len(), target.display());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                tracing::debug!("Deleted {}", target.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("{} already removed", target.display());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
