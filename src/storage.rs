use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

/// URL prefix under which stored photos are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Flat namespace of profile photo files, addressed by file name.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()>;
    /// Removing a name that is not stored is not an error.
    async fn delete(&self, name: &str) -> anyhow::Result<()>;
    async fn exists(&self, name: &str) -> anyhow::Result<bool>;
}

/// Path persisted in the `users` table for a stored file name.
pub fn public_path(name: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, name)
}

/// Inverse of [`public_path`]. Returns `None` for anything that would escape the upload dir.
pub fn name_from_path(path: &str) -> Option<&str> {
    let name = path.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
    is_safe_name(name).then_some(name)
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

#[derive(Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(is_safe_name(name), "invalid photo file name {:?}", name);
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl PhotoStorage for DiskStorage {
    async fn put(&self, name: &str, body: Bytes) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        debug!(file = %path.display(), bytes = body.len(), "photo stored");
        Ok(())
    }

    async fn delete(&self, name: &str) -> anyhow::Result<()> {
        let path = self.resolve(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(file = %path.display(), "photo deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    async fn exists(&self, name: &str) -> anyhow::Result<bool> {
        let path = self.resolve(name)?;
        tokio::fs::try_exists(&path)
            .await
            .with_context(|| format!("stat {}", path.display()))
    }
}
