//! Local storage primitives used by transfers.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::BatchResult;

/// Local side of a transfer. This is `async_trait`
#[async_trait]
pub trait LocalStorage: Send + Sync {
    /// Children of the directory `path`, sorted by name.
    async fn read_dir(&self, path: &Path) -> BatchResult<Vec<PathBuf>>;

    async fn read(&self, path: &Path) -> BatchResult<Bytes>;

    async fn write(&self, path: &Path, data: Bytes) -> BatchResult<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn is_dir(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents.
    async fn create_dir(&self, path: &Path) -> BatchResult<()>;
}

/// [`LocalStorage`] on top of `tokio::fs`. Relative paths resolve against
/// `root`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
}

impl LocalFs {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl LocalStorage for LocalFs {
    async fn read_dir(&self, path: &Path) -> BatchResult<Vec<PathBuf>> {
        let mut reader = fs::read_dir(self.resolve(path)).await?;
        let mut names = vec![];
        while let Some(entry) = reader.next_entry().await? {
            names.push(entry.file_name());
        }

        names.sort();
        Ok(names.into_iter().map(|name| path.join(name)).collect())
    }

    async fn read(&self, path: &Path) -> BatchResult<Bytes> {
        Ok(Bytes::from(fs::read(self.resolve(path)).await?))
    }

    async fn write(&self, path: &Path, data: Bytes) -> BatchResult<()> {
        Ok(fs::write(self.resolve(path), &data).await?)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(self.resolve(path))
            .await
            .is_ok_and(|metadata| metadata.is_dir())
    }

    async fn create_dir(&self, path: &Path) -> BatchResult<()> {
        Ok(fs::create_dir_all(self.resolve(path)).await?)
    }
}
