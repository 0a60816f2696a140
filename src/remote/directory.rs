use bytes::Bytes;
use std::{io, path::PathBuf};
use tokio::{fs, io::AsyncWriteExt};

use super::{DirectoryEntry, EntryKind, RemoteDirectoryService};
use crate::{error::Error, utils};

fn remote(name: &str, error: &io::Error) -> Error {
    Error::Remote(format!("550 {name}: {error}"))
}

/// Serves a local directory as a remote store.
///
/// The cursor never leaves `root`: paths climbing above it are refused and
/// `cdup` at the root is a no-op, the way FTP servers treat a chroot.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    cursor: Vec<String>,
}

impl DirectoryStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            cursor: vec![],
        }
    }

    fn components(&self, name: &str) -> Result<Vec<String>, Error> {
        let mut resolved = if name.starts_with('/') {
            vec![]
        } else {
            self.cursor.clone()
        };

        for part in name.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    if resolved.pop().is_none() {
                        return Err(Error::Remote(format!("550 {name}: Permission denied")));
                    }
                }
                p => resolved.push(p.to_owned()),
            }
        }

        Ok(resolved)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, Error> {
        Ok(self
            .components(name)?
            .iter()
            .fold(self.root.clone(), |path, part| path.join(part)))
    }
}

#[async_trait]
impl RemoteDirectoryService for DirectoryStore {
    type Error = Error;

    async fn list(&mut self, path: Option<&str>) -> Result<Vec<DirectoryEntry>, Self::Error> {
        let label = path.unwrap_or(".");
        let dir = self.resolve(label)?;
        let mut reader = fs::read_dir(&dir).await.map_err(|e| remote(label, &e))?;

        let mut entries = vec![];
        while let Some(entry) = reader.next_entry().await.map_err(|e| remote(label, &e))? {
            let metadata = entry.metadata().await.map_err(|e| remote(label, &e))?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                size: metadata.is_file().then(|| metadata.len()),
                modified: metadata.modified().ok().map(utils::unix),
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn get(&mut self, name: &str) -> Result<Bytes, Self::Error> {
        let path = self.resolve(name)?;
        let data = fs::read(path).await.map_err(|e| remote(name, &e))?;
        Ok(Bytes::from(data))
    }

    async fn put(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name)?;
        fs::write(path, &data).await.map_err(|e| remote(name, &e))
    }

    async fn append(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| remote(name, &e))?;

        file.write_all(&data).await.map_err(|e| remote(name, &e))?;
        file.flush().await.map_err(|e| remote(name, &e))
    }

    async fn delete(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name)?;
        fs::remove_file(path).await.map_err(|e| remote(name, &e))
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        fs::rename(source, target).await.map_err(|e| remote(from, &e))
    }

    async fn mkdir(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name)?;
        fs::create_dir(path).await.map_err(|e| remote(name, &e))
    }

    async fn rmdir(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name)?;
        fs::remove_dir(path).await.map_err(|e| remote(name, &e))
    }

    /// Enters the child directory `name`. Parents are reached with `cdup`.
    async fn cwd(&mut self, name: &str) -> Result<(), Self::Error> {
        if name.contains('/') || utils::is_marker(name) || name.is_empty() {
            return Err(Error::Remote(format!("550 {name}: Permission denied")));
        }

        let components = self.components(name)?;
        let path = self.resolve(name)?;
        let metadata = fs::metadata(path).await.map_err(|e| remote(name, &e))?;
        if !metadata.is_dir() {
            return Err(Error::Remote(format!("550 {name}: Not a directory")));
        }

        self.cursor = components;
        Ok(())
    }

    async fn cdup(&mut self) -> Result<(), Self::Error> {
        let _ = self.cursor.pop();
        Ok(())
    }

    async fn pwd(&mut self) -> Result<String, Self::Error> {
        Ok(format!("/{}", self.cursor.join("/")))
    }
}
