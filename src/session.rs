use bytes::Bytes;

use crate::{
    error::BatchResult,
    local::{LocalFs, LocalStorage},
    remote::{DirectoryEntry, RemoteDirectoryService},
    utils,
};

/// Owns the one remote connection and the local storage a batch works with.
///
/// The remote cursor is the only state shared between commands. Navigation
/// and transfers are implemented on this type and take `&mut self`, so at
/// most one operation can touch the cursor at a time, and each restores it
/// before returning.
pub struct Session<R, L = LocalFs> {
    remote: R,
    pub(crate) local: L,
}

impl<R, L> Session<R, L>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
{
    pub fn new(remote: R, local: L) -> Self {
        Self { remote, local }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub(crate) async fn list(&mut self) -> BatchResult<Vec<DirectoryEntry>> {
        trace!("LIST");
        self.remote.list(None).await.map_err(Into::into)
    }

    /// Entry `name` of the cursor directory. `.` and `..` records are never
    /// matched.
    pub(crate) async fn lookup(&mut self, name: &str) -> BatchResult<Option<DirectoryEntry>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|e| e.name == name && !utils::is_marker(&e.name)))
    }

    pub(crate) async fn get(&mut self, name: &str) -> BatchResult<Bytes> {
        trace!("RETR {}", name);
        self.remote.get(name).await.map_err(Into::into)
    }

    pub(crate) async fn put(&mut self, data: Bytes, name: &str) -> BatchResult<()> {
        trace!("STOR {} ({} bytes)", name, data.len());
        self.remote.put(data, name).await.map_err(Into::into)
    }

    pub(crate) async fn append(&mut self, data: Bytes, name: &str) -> BatchResult<()> {
        trace!("APPE {} ({} bytes)", name, data.len());
        self.remote.append(data, name).await.map_err(Into::into)
    }

    pub(crate) async fn delete(&mut self, name: &str) -> BatchResult<()> {
        trace!("DELE {}", name);
        self.remote.delete(name).await.map_err(Into::into)
    }

    pub(crate) async fn rename(&mut self, from: &str, to: &str) -> BatchResult<()> {
        trace!("RNFR {} RNTO {}", from, to);
        self.remote.rename(from, to).await.map_err(Into::into)
    }

    pub(crate) async fn mkdir(&mut self, name: &str) -> BatchResult<()> {
        trace!("MKD {}", name);
        self.remote.mkdir(name).await.map_err(Into::into)
    }

    pub(crate) async fn rmdir(&mut self, name: &str) -> BatchResult<()> {
        trace!("RMD {}", name);
        self.remote.rmdir(name).await.map_err(Into::into)
    }

    pub(crate) async fn cwd(&mut self, name: &str) -> BatchResult<()> {
        trace!("CWD {}", name);
        self.remote.cwd(name).await.map_err(Into::into)
    }

    pub(crate) async fn cdup(&mut self) -> BatchResult<()> {
        trace!("CDUP");
        self.remote.cdup().await.map_err(Into::into)
    }

    /// Absolute path of the remote cursor.
    pub async fn pwd(&mut self) -> BatchResult<String> {
        trace!("PWD");
        self.remote.pwd().await.map_err(Into::into)
    }

    /// Moves the cursor up `hops` levels.
    pub(crate) async fn climb(&mut self, hops: usize) -> BatchResult<()> {
        for _ in 0..hops {
            self.cdup().await?;
        }
        Ok(())
    }
}
