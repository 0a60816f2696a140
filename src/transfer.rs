//! Recursive tree transfers.
//!
//! Every procedure here works on the cursor directory. A step that descends
//! into a child always climbs back out before returning, on the error path
//! too, so a caller can pair each descent with exactly one ascent.

use std::path::Path;

use crate::{
    error::{BatchResult, Error},
    local::LocalStorage,
    path,
    remote::{DirectoryEntry, RemoteDirectoryService},
    session::Session,
    utils,
};

impl<R, L> Session<R, L>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
{
    /// Copies the entries named `target` (every entry when blank) from the
    /// cursor directory into `destination`, recursing into directories.
    /// `rename_to` replaces the name of the matched entry.
    ///
    /// Returns the number of files written.
    pub async fn download(
        &mut self,
        label: &str,
        target: &str,
        destination: &Path,
        rename_to: Option<&str>,
    ) -> BatchResult<usize> {
        let mut count = 0;
        let mut deferred = vec![];

        for entry in self.list().await? {
            if utils::is_marker(&entry.name) || !(target.is_empty() || entry.name == target) {
                continue;
            }

            if entry.is_dir() {
                deferred.push(entry.name);
                continue;
            }

            let local = destination.join(rename_to.unwrap_or(&entry.name));
            let data = self.get(&entry.name).await?;
            debug!("{} -> {}", path::join(label, &entry.name), local.display());
            self.local.write(&local, data).await?;
            count += 1;
        }

        if !target.is_empty() && count == 0 && deferred.is_empty() {
            return Err(Error::NotFound(label.to_owned()));
        }

        for name in deferred {
            let local = destination.join(rename_to.unwrap_or(&name));
            let label = if target.is_empty() {
                path::join(label, &name)
            } else {
                label.to_owned()
            };

            self.cwd(&name).await?;
            let result = self.download_into(&label, &local).await;
            self.cdup().await?;
            count += result?;
        }

        Ok(count)
    }

    async fn download_into(&mut self, label: &str, destination: &Path) -> BatchResult<usize> {
        if !self.local.exists(destination).await {
            self.local.create_dir(destination).await?;
        } else if !self.local.is_dir(destination).await {
            return Err(Error::NotADirectory(destination.display().to_string()));
        }

        Box::pin(self.download(label, "", destination, None)).await
    }

    /// Copies `local` into the cursor directory as `name` (the local file
    /// name when blank). Files are stored with `put`, or `append` when
    /// `append` is set.
    ///
    /// A directory replaces a remote entry of the same name, except that in
    /// append mode an existing remote directory is merged into. A directory
    /// with a blank name has its children copied into the cursor directory.
    ///
    /// Returns the number of files transferred.
    pub async fn upload(
        &mut self,
        append: bool,
        local: &Path,
        label: &str,
        name: &str,
    ) -> BatchResult<usize> {
        if !self.local.exists(local).await {
            return Err(Error::InvalidPath(local.display().to_string()));
        }

        if !self.local.is_dir(local).await {
            let name = match name {
                "" => utils::file_name(local),
                name => name.to_owned(),
            };
            if name.is_empty() {
                return Err(Error::InvalidPath(local.display().to_string()));
            }

            let data = self.local.read(local).await?;
            debug!("{} -> {}", local.display(), label);
            if append {
                self.append(data, &name).await?;
            } else {
                self.put(data, &name).await?;
            }
            return Ok(1);
        }

        if name.is_empty() {
            return self.upload_children(append, local, label).await;
        }

        let existing = self.lookup(name).await?;
        match existing {
            Some(entry) if entry.is_dir() && append => {}
            Some(entry) if entry.is_dir() => {
                let _ = self.remove_directory(name, label).await?;
                self.mkdir(name).await?;
            }
            Some(_) => {
                self.delete(name).await?;
                self.mkdir(name).await?;
            }
            None => self.mkdir(name).await?,
        }

        self.cwd(name).await?;
        let result = self.upload_children(append, local, label).await;
        self.cdup().await?;
        result
    }

    async fn upload_children(
        &mut self,
        append: bool,
        local: &Path,
        label: &str,
    ) -> BatchResult<usize> {
        let mut files = vec![];
        let mut dirs = vec![];
        for child in self.local.read_dir(local).await? {
            if self.local.is_dir(&child).await {
                dirs.push(child);
            } else {
                files.push(child);
            }
        }

        let mut count = 0;
        for child in files.into_iter().chain(dirs) {
            let name = utils::file_name(&child);
            let label = path::join(label, &name);
            count += Box::pin(self.upload(append, &child, &label, &name)).await?;
        }

        Ok(count)
    }

    /// Deletes the directory `name` below the cursor and everything in it.
    ///
    /// Returns the number of files deleted; directories are not counted.
    pub async fn remove_directory(&mut self, name: &str, label: &str) -> BatchResult<usize> {
        self.cwd(name).await?;
        let result = self.remove_contents(label).await;
        self.cdup().await?;
        let count = result?;

        self.rmdir(name).await?;
        debug!("removed {} ({} files)", label, count);
        Ok(count)
    }

    async fn remove_contents(&mut self, label: &str) -> BatchResult<usize> {
        let (dirs, files): (Vec<_>, Vec<_>) = self
            .list()
            .await?
            .into_iter()
            .filter(|e| !utils::is_marker(&e.name))
            .partition(DirectoryEntry::is_dir);

        let mut count = 0;
        for dir in dirs {
            let label = path::join(label, &dir.name);
            count += Box::pin(self.remove_directory(&dir.name, &label)).await?;
        }

        for file in files {
            self.delete(&file.name).await?;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod test_transfer {
    use bytes::Bytes;
    use std::{fs, path::PathBuf};
    use tempfile::TempDir;

    use super::*;
    use crate::{local::LocalFs, remote::MemoryStore};

    fn session(store: MemoryStore) -> (Session<MemoryStore>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Session::new(store, LocalFs::new(dir.path())), dir)
    }

    fn tree() -> MemoryStore {
        let mut store = MemoryStore::new().with_markers();
        store.insert_file("a/x.txt", "x").unwrap();
        store.insert_file("a/sub/y.txt", "y").unwrap();
        store.insert_file("a/sub/deeper/z.txt", "z").unwrap();
        store.insert_dir("a/empty").unwrap();
        store
    }

    fn write(root: &Path, path: &str, contents: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_download_tree() {
        let (mut session, dir) = session(tree());

        let count = session
            .download("a", "a", Path::new("out"), None)
            .await
            .unwrap();

        assert_eq!(count, 3);
        let root = dir.path().join("out/a");
        assert_eq!(fs::read_to_string(root.join("x.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(root.join("sub/deeper/z.txt")).unwrap(), "z");
        assert!(root.join("empty").is_dir());
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_download_renames_match() {
        let (mut session, dir) = session(tree());
        session.cwd("a").await.unwrap();

        let count = session
            .download("a/x.txt", "x.txt", Path::new(""), Some("renamed.txt"))
            .await
            .unwrap();

        assert_eq!(count, 1);
        assert!(dir.path().join("renamed.txt").is_file());
        assert!(!dir.path().join("x.txt").exists());
    }

    #[tokio::test]
    async fn test_download_missing() {
        let (mut session, _dir) = session(tree());
        let result = session
            .download("missing.txt", "missing.txt", Path::new(""), None)
            .await;
        assert_eq!(result, Err(Error::NotFound("missing.txt".to_owned())));
    }

    #[tokio::test]
    async fn test_download_blocked_by_local_file() {
        let (mut session, dir) = session(tree());
        write(dir.path(), "a", "not a directory");

        let result = session.download("a", "a", Path::new(""), None).await;
        assert!(matches!(result, Err(Error::NotADirectory(_))));
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_upload_tree() {
        let (mut session, dir) = session(MemoryStore::new());
        write(dir.path(), "src/main.rs", "fn main() {}");
        write(dir.path(), "src/lib/mod.rs", "mod a;");
        write(dir.path(), "src/lib/a.rs", "");

        let count = session
            .upload(false, Path::new("src"), "src", "src")
            .await
            .unwrap();

        assert_eq!(count, 3);
        let store = session.remote();
        assert_eq!(store.file("src/main.rs").unwrap(), Bytes::from("fn main() {}"));
        assert!(store.exists("src/lib/a.rs"));
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_upload_replaces_or_merges_directory() {
        let mut store = MemoryStore::new();
        store.insert_file("site/old.html", "old").unwrap();
        store.insert_file("site/index.html", "<p>").unwrap();
        let (mut session, dir) = session(store);
        write(dir.path(), "site/index.html", "</p>");

        let count = session
            .upload(true, Path::new("site"), "site", "site")
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(session.remote().exists("site/old.html"));
        assert_eq!(
            session.remote().file("site/index.html").unwrap(),
            Bytes::from("<p></p>")
        );

        let count = session
            .upload(false, Path::new("site"), "site", "site")
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(!session.remote().exists("site/old.html"));
        assert_eq!(
            session.remote().file("site/index.html").unwrap(),
            Bytes::from("</p>")
        );
    }

    #[tokio::test]
    async fn test_upload_directory_over_file() {
        let mut store = MemoryStore::new();
        store.insert_file("build", "stale").unwrap();
        let (mut session, dir) = session(store);
        write(dir.path(), "build/out.bin", "1");

        let count = session
            .upload(false, Path::new("build"), "build", "build")
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(session.remote().is_dir("build"));
    }

    #[tokio::test]
    async fn test_upload_missing_local() {
        let (mut session, _dir) = session(MemoryStore::new());
        let result = session.upload(false, Path::new("nope"), "nope", "").await;
        assert_eq!(result, Err(Error::InvalidPath("nope".to_owned())));
    }

    #[tokio::test]
    async fn test_remove_directory_counts_files() {
        let (mut session, _dir) = session(tree());
        session.cwd("a").await.unwrap();

        let count = session.remove_directory("sub", "a/sub").await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(session.pwd().await.unwrap(), "/a");
        assert!(!session.remote().exists("a/sub"));
        assert!(session.remote().exists("a/x.txt"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (mut session, dir) = session(tree());
        let downloaded = session
            .download("a", "a", Path::new(""), None)
            .await
            .unwrap();

        let removed = session.remove_directory("a", "a").await.unwrap();
        let uploaded = session
            .upload(false, &PathBuf::from("a"), "a", "a")
            .await
            .unwrap();

        assert_eq!(downloaded, 3);
        assert_eq!(removed, 3);
        assert_eq!(uploaded, 3);
        let store = session.remote();
        for path in ["a/x.txt", "a/sub/y.txt", "a/sub/deeper/z.txt"] {
            assert!(store.file(path).is_some(), "{path}");
        }
        assert!(store.is_dir("a/empty"));
        assert!(dir.path().join("a/sub/deeper").is_dir());
    }

    /// Refuses to delete one file name, anywhere in the tree.
    struct Locked {
        inner: MemoryStore,
        name: &'static str,
    }

    #[async_trait]
    impl RemoteDirectoryService for Locked {
        type Error = Error;

        async fn list(&mut self, path: Option<&str>) -> Result<Vec<DirectoryEntry>, Error> {
            self.inner.list(path).await
        }

        async fn get(&mut self, name: &str) -> Result<Bytes, Error> {
            self.inner.get(name).await
        }

        async fn put(&mut self, data: Bytes, name: &str) -> Result<(), Error> {
            self.inner.put(data, name).await
        }

        async fn append(&mut self, data: Bytes, name: &str) -> Result<(), Error> {
            self.inner.append(data, name).await
        }

        async fn delete(&mut self, name: &str) -> Result<(), Error> {
            if name == self.name {
                return Err(Error::Remote(format!("550 {name}: Permission denied")));
            }
            self.inner.delete(name).await
        }

        async fn rename(&mut self, from: &str, to: &str) -> Result<(), Error> {
            self.inner.rename(from, to).await
        }

        async fn mkdir(&mut self, name: &str) -> Result<(), Error> {
            self.inner.mkdir(name).await
        }

        async fn rmdir(&mut self, name: &str) -> Result<(), Error> {
            self.inner.rmdir(name).await
        }

        async fn cwd(&mut self, name: &str) -> Result<(), Error> {
            self.inner.cwd(name).await
        }

        async fn cdup(&mut self) -> Result<(), Error> {
            self.inner.cdup().await
        }

        async fn pwd(&mut self) -> Result<String, Error> {
            self.inner.pwd().await
        }
    }

    #[tokio::test]
    async fn test_upload_failure_deep_restores_cursor() {
        let mut store = MemoryStore::new();
        store.insert_dir("w/sub/deep/a.txt").unwrap();
        let (mut session, dir) = session(store);
        write(dir.path(), "sub/deep/a.txt", "a");
        session.cwd("w").await.unwrap();

        let result = session.upload(true, Path::new("sub"), "w/sub", "sub").await;
        assert_eq!(
            result,
            Err(Error::Remote("553 a.txt: Is a directory".to_owned()))
        );
        assert_eq!(session.pwd().await.unwrap(), "/w");
    }

    #[tokio::test]
    async fn test_remove_failure_deep_restores_cursor() {
        let mut inner = tree();
        inner.cwd("a").await.unwrap();
        let store = Locked {
            inner,
            name: "z.txt",
        };
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new(store, LocalFs::new(dir.path()));

        let result = session.remove_directory("sub", "a/sub").await;
        assert_eq!(
            result,
            Err(Error::Remote("550 z.txt: Permission denied".to_owned()))
        );
        assert_eq!(session.pwd().await.unwrap(), "/a");
        assert!(session.remote().inner.exists("a/sub/deeper/z.txt"));
        assert!(session.remote().inner.exists("a/x.txt"));
    }
}
