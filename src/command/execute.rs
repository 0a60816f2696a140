use serde::Serialize;
use std::path::{Path, PathBuf};

use super::{Command, Operation};
use crate::{
    error::{BatchResult, Error},
    local::LocalStorage,
    navigator::{OnMissing, Receipt},
    path,
    remote::{DirectoryEntry, RemoteDirectoryService},
    session::Session,
    utils,
};

/// What a command returned
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Output {
    /// Files transferred or deleted
    Count(usize),
    Flag(bool),
    Listing(Vec<DirectoryEntry>),
    /// Remote cursor location
    Path(String),
}

impl<R, L> Session<R, L>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
{
    /// Runs one command to completion. The remote cursor is where it was
    /// before the call on every exit path, except after a successful `cd`.
    pub async fn execute(&mut self, command: &Command) -> BatchResult<Output> {
        debug!("execute: {}", command.raw.trim());

        match &command.operation {
            Operation::List { path } => self.run_ls(path.as_deref()).await.map(Output::Listing),
            Operation::Get { remote, local } => self
                .run_get(remote, local.as_deref())
                .await
                .map(Output::Count),
            Operation::Put { local, remote } => self
                .run_put(false, local, remote.as_deref())
                .await
                .map(Output::Count),
            Operation::Append { local, remote } => self
                .run_put(true, local, remote.as_deref())
                .await
                .map(Output::Count),
            Operation::Rename { from, to } => {
                let _ = path::split(from, true)?;
                let _ = path::split(to, true)?;
                self.rename(from, to).await.map(|()| Output::Flag(true))
            }
            Operation::Delete { path } => self.run_delete(path).await.map(Output::Count),
            Operation::Cd { path } => self
                .cd(path, OnMissing::Fail)
                .await
                .map(|_| Output::Flag(true)),
            Operation::Mkdir { path } => self.run_mkdir(path).await.map(Output::Flag),
            Operation::Rmdir { path } => self.run_rmdir(path).await.map(Output::Count),
            Operation::Pwd => self.pwd().await.map(Output::Path),
        }
    }

    /// Undoes `receipt`, then hands back `result`. When both fail the
    /// operation's own error wins.
    async fn restore<T>(&mut self, receipt: Receipt, result: BatchResult<T>) -> BatchResult<T> {
        match (self.back(receipt).await, result) {
            (Ok(()), result) => result,
            (Err(restore), Err(error)) => {
                warn!("cursor not restored after \"{}\": {}", error, restore);
                Err(error)
            }
            (Err(restore), Ok(_)) => Err(restore),
        }
    }

    async fn run_ls(&mut self, path: Option<&str>) -> BatchResult<Vec<DirectoryEntry>> {
        let receipt = match path {
            Some(path) => self.cd(path, OnMissing::Fail).await?,
            None => Receipt::here(),
        };

        let result = self.list().await.map(|entries| {
            entries
                .into_iter()
                .filter(|e| !utils::is_marker(&e.name))
                .collect()
        });
        self.restore(receipt, result).await
    }

    async fn run_get(&mut self, remote: &str, local: Option<&str>) -> BatchResult<usize> {
        let _ = path::split(remote, true)?;
        let target = path::basename(remote);
        let (destination, rename_to) = self.destination(local, target.is_empty()).await;

        let receipt = self.cd(&path::dirname(remote), OnMissing::Fail).await?;
        let result = self
            .fetch(remote, &target, &destination, rename_to.as_deref())
            .await;
        self.restore(receipt, result).await
    }

    /// Where `get` writes to, and under which name when the remote target is
    /// renamed on the way.
    async fn destination(&self, local: Option<&str>, whole_dir: bool) -> (PathBuf, Option<String>) {
        let Some(local) = local else {
            return (PathBuf::new(), None);
        };

        let path = Path::new(local);
        if whole_dir || local.ends_with('/') || self.local.is_dir(path).await {
            return (path.to_path_buf(), None);
        }

        let name = utils::file_name(path);
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        (dir, (!name.is_empty()).then_some(name))
    }

    async fn fetch(
        &mut self,
        label: &str,
        target: &str,
        destination: &Path,
        rename_to: Option<&str>,
    ) -> BatchResult<usize> {
        if !self.local.exists(destination).await {
            self.local.create_dir(destination).await?;
        }

        self.download(label, target, destination, rename_to).await
    }

    async fn run_put(&mut self, append: bool, local: &str, remote: Option<&str>) -> BatchResult<usize> {
        let local_path = Path::new(local);
        if !self.local.exists(local_path).await {
            return Err(Error::InvalidPath(local.to_owned()));
        }

        let (dir, name) = match remote {
            Some(remote) => {
                let _ = path::split(remote, true)?;
                (path::dirname(remote), path::basename(remote))
            }
            None => (String::new(), String::new()),
        };
        let name = if name.is_empty() {
            utils::file_name(local_path)
        } else {
            name
        };
        if name.is_empty() || utils::is_marker(&name) {
            return Err(Error::InvalidPath(remote.unwrap_or(local).to_owned()));
        }
        let label = path::join(&dir, &name);

        let receipt = self.cd(&dir, OnMissing::Create).await?;
        let result = self.upload(append, local_path, &label, &name).await;
        self.restore(receipt, result).await
    }

    async fn run_delete(&mut self, target: &str) -> BatchResult<usize> {
        let name = leaf(target)?;

        let receipt = self.cd(&path::dirname(target), OnMissing::Skip).await?;
        if !receipt.success {
            warn!("{}: parent directory does not exist, skipped", target);
            self.back(receipt).await?;
            return Ok(0);
        }

        let result = self.remove_entry(target, &name).await;
        self.restore(receipt, result).await
    }

    async fn remove_entry(&mut self, label: &str, name: &str) -> BatchResult<usize> {
        let entry = self.lookup(name).await?;
        match entry {
            Some(entry) if entry.is_dir() => self.remove_directory(name, label).await,
            Some(_) => {
                self.delete(name).await?;
                Ok(1)
            }
            None => Err(Error::NotFound(label.to_owned())),
        }
    }

    async fn run_mkdir(&mut self, target: &str) -> BatchResult<bool> {
        let _ = path::split(target, true)?;
        let name = path::basename(target);

        let receipt = self.cd(&path::dirname(target), OnMissing::Create).await?;
        let result = self.make_dir(target, &name).await;
        self.restore(receipt, result).await
    }

    async fn make_dir(&mut self, label: &str, name: &str) -> BatchResult<bool> {
        if name.is_empty() {
            return Ok(true);
        }
        if utils::is_marker(name) {
            info!("{} already exists", label);
            return Ok(false);
        }

        let entry = self.lookup(name).await?;
        match entry {
            Some(entry) if entry.is_dir() => {
                info!("{} already exists", label);
                Ok(false)
            }
            Some(_) => Err(Error::NotADirectory(label.to_owned())),
            None => self.mkdir(name).await.map(|()| true),
        }
    }

    async fn run_rmdir(&mut self, target: &str) -> BatchResult<usize> {
        let name = leaf(target)?;

        let receipt = self.cd(&path::dirname(target), OnMissing::Fail).await?;
        let result = self.remove_named_dir(target, &name).await;
        self.restore(receipt, result).await
    }

    async fn remove_named_dir(&mut self, label: &str, name: &str) -> BatchResult<usize> {
        let entry = self.lookup(name).await?;
        match entry {
            Some(entry) if entry.is_dir() => self.remove_directory(name, label).await,
            Some(_) => Err(Error::NotADirectory(label.to_owned())),
            None => Err(Error::NotFound(label.to_owned())),
        }
    }
}

/// Final segment of a path naming an existing entry. Blank names and the
/// `.`/`..` markers never name one.
fn leaf(target: &str) -> BatchResult<String> {
    let _ = path::split(target, false)?;
    let name = path::basename(target);
    if name.is_empty() || utils::is_marker(&name) {
        return Err(Error::InvalidPath(target.to_owned()));
    }
    Ok(name)
}

#[cfg(test)]
mod test_execute {
    use bytes::Bytes;
    use std::fs;
    use tempfile::TempDir;

    use super::*;
    use crate::{local::LocalFs, remote::MemoryStore};

    fn session(store: MemoryStore) -> (Session<MemoryStore>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Session::new(store, LocalFs::new(dir.path())), dir)
    }

    async fn run(session: &mut Session<MemoryStore>, line: &str) -> BatchResult<Output> {
        session.execute(&Command::parse(line).unwrap()).await
    }

    #[tokio::test]
    async fn test_ls_skips_markers_and_restores() {
        let mut store = MemoryStore::new().with_markers();
        store.insert_file("docs/a.md", "# a").unwrap();
        store.insert_dir("docs/img").unwrap();
        let (mut session, _dir) = session(store);

        let Output::Listing(entries) = run(&mut session, "ls docs").await.unwrap() else {
            panic!("expected a listing");
        };
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.md", "img"]);
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_get_with_rename() {
        let mut store = MemoryStore::new();
        store.insert_file("pub/notes.txt", "n").unwrap();
        let (mut session, dir) = session(store);

        let output = run(&mut session, "get /pub/notes.txt saved/copy.txt").await;
        assert_eq!(output, Ok(Output::Count(1)));
        assert_eq!(
            fs::read_to_string(dir.path().join("saved/copy.txt")).unwrap(),
            "n"
        );
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_get_directory_contents() {
        let mut store = MemoryStore::new();
        store.insert_file("pub/a.txt", "a").unwrap();
        store.insert_file("pub/deep/b.txt", "b").unwrap();
        let (mut session, dir) = session(store);

        let output = run(&mut session, "get pub/ mirror").await;
        assert_eq!(output, Ok(Output::Count(2)));
        assert!(dir.path().join("mirror/a.txt").is_file());
        assert!(dir.path().join("mirror/deep/b.txt").is_file());
    }

    #[tokio::test]
    async fn test_get_missing_parent() {
        let (mut session, _dir) = session(MemoryStore::new());
        let output = run(&mut session, "get nowhere/file.txt").await;
        assert_eq!(output, Err(Error::NotFound("nowhere".to_owned())));
    }

    #[tokio::test]
    async fn test_put_creates_parents() {
        let (mut session, dir) = session(MemoryStore::new());
        fs::write(dir.path().join("report.csv"), "1,2").unwrap();

        let output = run(&mut session, "put report.csv out/2024/").await;
        assert_eq!(output, Ok(Output::Count(1)));
        assert_eq!(
            session.remote().file("out/2024/report.csv").unwrap(),
            Bytes::from("1,2")
        );
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_append_extends_file() {
        let mut store = MemoryStore::new();
        store.insert_file("log.txt", "a").unwrap();
        let (mut session, dir) = session(store);
        fs::write(dir.path().join("more.txt"), "b").unwrap();

        let output = run(&mut session, "append more.txt log.txt").await;
        assert_eq!(output, Ok(Output::Count(1)));
        assert_eq!(session.remote().file("log.txt").unwrap(), Bytes::from("ab"));
    }

    #[tokio::test]
    async fn test_put_missing_local() {
        let (mut session, _dir) = session(MemoryStore::new());
        let output = run(&mut session, "put ghost.txt dir/").await;
        assert_eq!(output, Err(Error::InvalidPath("ghost.txt".to_owned())));
        assert!(!session.remote().exists("dir"));
    }

    #[tokio::test]
    async fn test_rename() {
        let mut store = MemoryStore::new();
        store.insert_file("old.txt", "x").unwrap();
        let (mut session, _dir) = session(store);

        assert_eq!(
            run(&mut session, "rename old.txt new.txt").await,
            Ok(Output::Flag(true))
        );
        assert!(session.remote().exists("new.txt"));
        assert!(run(&mut session, "rename a//b c").await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let mut store = MemoryStore::new();
        store.insert_file("d/f.txt", "f").unwrap();
        store.insert_file("d/sub/g.txt", "g").unwrap();
        store.insert_file("d/sub/h.txt", "h").unwrap();
        let (mut session, _dir) = session(store);

        assert_eq!(run(&mut session, "delete d/f.txt").await, Ok(Output::Count(1)));
        assert_eq!(run(&mut session, "delete d/sub").await, Ok(Output::Count(2)));
        assert_eq!(
            run(&mut session, "delete d/gone").await,
            Err(Error::NotFound("d/gone".to_owned()))
        );
        assert!(session.remote().is_dir("d"));
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_delete_missing_parent_is_skipped() {
        let mut store = MemoryStore::new();
        store.insert_dir("a").unwrap();
        let (mut session, _dir) = session(store);

        assert_eq!(
            run(&mut session, "delete a/b/c.txt").await,
            Ok(Output::Count(0))
        );
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_cd_keeps_move() {
        let mut store = MemoryStore::new();
        store.insert_dir("a/b").unwrap();
        let (mut session, _dir) = session(store);

        assert_eq!(run(&mut session, "cd a/b").await, Ok(Output::Flag(true)));
        assert_eq!(
            run(&mut session, "pwd").await,
            Ok(Output::Path("/a/b".to_owned()))
        );
    }

    #[tokio::test]
    async fn test_mkdir() {
        let (mut session, _dir) = session(MemoryStore::new());

        assert_eq!(run(&mut session, "mkdir a/b/c").await, Ok(Output::Flag(true)));
        assert_eq!(run(&mut session, "mkdir a/b/c").await, Ok(Output::Flag(false)));
        assert!(session.remote().is_dir("a/b/c"));
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_rmdir_requires_directory() {
        let mut store = MemoryStore::new();
        store.insert_file("x/file", "f").unwrap();
        let (mut session, _dir) = session(store);

        assert_eq!(
            run(&mut session, "rmdir x/file").await,
            Err(Error::NotADirectory("x/file".to_owned()))
        );
        assert_eq!(
            run(&mut session, "rmdir x/none").await,
            Err(Error::NotFound("x/none".to_owned()))
        );
        assert_eq!(session.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_invalid_paths_touch_nothing() {
        let (mut session, _dir) = session(MemoryStore::new());
        for line in ["mkdir a//b", "cd /..", "delete dir/", "rmdir ."] {
            let error = run(&mut session, line).await.unwrap_err();
            assert!(error.is_parse_error(), "{line}: {error}");
        }
        assert!(!session.remote().exists("a"));
    }

    #[tokio::test]
    async fn test_markers_never_name_entries() {
        let mut store = MemoryStore::new().with_markers();
        store.insert_file("a/b/keep.txt", "k").unwrap();
        store.insert_file("a/sibling/s.txt", "s").unwrap();
        let (mut session, dir) = session(store);
        fs::write(dir.path().join("up.txt"), "u").unwrap();
        let _ = session.cd("a/b", OnMissing::Fail).await.unwrap();

        for line in ["rmdir ..", "delete ..", "rmdir ../..", "put up.txt .."] {
            assert_eq!(
                run(&mut session, line).await,
                Err(Error::InvalidPath(line.split(' ').last().unwrap().to_owned())),
                "{line}"
            );
        }
        assert_eq!(run(&mut session, "mkdir ..").await, Ok(Output::Flag(false)));
        assert!(session.remote().exists("a/b/keep.txt"));
        assert!(session.remote().exists("a/sibling/s.txt"));
        assert_eq!(session.pwd().await.unwrap(), "/a/b");

        assert_eq!(
            run(&mut session, "rmdir ../sibling").await,
            Ok(Output::Count(1))
        );
        assert!(!session.remote().exists("a/sibling"));
        assert!(session.remote().exists("a/b/keep.txt"));
        assert_eq!(session.pwd().await.unwrap(), "/a/b");
    }
}
