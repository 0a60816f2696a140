use bytes::{Bytes, BytesMut};
use std::{collections::BTreeMap, time::SystemTime};

use super::{DirectoryEntry, EntryKind, RemoteDirectoryService};
use crate::{error::Error, utils};

#[derive(Debug, Clone)]
enum Node {
    File { data: Bytes, modified: u32 },
    Directory(BTreeMap<String, Node>),
}

impl Node {
    fn file(data: Bytes) -> Self {
        Self::File {
            data,
            modified: utils::unix(SystemTime::now()),
        }
    }

    fn entry(name: &str, node: &Self) -> DirectoryEntry {
        match node {
            Self::File { data, modified } => DirectoryEntry {
                name: name.to_owned(),
                kind: EntryKind::File,
                size: Some(data.len() as u64),
                modified: Some(*modified),
            },
            Self::Directory(_) => DirectoryEntry::directory(name),
        }
    }
}

fn no_such_file(name: &str) -> Error {
    Error::Remote(format!("550 {name}: No such file or directory"))
}

/// In-memory remote store with its own cursor.
///
/// Behaves like a strict FTP server: `mkdir` on an existing name, `rmdir` on a
/// non-empty directory and `cwd` into a file all fail.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: Node,
    cursor: Vec<String>,
    markers: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Node::Directory(BTreeMap::new()),
            cursor: vec![],
            markers: false,
        }
    }

    /// Include `.` and `..` records in every listing.
    #[must_use]
    pub const fn with_markers(mut self) -> Self {
        self.markers = true;
        self
    }

    /// Creates `path` (relative to the root) and any missing parents.
    pub fn insert_dir(&mut self, path: &str) -> Result<(), Error> {
        let mut current = vec![];
        for name in Self::components(path) {
            current.push(name);
            let (parent, leaf) = Self::parent_of(&current)?;
            let children = self.dir_mut(parent).ok_or_else(|| no_such_file(path))?;
            match children.get(leaf) {
                Some(Node::Directory(_)) => {}
                Some(Node::File { .. }) => return Err(no_such_file(path)),
                None => {
                    let _ = children.insert(leaf.to_owned(), Node::Directory(BTreeMap::new()));
                }
            }
        }
        Ok(())
    }

    /// Writes a file at `path` (relative to the root), creating parents.
    pub fn insert_file<T: Into<Bytes>>(&mut self, path: &str, data: T) -> Result<(), Error> {
        let components = Self::components(path);
        let (parent, leaf) = Self::parent_of(&components)?;
        self.insert_dir(&parent.join("/"))?;
        let children = self.dir_mut(parent).ok_or_else(|| no_such_file(path))?;
        let _ = children.insert(leaf.to_owned(), Node::file(data.into()));
        Ok(())
    }

    /// Contents of the file at `path` (relative to the root).
    pub fn file(&self, path: &str) -> Option<Bytes> {
        match self.node(&Self::components(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.node(&Self::components(path)),
            Some(Node::Directory(_))
        )
    }

    pub fn exists(&self, path: &str) -> bool {
        self.node(&Self::components(path)).is_some()
    }

    fn components(path: &str) -> Vec<String> {
        path.split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .map(ToOwned::to_owned)
            .collect()
    }

    fn parent_of(path: &[String]) -> Result<(&[String], &str), Error> {
        match path.split_last() {
            Some((leaf, parent)) => Ok((parent, leaf.as_str())),
            None => Err(Error::Remote("550 Invalid file name".to_owned())),
        }
    }

    /// Resolves `name` against the cursor into components from the root.
    fn resolve(&self, name: &str) -> Vec<String> {
        let mut resolved = if name.starts_with('/') {
            vec![]
        } else {
            self.cursor.clone()
        };

        for part in name.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    let _ = resolved.pop();
                }
                p => resolved.push(p.to_owned()),
            }
        }

        resolved
    }

    fn node(&self, path: &[String]) -> Option<&Node> {
        path.iter().try_fold(&self.root, |node, name| match node {
            Node::Directory(children) => children.get(name),
            Node::File { .. } => None,
        })
    }

    fn dir_mut(&mut self, path: &[String]) -> Option<&mut BTreeMap<String, Node>> {
        let mut node = &mut self.root;
        for name in path {
            node = match node {
                Node::Directory(children) => children.get_mut(name)?,
                Node::File { .. } => return None,
            };
        }

        match node {
            Node::Directory(children) => Some(children),
            Node::File { .. } => None,
        }
    }

    fn store(&mut self, data: Bytes, name: &str, append: bool) -> Result<(), Error> {
        let path = self.resolve(name);
        let (parent, leaf) = Self::parent_of(&path)?;
        let children = self.dir_mut(parent).ok_or_else(|| no_such_file(name))?;

        let data = match children.get(leaf) {
            Some(Node::Directory(_)) => {
                return Err(Error::Remote(format!("553 {name}: Is a directory")))
            }
            Some(Node::File { data: existing, .. }) if append => {
                let mut joined = BytesMut::from(&existing[..]);
                joined.extend_from_slice(&data);
                joined.freeze()
            }
            _ => data,
        };

        let _ = children.insert(leaf.to_owned(), Node::file(data));
        Ok(())
    }
}

#[async_trait]
impl RemoteDirectoryService for MemoryStore {
    type Error = Error;

    async fn list(&mut self, path: Option<&str>) -> Result<Vec<DirectoryEntry>, Self::Error> {
        let label = path.unwrap_or(".");
        let resolved = self.resolve(label);
        let children = match self.node(&resolved) {
            Some(Node::Directory(children)) => children,
            Some(node @ Node::File { .. }) => {
                let name = resolved.last().map_or(label, String::as_str);
                return Ok(vec![Node::entry(name, node)]);
            }
            None => return Err(no_such_file(label)),
        };

        let markers = if self.markers {
            vec![DirectoryEntry::directory("."), DirectoryEntry::directory("..")]
        } else {
            vec![]
        };

        Ok(markers
            .into_iter()
            .chain(children.iter().map(|(name, node)| Node::entry(name, node)))
            .collect())
    }

    async fn get(&mut self, name: &str) -> Result<Bytes, Self::Error> {
        match self.node(&self.resolve(name)) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(no_such_file(name)),
        }
    }

    async fn put(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error> {
        self.store(data, name, false)
    }

    async fn append(&mut self, data: Bytes, name: &str) -> Result<(), Self::Error> {
        self.store(data, name, true)
    }

    async fn delete(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name);
        let (parent, leaf) = Self::parent_of(&path)?;
        let children = self.dir_mut(parent).ok_or_else(|| no_such_file(name))?;
        if !matches!(children.get(leaf), Some(Node::File { .. })) {
            return Err(no_such_file(name));
        }

        let _ = children.remove(leaf);
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        let source = self.resolve(from);
        let target = self.resolve(to);
        if target.starts_with(&source) {
            return Err(Error::Remote(format!("553 {to}: Invalid target")));
        }

        let (to_parent, to_leaf) = Self::parent_of(&target)?;
        if !matches!(self.node(to_parent), Some(Node::Directory(_))) {
            return Err(no_such_file(to));
        }

        let (from_parent, from_leaf) = Self::parent_of(&source)?;
        let node = self
            .dir_mut(from_parent)
            .and_then(|children| children.remove(from_leaf))
            .ok_or_else(|| no_such_file(from))?;

        let children = self.dir_mut(to_parent).ok_or_else(|| no_such_file(to))?;
        let _ = children.insert(to_leaf.to_owned(), node);
        Ok(())
    }

    async fn mkdir(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name);
        let (parent, leaf) = Self::parent_of(&path)?;
        let children = self.dir_mut(parent).ok_or_else(|| no_such_file(name))?;
        if children.contains_key(leaf) {
            return Err(Error::Remote(format!("550 {name}: File exists")));
        }

        let _ = children.insert(leaf.to_owned(), Node::Directory(BTreeMap::new()));
        Ok(())
    }

    async fn rmdir(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name);
        if self.cursor.starts_with(&path) {
            return Err(Error::Remote(format!("550 {name}: Directory in use")));
        }

        let (parent, leaf) = Self::parent_of(&path)?;
        let children = self.dir_mut(parent).ok_or_else(|| no_such_file(name))?;
        let empty = match children.get(leaf) {
            Some(Node::Directory(inner)) => inner.is_empty(),
            _ => return Err(no_such_file(name)),
        };

        if !empty {
            return Err(Error::Remote(format!("550 {name}: Directory not empty")));
        }

        let _ = children.remove(leaf);
        Ok(())
    }

    async fn cwd(&mut self, name: &str) -> Result<(), Self::Error> {
        let path = self.resolve(name);
        match self.node(&path) {
            Some(Node::Directory(_)) => {
                self.cursor = path;
                Ok(())
            }
            Some(Node::File { .. }) => Err(Error::Remote(format!("550 {name}: Not a directory"))),
            None => Err(no_such_file(name)),
        }
    }

    async fn cdup(&mut self) -> Result<(), Self::Error> {
        let _ = self.cursor.pop();
        Ok(())
    }

    async fn pwd(&mut self) -> Result<String, Self::Error> {
        Ok(format!("/{}", self.cursor.join("/")))
    }
}

#[cfg(test)]
mod test_memory_store {
    use super::*;

    #[tokio::test]
    async fn test_cursor_moves() {
        let mut store = MemoryStore::new();
        store.insert_dir("a/b").unwrap();

        assert_eq!(store.pwd().await.unwrap(), "/");
        store.cwd("a").await.unwrap();
        store.cwd("b").await.unwrap();
        assert_eq!(store.pwd().await.unwrap(), "/a/b");
        store.cdup().await.unwrap();
        assert_eq!(store.pwd().await.unwrap(), "/a");
        store.cdup().await.unwrap();
        store.cdup().await.unwrap();
        assert_eq!(store.pwd().await.unwrap(), "/");
    }

    #[tokio::test]
    async fn test_strict_failures() {
        let mut store = MemoryStore::new();
        store.insert_file("d/f.txt", "x").unwrap();

        assert!(store.mkdir("d").await.is_err());
        assert!(store.rmdir("d").await.is_err());
        assert!(store.cwd("d/f.txt").await.is_err());
        assert!(store.get("missing").await.is_err());
        assert!(store.delete("d").await.is_err());
    }

    #[tokio::test]
    async fn test_put_append_rename() {
        let mut store = MemoryStore::new();
        store.put(Bytes::from("ab"), "f").await.unwrap();
        store.append(Bytes::from("cd"), "f").await.unwrap();
        store.append(Bytes::from("new"), "g").await.unwrap();
        store.mkdir("dir").await.unwrap();
        store.rename("f", "dir/h").await.unwrap();

        assert_eq!(store.file("dir/h").unwrap(), Bytes::from("abcd"));
        assert_eq!(store.file("g").unwrap(), Bytes::from("new"));
        assert!(!store.exists("f"));
    }

    #[tokio::test]
    async fn test_listing_markers() {
        let mut store = MemoryStore::new().with_markers();
        store.insert_file("f", "1").unwrap();

        let names: Vec<String> = store
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec![".", "..", "f"]);
    }
}
