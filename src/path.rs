//! Remote path strings.
//!
//! The remote store is only ever addressed through lists of segments, relative
//! to the cursor or absolute from the root. Everything that accepts a path
//! string goes through [`split`] so that all components agree on what a path
//! means and which strings are rejected.

use std::fmt;

use crate::error::{BatchResult, Error};

fn is_blank(segment: &str) -> bool {
    segment.trim().is_empty()
}

/// Splits `path` on `/` and validates the segments.
///
/// A blank segment is accepted only first (absolute path) or, when
/// `allow_trailing_blank` is set, last (the path names a directory). `.` is
/// accepted only first. `..` is accepted only while nothing but `..` has been
/// seen, so it can never climb above the root or out of a named segment.
pub fn split(path: &str, allow_trailing_blank: bool) -> BatchResult<Vec<String>> {
    if is_blank(path) {
        return Err(Error::InvalidPath(path.to_owned()));
    }

    let parts: Vec<&str> = path.split('/').collect();
    let last = parts.len() - 1;
    let absolute = is_blank(parts[0]);
    let mut seen = false;

    for (i, part) in parts.iter().enumerate() {
        let valid = match *part {
            p if is_blank(p) => {
                i == 0 || (i == last && (allow_trailing_blank || (absolute && i == 1)))
            }
            "." => i == 0,
            ".." => !seen,
            _ => true,
        };

        if !valid {
            return Err(Error::InvalidPath(path.to_owned()));
        }

        if *part != ".." {
            seen = true;
        }
    }

    Ok(parts.into_iter().map(ToOwned::to_owned).collect())
}

/// Everything but the last segment. Blank for `.` and single relative names,
/// `/` for children of the root, and `path` itself when it ends with `/`.
pub fn dirname(path: &str) -> String {
    if is_blank(path) || path == "." {
        return String::new();
    }

    if path.ends_with('/') {
        return path.to_owned();
    }

    let mut parts: Vec<&str> = path.split('/').collect();
    let _ = parts.pop();

    match parts.join("/") {
        dir if dir.is_empty() && path.starts_with('/') => "/".to_owned(),
        dir => dir,
    }
}

/// The last segment, or blank when `path` names a directory.
pub fn basename(path: &str) -> String {
    if is_blank(path) || path == "." || path.ends_with('/') {
        return String::new();
    }

    path.rsplit('/').next().unwrap_or_default().to_owned()
}

/// Inverse of [`dirname`]/[`basename`].
pub fn join(dir: &str, name: &str) -> String {
    match dir {
        "" => name.to_owned(),
        d if d.ends_with('/') => format!("{d}{name}"),
        d => format!("{d}/{name}"),
    }
}

/// A validated remote path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    segments: Vec<String>,
}

impl RemotePath {
    pub fn parse(path: &str) -> BatchResult<Self> {
        split(path, true).map(|segments| Self { segments })
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// True iff the first segment is blank.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.segments.first().is_some_and(|s| is_blank(s))
    }

    /// True iff the path ends with `/`.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.segments.len() > 1 && self.segments.last().is_some_and(|s| is_blank(s))
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.segments.as_slice() {
            [root] if is_blank(root) => f.write_str("/"),
            segments => f.write_str(&segments.join("/")),
        }
    }
}
