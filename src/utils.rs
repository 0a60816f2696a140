use chrono::{DateTime, Utc};
use std::{path::Path, time::SystemTime};

pub fn unix(time: SystemTime) -> u32 {
    u32::try_from(DateTime::<Utc>::from(time).timestamp()).unwrap_or_default()
}

/// Splits a cursor location reported by `pwd` into `["", a, b, ...]`.
pub fn absolute_segments(pwd: &str) -> Vec<String> {
    std::iter::once(String::new())
        .chain(
            pwd.split('/')
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned),
        )
        .collect()
}

/// Directory markers some servers put in listings.
pub fn is_marker(name: &str) -> bool {
    name == "." || name == ".."
}

/// Last component of a local path, blank for `.`, `..` and roots.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
