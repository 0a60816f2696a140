//! Moving the remote cursor.
//!
//! The remote store has no random access: every request is relative to the
//! cursor. Navigation therefore walks a target path one segment at a time and
//! hands back a [`Receipt`] describing how to return. Receipts are consumed by
//! [`Session::back`], which every operation calls on all of its exit paths.

use crate::{
    error::{BatchResult, Error},
    local::LocalStorage,
    path::RemotePath,
    remote::RemoteDirectoryService,
    session::Session,
    utils,
};

/// How to reverse a cursor move
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Back {
    /// Move up this many levels
    Hops(usize),
    /// Navigate to this absolute path
    Path(String),
}

/// Result of a cursor move
#[derive(Debug, PartialEq, Eq)]
pub struct Receipt {
    /// `false` when a soft-failing walk stopped at a missing segment
    pub success: bool,
    pub back: Back,
}

impl Receipt {
    /// A move that did not move.
    #[must_use]
    pub const fn here() -> Self {
        Self {
            success: true,
            back: Back::Hops(0),
        }
    }
}

/// What to do when a path segment does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// Create the directory and continue
    Create,
    /// Fail with [`Error::NotFound`]
    Fail,
    /// Stop and return an unsuccessful receipt
    Skip,
}

/// Segments to walk, and the target they were derived from
struct Route {
    segments: Vec<String>,
    /// Leading `..` segments
    hops: usize,
    /// Segments of `target` the hops stand in for
    shared: usize,
    target: Vec<String>,
}

impl Route {
    fn direct(segments: Vec<String>) -> Self {
        Self {
            target: segments.clone(),
            segments,
            hops: 0,
            shared: 0,
        }
    }

    /// The target as given, up to the segment walked at `index`.
    fn label(&self, index: usize) -> String {
        match index.checked_sub(self.hops) {
            Some(offset) => self.target[..=self.shared + offset].join("/"),
            None => self.segments[..=index].join("/"),
        }
    }
}

impl<R, L> Session<R, L>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
{
    /// Rewrites an absolute target as a relative one when it shares more than
    /// the root with the cursor location, saving the trip through the root.
    /// Relative targets are returned unchanged.
    pub async fn combine(&mut self, target: &[String]) -> BatchResult<Vec<String>> {
        self.route(target).await.map(|route| route.segments)
    }

    async fn route(&mut self, target: &[String]) -> BatchResult<Route> {
        let absolute = target.first().is_some_and(|s| s.trim().is_empty());
        if !absolute {
            return Ok(Route::direct(target.to_vec()));
        }

        let target: Vec<String> = target
            .iter()
            .enumerate()
            .filter(|(i, s)| *i == 0 || !s.trim().is_empty())
            .map(|(_, s)| s.clone())
            .collect();

        let current = utils::absolute_segments(&self.pwd().await?);
        let divergence = current
            .iter()
            .zip(target.iter())
            .take_while(|(c, t)| c == t)
            .count();

        if divergence <= 1 {
            return Ok(Route::direct(target));
        }

        let hops = current.len() - divergence;
        Ok(Route {
            segments: std::iter::repeat("..".to_owned())
                .take(hops)
                .chain(target[divergence..].iter().cloned())
                .collect(),
            hops,
            shared: divergence,
            target,
        })
    }

    /// Moves the cursor to `path`. A blank path is a no-op.
    ///
    /// On error the cursor is put back where it was before the error is
    /// returned. A soft failure ([`OnMissing::Skip`]) leaves the partial move
    /// in place; the caller undoes it with the returned receipt.
    pub async fn cd(&mut self, path: &str, on_missing: OnMissing) -> BatchResult<Receipt> {
        if path.trim().is_empty() {
            return Ok(Receipt::here());
        }

        let path = RemotePath::parse(path)?;
        self.cd_segments(path.segments(), on_missing).await
    }

    /// Same as [`Session::cd`] for an already split path.
    pub async fn cd_segments(
        &mut self,
        segments: &[String],
        on_missing: OnMissing,
    ) -> BatchResult<Receipt> {
        let route = self.route(segments).await?;
        debug!("cd {:?}", route.segments);

        let mut back = Back::Hops(0);
        match self.walk(&route, on_missing, &mut back).await {
            Ok(success) => Ok(Receipt { success, back }),
            Err(error) => {
                let receipt = Receipt {
                    success: false,
                    back,
                };
                if let Err(restore) = self.back(receipt).await {
                    warn!("cursor not restored after \"{}\": {}", error, restore);
                }
                Err(error)
            }
        }
    }

    /// Climbs to the root. Returns the location before the climb.
    pub async fn root(&mut self) -> BatchResult<String> {
        let pwd = self.pwd().await?;
        let depth = utils::absolute_segments(&pwd).len() - 1;
        self.climb(depth).await?;
        Ok(pwd)
    }

    /// Reverses the move described by `receipt`.
    pub async fn back(&mut self, receipt: Receipt) -> BatchResult<()> {
        match receipt.back {
            Back::Hops(hops) => self.climb(hops).await,
            Back::Path(path) => {
                debug!("back to {}", path);
                let route = self.route(&utils::absolute_segments(&path)).await?;
                let mut scratch = Back::Hops(0);
                self.walk(&route, OnMissing::Fail, &mut scratch)
                    .await
                    .map(|_| ())
            }
        }
    }

    async fn walk(
        &mut self,
        route: &Route,
        on_missing: OnMissing,
        back: &mut Back,
    ) -> BatchResult<bool> {
        for (i, segment) in route.segments.iter().enumerate() {
            match segment.as_str() {
                s if s.trim().is_empty() => {
                    if i == 0 {
                        *back = Back::Path(self.root().await?);
                    }
                }
                "." if i == 0 => {}
                ".." => {
                    if let Back::Hops(hops) = *back {
                        let mut origin = utils::absolute_segments(&self.pwd().await?);
                        origin.truncate(origin.len().saturating_sub(hops).max(1));
                        *back = Back::Path(RemotePath::from_segments(origin).to_string());
                    }
                    self.cdup().await?;
                }
                name => {
                    let label = || route.label(i);
                    let entry = self.lookup(name).await?;
                    match entry {
                        Some(entry) if entry.is_file() => {
                            return Err(Error::NotADirectory(label()))
                        }
                        Some(_) => {}
                        None => match on_missing {
                            OnMissing::Create => self.mkdir(name).await?,
                            OnMissing::Fail => return Err(Error::NotFound(label())),
                            OnMissing::Skip => return Ok(false),
                        },
                    }

                    self.cwd(name).await?;
                    if let Back::Hops(hops) = back {
                        *hops += 1;
                    }
                }
            }
        }

        Ok(true)
    }
}
