#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

/// Batch runner
pub mod batch;
/// Command language
pub mod command;
mod error;
pub mod local;
pub mod navigator;
pub mod path;
/// Remote directory stores
pub mod remote;
pub mod session;
pub mod transfer;
mod utils;

pub use batch::{run, BatchOptions, Outcome};
pub use command::{Command, Operation, Output};
pub use error::{BatchResult, Error};
pub use local::{LocalFs, LocalStorage};
pub use remote::{DirectoryEntry, DirectoryStore, EntryKind, MemoryStore, RemoteDirectoryService};
pub use session::Session;
