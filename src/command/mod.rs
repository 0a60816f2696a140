//! Command parsing and execution.
//!
//! A line of text becomes a [`Command`] in two steps: [`tokenize`] splits it
//! into shell-like tokens, then the first token selects an [`Operation`] and
//! the argument count is checked against what that operation accepts. Lines
//! that fail either step never reach the remote store.

mod execute;
mod lexer;

pub use execute::Output;
pub use lexer::tokenize;

use std::str::FromStr;

use crate::error::{BatchResult, Error};

/// An operation with its arguments bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// `ls [path]`
    List { path: Option<String> },
    /// `get remote [local]`
    Get {
        remote: String,
        local: Option<String>,
    },
    /// `put local [remote]`
    Put {
        local: String,
        remote: Option<String>,
    },
    /// `append local [remote]`
    Append {
        local: String,
        remote: Option<String>,
    },
    /// `rename from to`
    Rename { from: String, to: String },
    /// `delete path`
    Delete { path: String },
    /// `cd path`
    Cd { path: String },
    /// `mkdir path`
    Mkdir { path: String },
    /// `rmdir path`
    Rmdir { path: String },
    /// `pwd`
    Pwd,
}

impl Operation {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "ls",
            Self::Get { .. } => "get",
            Self::Put { .. } => "put",
            Self::Append { .. } => "append",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::Cd { .. } => "cd",
            Self::Mkdir { .. } => "mkdir",
            Self::Rmdir { .. } => "rmdir",
            Self::Pwd => "pwd",
        }
    }

    fn bind(argv: &[String]) -> Option<Self> {
        let (name, args) = argv.split_first()?;
        let arg = |i: usize| args.get(i).cloned();
        let first = || args[0].clone();

        let operation = match (name.as_str(), args.len()) {
            ("ls", 0..=1) => Self::List { path: arg(0) },
            ("get", 1..=2) => Self::Get {
                remote: first(),
                local: arg(1),
            },
            ("put", 1..=2) => Self::Put {
                local: first(),
                remote: arg(1),
            },
            ("append", 1..=2) => Self::Append {
                local: first(),
                remote: arg(1),
            },
            ("rename", 2) => Self::Rename {
                from: first(),
                to: args[1].clone(),
            },
            ("delete", 1) => Self::Delete { path: first() },
            ("cd", 1) => Self::Cd { path: first() },
            ("mkdir", 1) => Self::Mkdir { path: first() },
            ("rmdir", 1) => Self::Rmdir { path: first() },
            ("pwd", 0) => Self::Pwd,
            _ => return None,
        };

        Some(operation)
    }
}

/// A parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub raw: String,
    pub argv: Vec<String>,
    pub operation: Operation,
}

impl Command {
    /// Tokenizes and binds `line`. Unknown names and wrong argument counts
    /// fail with [`Error::UnsupportedCommand`].
    pub fn parse(line: &str) -> BatchResult<Self> {
        let argv = tokenize(line);
        let operation = Operation::bind(&argv)
            .ok_or_else(|| Error::UnsupportedCommand(line.trim().to_owned()))?;

        Ok(Self {
            raw: line.to_owned(),
            argv,
            operation,
        })
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        Self::parse(line)
    }
}
