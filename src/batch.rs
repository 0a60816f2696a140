//! Sequential batch runs with one success/failure record.

use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::{
    command::{Command, Output},
    error::BatchResult,
    local::LocalStorage,
    remote::RemoteDirectoryService,
    session::Session,
};

/// Options of a batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Abort with the first error instead of capturing it in the outcome
    pub propagate_errors: bool,
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn propagate_errors(mut self, propagate: bool) -> Self {
        self.propagate_errors = propagate;
        self
    }
}

/// What a batch did before it finished or stopped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Number of commands that completed
    pub succeed: usize,
    /// Text of the captured failure
    pub message: Option<String>,
    /// Return value of each completed command by position
    pub outputs: BTreeMap<usize, Output>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.message.is_none()
    }

    pub fn output(&self, index: usize) -> Option<&Output> {
        self.outputs.get(&index)
    }

    fn failed(mut self, message: String) -> Self {
        self.message = Some(message);
        self
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.outputs.len() + 2))?;
        map.serialize_entry("succeed", &self.succeed)?;
        map.serialize_entry("message", &self.message)?;
        for (index, output) in &self.outputs {
            map.serialize_entry(&format!("output_{index}"), output)?;
        }
        map.end()
    }
}

/// Parses every line, then runs the commands in order against `session`.
///
/// Nothing is executed when a line fails to parse. Execution stops at the
/// first failing command. With [`BatchOptions::propagate_errors`] the error
/// is returned, otherwise it is recorded in the [`Outcome`].
pub async fn run<R, L, I, S>(
    session: &mut Session<R, L>,
    lines: I,
    options: &BatchOptions,
) -> BatchResult<Outcome>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let outcome = Outcome::default();

    let commands = match lines
        .into_iter()
        .map(|line| Command::parse(line.as_ref()))
        .collect::<BatchResult<Vec<_>>>()
    {
        Ok(commands) => commands,
        Err(error) if options.propagate_errors => return Err(error),
        Err(error) => {
            warn!("batch rejected: {}", error);
            return Ok(outcome.failed(error.to_string()));
        }
    };

    info!("batch of {} commands", commands.len());
    execute_all(session, &commands, options, outcome).await
}

async fn execute_all<R, L>(
    session: &mut Session<R, L>,
    commands: &[Command],
    options: &BatchOptions,
    mut outcome: Outcome,
) -> BatchResult<Outcome>
where
    R: RemoteDirectoryService,
    L: LocalStorage,
{
    for (index, command) in commands.iter().enumerate() {
        match session.execute(command).await {
            Ok(output) => {
                let _ = outcome.outputs.insert(index, output);
                outcome.succeed += 1;
            }
            Err(error) if options.propagate_errors => return Err(error),
            Err(error) => {
                warn!("command {} ({}) failed: {}", index, command.operation.name(), error);
                return Ok(outcome.failed(error.to_string()));
            }
        }
    }

    info!("batch finished, {} succeeded", outcome.succeed);
    Ok(outcome)
}
