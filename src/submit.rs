use std::process::Command;

use crate::error::{Result, StagehandError};
use crate::queue::JobQueue;

/// The submit collaborator: hands one fully-formed command string to the
/// cluster scheduler (or runs it locally). Job ids are never inspected.
pub trait Submitter {
    fn submit(&mut self, command: &str) -> Result<()>;
}

/// Runs the command through the shell and checks its exit status.
pub struct ShellSubmitter;

impl Submitter for ShellSubmitter {
    fn submit(&mut self, command: &str) -> Result<()> {
        tracing::info!(command, "submitting");
        let status = Command::new("sh").arg("-c").arg(command).status()?;
        if !status.success() {
            return Err(StagehandError::SubmitFailed {
                command: command.to_string(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Hand each command to the submitter as it is built.
    Immediate,
    /// Append each command to the persistent admission queue.
    Queue,
}

/// Routes stage commands to the submit collaborator or the admission
/// queue. The mode is explicit state chosen once at startup and threaded
/// through the driver; there is no process-wide flag.
pub struct Dispatcher {
    mode: DispatchMode,
    submit_prefix: String,
    queue: JobQueue,
    submitter: Box<dyn Submitter>,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode, submit_prefix: String, queue: JobQueue) -> Self {
        Self::with_submitter(mode, submit_prefix, queue, Box::new(ShellSubmitter))
    }

    pub fn with_submitter(
        mode: DispatchMode,
        submit_prefix: String,
        queue: JobQueue,
        submitter: Box<dyn Submitter>,
    ) -> Self {
        Self {
            mode,
            submit_prefix,
            queue,
            submitter,
        }
    }

    /// Wrap an inner stage command with the submit prefix and either
    /// submit it now or queue it for a later admission cycle.
    pub fn dispatch(&mut self, inner: &str) -> Result<()> {
        let command = if self.submit_prefix.is_empty() {
            inner.to_string()
        } else {
            format!("{} '{}'", self.submit_prefix, inner)
        };
        match self.mode {
            DispatchMode::Immediate => self.submitter.submit(&command),
            DispatchMode::Queue => {
                self.queue.enqueue(&command)?;
                Ok(())
            }
        }
    }
}
