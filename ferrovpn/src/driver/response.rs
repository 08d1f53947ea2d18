//! Output types for command execution.

use std::time::Duration;

/// Captured result of a non-interactive command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// The command that was executed.
    pub command: String,

    /// Everything the command wrote to standard output, in order.
    pub stdout: Vec<u8>,

    /// Time taken to execute the command.
    pub elapsed: Duration,
}

impl CommandOutput {
    pub fn new(command: impl Into<String>, stdout: Vec<u8>, elapsed: Duration) -> Self {
        Self {
            command: command.into(),
            stdout,
            elapsed,
        }
    }

    /// Get the output as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Take the raw output bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.stdout
    }
}

impl std::fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

/// Summary of an interactive run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveOutcome {
    /// Whether the completion marker was observed.
    pub completed: bool,

    /// Number of prompt replies written to the shell.
    pub replies_sent: usize,

    /// Time from session start to shell exit.
    pub elapsed: Duration,
}
