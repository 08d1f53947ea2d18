//! Per-invocation session contract shared by all transports.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Result, SessionError};

/// Readable half of a remote output stream (stdout or stderr).
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Writable remote standard input.
pub type InputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// What a session runs once started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launch {
    /// One-shot command execution.
    Exec(String),

    /// Interactive shell fed through standard input.
    Shell,
}

impl Launch {
    /// Short label used in errors and logs.
    pub fn describe(&self) -> String {
        match self {
            Launch::Exec(command) => format!("command '{}'", command),
            Launch::Shell => "shell".to_string(),
        }
    }
}

/// The three streams of a started session.
pub struct SessionIo {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub stdin: InputStream,
}

/// How the remote process finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitStatus {
    /// Exited normally with this status code.
    Code(u32),

    /// Terminated by the named signal.
    Signal(String),

    /// The channel closed without reporting either.
    Missing,
}

impl ExitStatus {
    /// Map anything other than a zero exit code to an error.
    pub fn into_result(self) -> std::result::Result<(), SessionError> {
        match self {
            ExitStatus::Code(0) => Ok(()),
            ExitStatus::Code(status) => Err(SessionError::ExitStatus { status }),
            ExitStatus::Signal(signal) => Err(SessionError::ExitSignal { signal }),
            ExitStatus::Missing => Err(SessionError::ExitMissing),
        }
    }
}

/// One execution context bound to a single command or shell.
///
/// Implementations must release every resource when dropped, so that a
/// session is torn down even when the owning future is cancelled.
pub trait RemoteSession: Send {
    /// Start the process and hand out its streams.
    ///
    /// Streams can only be acquired once; a second call fails with
    /// [`SessionError::AlreadyStarted`].
    fn start(&mut self, launch: Launch) -> impl Future<Output = Result<SessionIo>> + Send;

    /// Block until the process finishes.
    fn wait(&mut self) -> impl Future<Output = Result<ExitStatus>> + Send;

    /// Release the session.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}

/// A connection able to open independent sessions.
pub trait Transport: Send + Sync {
    type Session: RemoteSession;

    /// Open a fresh, unstarted session.
    fn open_session(&self) -> impl Future<Output = Result<Self::Session>> + Send;
}
