//! Local child-process transport.
//!
//! Runs commands through a local shell with piped stdio. Useful for
//! rehearsing a provisioning plan on the current machine and for
//! exercising the session automaton without an SSH server.

use std::path::PathBuf;
use std::process::Stdio;

use log::debug;
use tokio::process::{Child, Command};

use super::session::{ExitStatus, Launch, RemoteSession, SessionIo, Transport};
use crate::error::{Result, SessionError};

/// Transport spawning one local process per session.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    shell: PathBuf,
}

impl LocalTransport {
    /// Use `sh` from `PATH` as the shell.
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Use a specific POSIX shell binary.
    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for LocalTransport {
    type Session = LocalSession;

    async fn open_session(&self) -> Result<LocalSession> {
        Ok(LocalSession {
            shell: self.shell.clone(),
            child: None,
        })
    }
}

/// A local process session. The child is killed if the session is dropped
/// before it exits.
pub struct LocalSession {
    shell: PathBuf,
    child: Option<Child>,
}

impl RemoteSession for LocalSession {
    async fn start(&mut self, launch: Launch) -> Result<SessionIo> {
        if self.child.is_some() {
            return Err(SessionError::AlreadyStarted.into());
        }

        let mut command = Command::new(&self.shell);
        if let Launch::Exec(line) = &launch {
            command.arg("-c").arg(line);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(SessionError::Io)?;
        debug!("spawned local {} (pid {:?})", launch.describe(), child.id());

        let rejected = || SessionError::StartRejected {
            what: launch.describe(),
        };
        let stdout = child.stdout.take().ok_or_else(rejected)?;
        let stderr = child.stderr.take().ok_or_else(rejected)?;
        let stdin = child.stdin.take().ok_or_else(rejected)?;
        self.child = Some(child);

        Ok(SessionIo {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            stdin: Box::new(stdin),
        })
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let child = self.child.as_mut().ok_or(SessionError::NotStarted)?;
        let status = child.wait().await.map_err(SessionError::Io)?;
        Ok(exit_status(status))
    }

    async fn close(mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait().map_err(SessionError::Io)?.is_none() {
                child.kill().await.map_err(SessionError::Io)?;
            }
        }
        Ok(())
    }
}

fn exit_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        return ExitStatus::Code(code as u32);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitStatus::Signal(signal.to_string());
        }
    }
    ExitStatus::Missing
}
