//! Transport layer: connections and the sessions opened on them.
//!
//! A [`Transport`] hands out one [`RemoteSession`] per invocation. The SSH
//! transport wraps russh; the local transport runs child processes.

pub mod config;
mod local;
mod session;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use local::{LocalSession, LocalTransport};
pub use session::{
    ExitStatus, InputStream, Launch, OutputStream, RemoteSession, SessionIo, Transport,
};
pub use ssh::{SshSession, SshTransport};
