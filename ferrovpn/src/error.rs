//! Error types for ferrovpn.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ferrovpn operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session (single command or shell) errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid configuration, detected before any remote action
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provisioning sequence errors
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Server host key is not in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Server host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Session errors (starting, feeding and waiting on one remote process).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The server refused the exec or shell request
    #[error("Remote refused to start {what}")]
    StartRejected { what: String },

    /// Session streams were already handed out
    #[error("Session already started")]
    AlreadyStarted,

    /// Session was waited on before being started
    #[error("Session not started")]
    NotStarted,

    /// Remote process exited with a non-zero status
    #[error("Process exited with status {status}")]
    ExitStatus { status: u32 },

    /// Remote process was killed by a signal
    #[error("Process killed by signal {signal}")]
    ExitSignal { signal: String },

    /// Channel closed without reporting an exit status
    #[error("Process exited without reporting a status")]
    ExitMissing,

    /// Interactive session did not finish within the deadline
    #[error("Session did not finish within {0:?}")]
    Timeout(Duration),

    /// A background stream task panicked or was cancelled
    #[error("Stream task failed: {0}")]
    Task(String),

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// I/O error on a session stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration errors (prompt tables, credentials, provisioning inputs).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A prompt marker was empty
    #[error("Prompt marker must not be empty")]
    EmptyMarker,

    /// The completion marker was empty
    #[error("Completion marker must not be empty")]
    EmptyCompletion,

    /// The same marker was registered twice
    #[error("Duplicate prompt marker '{marker}'")]
    DuplicateMarker { marker: String },

    /// A required setting is missing or malformed
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Provisioning sequence errors.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A step of the sequence failed; later steps were not run
    #[error("Step {index} ({description}) failed: {source}")]
    Step {
        index: usize,
        description: String,
        #[source]
        source: Box<Error>,
    },

    /// The client profile could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type alias using ferrovpn's Error.
pub type Result<T> = std::result::Result<T, Error>;
