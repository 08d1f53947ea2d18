//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use super::session::{ExitStatus, Launch, RemoteSession, SessionIo, Transport};
use crate::error::{Result, SessionError, TransportError};

/// Buffer size of the in-process pipes bridging a channel to its streams.
const PIPE_CAPACITY: usize = 64 * 1024;

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            let stored = host_key_error
                .lock()
                .ok()
                .and_then(|mut slot| slot.take());
            stored.unwrap_or_else(|| match e {
                russh::Error::IO(source) => TransportError::ConnectionFailed {
                    host: config.host.clone(),
                    port: config.port,
                    source,
                },
                e => TransportError::Ssh(e),
            })
        })?;

        Self::authenticate(&mut session, &config).await?;
        debug!("authenticated as '{}'", config.username);

        Ok(Self { session, config })
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => session
                .authenticate_password(&config.username, password.expose_secret())
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(format!("{}: {}", path.display(), e)))?;

                // Get the best RSA hash algorithm supported by the server
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(TransportError::Ssh)?
                    .flatten();

                session
                    .authenticate_publickey(
                        &config.username,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(TransportError::Ssh)?
                    .success()
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    /// Close the connection.
    pub async fn close(self) -> Result<()> {
        debug!("disconnecting from {}", self.config.socket_addr());
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }
}

impl Transport for SshTransport {
    type Session = SshSession;

    async fn open_session(&self) -> Result<SshSession> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;
        trace!("opened session channel {:?}", channel.id());

        Ok(SshSession {
            channel: Some(channel),
            pump: None,
        })
    }
}

/// One SSH session channel running a single command or shell.
///
/// Once started, a pump task owns the channel: it demultiplexes channel
/// messages into stdout/stderr pipes and forwards the stdin pipe to the
/// remote side. Dropping the session aborts the pump, which drops the
/// channel.
pub struct SshSession {
    channel: Option<Channel<Msg>>,
    pump: Option<JoinHandle<Result<ExitStatus>>>,
}

impl RemoteSession for SshSession {
    async fn start(&mut self, launch: Launch) -> Result<SessionIo> {
        let mut channel = self.channel.take().ok_or(SessionError::AlreadyStarted)?;

        let requested = match &launch {
            Launch::Exec(command) => channel.exec(true, command.as_str()).await,
            Launch::Shell => channel.request_shell(true).await,
        };
        requested.map_err(SessionError::Ssh)?;

        // Output can race the request reply; keep it for the pump.
        let mut early = Vec::new();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::Success) => break,
                Some(ChannelMsg::Failure) | Some(ChannelMsg::Close) | None => {
                    return Err(SessionError::StartRejected {
                        what: launch.describe(),
                    }
                    .into());
                }
                Some(msg) => early.push(msg),
            }
        }
        debug!("started {}", launch.describe());

        let (stdout_tx, stdout_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let (stderr_tx, stderr_rx) = tokio::io::duplex(PIPE_CAPACITY);
        let (stdin_tx, stdin_rx) = tokio::io::duplex(PIPE_CAPACITY);

        let pump = Pump {
            stdout: Some(stdout_tx),
            stderr: Some(stderr_tx),
            status: ExitStatus::Missing,
        };
        self.pump = Some(tokio::spawn(pump.run(channel, early, stdin_rx)));

        Ok(SessionIo {
            stdout: Box::new(stdout_rx),
            stderr: Box::new(stderr_rx),
            stdin: Box::new(stdin_tx),
        })
    }

    async fn wait(&mut self) -> Result<ExitStatus> {
        let pump = self.pump.as_mut().ok_or(SessionError::NotStarted)?;
        let status = pump
            .await
            .map_err(|e| SessionError::Task(e.to_string()))??;
        self.pump = None;
        Ok(status)
    }

    async fn close(mut self) -> Result<()> {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        if let Some(channel) = self.channel.take() {
            channel.close().await.map_err(SessionError::Ssh)?;
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Output side of a running channel.
struct Pump {
    stdout: Option<DuplexStream>,
    stderr: Option<DuplexStream>,
    status: ExitStatus,
}

impl Pump {
    async fn run(
        mut self,
        mut channel: Channel<Msg>,
        early: Vec<ChannelMsg>,
        mut stdin: DuplexStream,
    ) -> Result<ExitStatus> {
        for msg in early {
            if !self.handle(msg).await {
                return Ok(self.status);
            }
        }

        let mut buf = vec![0u8; 8192];
        let mut input_open = true;

        loop {
            tokio::select! {
                msg = channel.wait() => match msg {
                    Some(msg) => {
                        if !self.handle(msg).await {
                            break;
                        }
                    }
                    None => break,
                },
                read = stdin.read(&mut buf), if input_open => match read {
                    Ok(0) | Err(_) => {
                        input_open = false;
                        trace!("stdin closed, sending EOF");
                        channel.eof().await.map_err(SessionError::Ssh)?;
                    }
                    Ok(n) => {
                        channel.data(&buf[..n]).await.map_err(SessionError::Ssh)?;
                    }
                },
            }
        }

        Ok(self.status)
    }

    /// Route one channel message. Returns false once the channel is closed.
    async fn handle(&mut self, msg: ChannelMsg) -> bool {
        match msg {
            ChannelMsg::Data { data } => forward(&mut self.stdout, &data, "stdout").await,
            ChannelMsg::ExtendedData { data, ext: 1 } => {
                forward(&mut self.stderr, &data, "stderr").await
            }
            ChannelMsg::ExitStatus { exit_status } => {
                debug!("remote exit status {}", exit_status);
                self.status = ExitStatus::Code(exit_status);
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                debug!("remote killed by signal {:?}", signal_name);
                self.status = ExitStatus::Signal(format!("{:?}", signal_name));
            }
            ChannelMsg::Eof => {
                // Readers see end-of-stream once the pipes are dropped
                self.stdout = None;
                self.stderr = None;
            }
            ChannelMsg::Close => return false,
            other => trace!("ignoring channel message {:?}", other),
        }
        true
    }
}

/// Write remote output into a pipe, dropping the pipe once its reader is gone.
async fn forward(pipe: &mut Option<DuplexStream>, data: &[u8], name: &str) {
    if let Some(writer) = pipe {
        if writer.write_all(data).await.is_err() {
            trace!("{} reader gone, discarding further output", name);
            *pipe = None;
        }
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
