//! Builder for connecting an SSH-backed driver.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::generic::GenericDriver;
use crate::channel::Console;
use crate::error::{ConfigError, Result};
use crate::transport::{AuthMethod, HostKeyVerification, SshConfig, SshTransport};

/// Builder for constructing an SSH driver.
///
/// # Example
///
/// ```rust,no_run
/// use ferrovpn::DriverBuilder;
///
/// # async fn example() -> Result<(), ferrovpn::Error> {
/// let driver = DriverBuilder::new("203.0.113.7")
///     .username("root")
///     .private_key("/home/me/.ssh/id_ed25519")
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct DriverBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    timeout: Duration,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    console: Console,
    interactive_timeout: Option<Duration>,
}

impl DriverBuilder {
    /// Create a new driver builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            timeout: Duration::from_secs(30),
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            console: Console::default(),
            interactive_timeout: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        };
        self
    }

    /// Set private key authentication with passphrase.
    pub fn private_key_with_passphrase(
        mut self,
        key_path: impl Into<PathBuf>,
        passphrase: SecretString,
    ) -> Self {
        self.auth = AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: Some(passphrase),
        };
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Set where remote output is echoed.
    pub fn console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Bound how long interactive shells may run.
    pub fn interactive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.interactive_timeout = timeout;
        self
    }

    /// Validate the settings into an [`SshConfig`] without connecting.
    pub fn into_config(self) -> Result<(SshConfig, Console, Option<Duration>)> {
        let username = self.username.ok_or_else(|| ConfigError::Invalid {
            message: "Username is required".to_string(),
        })?;

        if self.host.is_empty() {
            return Err(ConfigError::Invalid {
                message: "Host is required".to_string(),
            }
            .into());
        }

        if let AuthMethod::PrivateKey { path, .. } = &self.auth {
            if !path.is_file() {
                return Err(ConfigError::Invalid {
                    message: format!("Private key {} not found", path.display()),
                }
                .into());
            }
        }

        let ssh_config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        Ok((ssh_config, self.console, self.interactive_timeout))
    }

    /// Connect, authenticate and return the driver.
    pub async fn connect(self) -> Result<GenericDriver<SshTransport>> {
        let (ssh_config, console, interactive_timeout) = self.into_config()?;
        let transport = SshTransport::connect(ssh_config).await?;

        Ok(GenericDriver::new(transport)
            .with_console(console)
            .with_interactive_timeout(interactive_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_username_required() {
        let result = DriverBuilder::new("host").into_config();
        assert!(matches!(result, Err(Error::Config(ConfigError::Invalid { .. }))));
    }

    #[test]
    fn test_missing_key_rejected_before_connecting() {
        let result = DriverBuilder::new("host")
            .username("root")
            .private_key("/nonexistent/ferrovpn/id_rsa")
            .into_config();
        assert!(matches!(result, Err(Error::Config(ConfigError::Invalid { .. }))));
    }

    #[test]
    fn test_config_fields() {
        let (config, console, interactive_timeout) = DriverBuilder::new("vpn.example.net")
            .port(2222)
            .username("admin")
            .password("pw")
            .host_key_verification(HostKeyVerification::Strict)
            .console(Console::Quiet)
            .interactive_timeout(Some(Duration::from_secs(600)))
            .into_config()
            .unwrap();

        assert_eq!(config.socket_addr(), "vpn.example.net:2222");
        assert_eq!(config.username, "admin");
        assert_eq!(config.host_key_verification, HostKeyVerification::Strict);
        assert!(matches!(config.auth, AuthMethod::Password(_)));
        assert_eq!(console, Console::Quiet);
        assert_eq!(interactive_timeout, Some(Duration::from_secs(600)));
    }
}
