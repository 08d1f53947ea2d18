//! Inputs of an OpenVPN provisioning run.

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Docker image providing the OpenVPN server and easy-rsa.
pub const DEFAULT_IMAGE: &str = "kylemanna/openvpn";

/// Docker volume holding the server configuration and PKI.
pub const DEFAULT_VOLUME: &str = "ovpn-data";

/// UDP port the server listens on.
pub const DEFAULT_VPN_PORT: u16 = 1194;

/// Common name given to the certificate authority.
pub const DEFAULT_CA_NAME: &str = "ferrovpn-RSA CA";

/// easy-rsa refuses shorter passphrases.
pub const MIN_PASSPHRASE_LEN: usize = 4;

/// Everything needed to provision a server and issue one client profile.
#[derive(Debug)]
pub struct ProvisionConfig {
    /// Public hostname or address clients connect to.
    pub host: String,

    /// Client certificate name; also names the profile file.
    pub client: String,

    /// CA key passphrase.
    pub passphrase: SecretString,

    /// CA common name.
    pub ca_name: String,

    pub image: String,

    pub volume: String,

    pub vpn_port: u16,

    /// Directory the `<client>.ovpn` profile is written to.
    pub output_dir: PathBuf,
}

impl ProvisionConfig {
    /// Create a config with default image, volume, port and CA name.
    pub fn new(
        host: impl Into<String>,
        client: impl Into<String>,
        passphrase: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            client: client.into(),
            passphrase,
            ca_name: DEFAULT_CA_NAME.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            volume: DEFAULT_VOLUME.to_string(),
            vpn_port: DEFAULT_VPN_PORT,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_ca_name(mut self, ca_name: impl Into<String>) -> Self {
        self.ca_name = ca_name.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = volume.into();
        self
    }

    pub fn with_vpn_port(mut self, port: u16) -> Self {
        self.vpn_port = port;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Where the client profile is written.
    pub fn profile_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.ovpn", self.client))
    }

    /// Reject values that would break the remote commands.
    ///
    /// Host, client, image and volume are interpolated into shell command
    /// lines, so they are limited to characters that need no quoting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_word("host", &self.host, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']')
        })?;
        check_word("client name", &self.client, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
        })?;
        check_word("image", &self.image, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '/' | ':')
        })?;
        check_word("volume", &self.volume, |c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')
        })?;

        if self.client.starts_with('.') {
            return Err(invalid("client name must not start with '.'"));
        }
        if self.vpn_port == 0 {
            return Err(invalid("VPN port must not be 0"));
        }
        if self.ca_name.trim().is_empty() {
            return Err(invalid("CA name must not be empty"));
        }
        if self.ca_name.contains('\n') {
            return Err(invalid("CA name must be a single line"));
        }

        let passphrase = self.passphrase.expose_secret();
        if passphrase.len() < MIN_PASSPHRASE_LEN {
            return Err(invalid(&format!(
                "passphrase must be at least {} characters",
                MIN_PASSPHRASE_LEN
            )));
        }
        if passphrase.contains('\n') {
            return Err(invalid("passphrase must be a single line"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

fn check_word(what: &str, value: &str, allowed: impl Fn(char) -> bool) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(&format!("{} is required", what)));
    }
    if let Some(bad) = value.chars().find(|&c| !allowed(c)) {
        return Err(invalid(&format!("{} contains invalid character {:?}", what, bad)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ProvisionConfig {
        ProvisionConfig::new("vpn.example.net", "alice", SecretString::from("s3cret!".to_string()))
    }

    #[test]
    fn test_defaults_validate() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.vpn_port, DEFAULT_VPN_PORT);
        assert_eq!(config.profile_path(), PathBuf::from("./alice.ovpn"));
    }

    #[test]
    fn test_rejects_shell_metacharacters() {
        let config = ProvisionConfig::new(
            "vpn.example.net",
            "alice; rm -rf /",
            SecretString::from("s3cret!".to_string()),
        );
        assert!(config.validate().is_err());

        let config = ProvisionConfig::new(
            "$(reboot)",
            "alice",
            SecretString::from("s3cret!".to_string()),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_short_passphrase() {
        let config =
            ProvisionConfig::new("vpn.example.net", "alice", SecretString::from("abc".to_string()));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_passphrase_not_in_debug() {
        assert!(!format!("{:?}", config()).contains("s3cret!"));
    }
}
