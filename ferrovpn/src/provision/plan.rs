//! The ordered command sequence that sets up the server.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use super::config::ProvisionConfig;
use crate::channel::PromptTable;
use crate::error::ConfigError;

/// Printed by easy-rsa once the certificate database is written.
pub const COMPLETION_MARKER: &str = "Data Base Updated";

/// How a step is run.
#[derive(Debug, Clone)]
pub enum StepKind {
    /// Run to completion; output is only mirrored.
    Run,

    /// Run in a shell, answering prompts from the table.
    Interactive(PromptTable),

    /// Run to completion and keep stdout as the client profile.
    Capture,
}

/// One provisioning step.
#[derive(Debug, Clone)]
pub struct Step {
    pub description: &'static str,
    pub command: String,
    pub kind: StepKind,
}

impl Step {
    fn run(description: &'static str, command: String) -> Self {
        Self {
            description,
            command,
            kind: StepKind::Run,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.kind {
            StepKind::Run => "run",
            StepKind::Interactive(_) => "interactive",
            StepKind::Capture => "capture",
        };
        write!(f, "{} [{}]: {}", self.description, mode, self.command)
    }
}

/// Replies for the easy-rsa prompts seen during PKI setup and client issuance.
pub fn easy_rsa_prompts(config: &ProvisionConfig) -> Result<PromptTable, ConfigError> {
    let passphrase = || SecretString::from(config.passphrase.expose_secret().to_string());
    PromptTable::builder(COMPLETION_MARKER)
        .secret_prompt("phrase:", passphrase())
        .secret_prompt("private/ca.key:", passphrase())
        .prompt("removal:", "yes")
        .prompt("[Easy-RSA CA]:", config.ca_name.clone())
        .build()
}

/// Build the full step list for `config`.
pub fn plan(config: &ProvisionConfig) -> Result<Vec<Step>, ConfigError> {
    let prompts = easy_rsa_prompts(config)?;
    let volume = format!("-v {}:/etc/openvpn", config.volume);
    let image = &config.image;
    let client = &config.client;

    Ok(vec![
        Step::run("install docker", "apt install docker.io -y".to_string()),
        Step::run(
            "generate server config",
            format!(
                "docker run {} --rm {} ovpn_genconfig -u udp://{}",
                volume, image, config.host
            ),
        ),
        Step {
            description: "initialise PKI",
            command: format!("docker run {} --rm -i {} ovpn_initpki", volume, image),
            kind: StepKind::Interactive(prompts.clone()),
        },
        Step::run(
            "remove old server container",
            "docker stop openvpn || true && docker rm openvpn || true".to_string(),
        ),
        Step::run(
            "start server",
            format!(
                "docker run {} -d --name openvpn -p {}:1194/udp --cap-add=NET_ADMIN {}",
                volume, config.vpn_port, image
            ),
        ),
        Step {
            description: "issue client certificate",
            command: format!(
                "docker run {} --rm -i {} easyrsa build-client-full {} nopass",
                volume, image, client
            ),
            kind: StepKind::Interactive(prompts),
        },
        Step {
            description: "export client profile",
            command: format!("docker run {} --rm {} ovpn_getclient {}", volume, image, client),
            kind: StepKind::Capture,
        },
    ])
}
