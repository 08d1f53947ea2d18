//! OpenVPN server provisioning.
//!
//! A [`Provisioner`] turns a [`ProvisionConfig`] into the step [`plan`],
//! runs it through a [`Driver`] and writes the exported client profile.
//! The first failing step aborts the run; nothing is retried or rolled
//! back.

mod config;
mod plan;

pub use config::{
    DEFAULT_CA_NAME, DEFAULT_IMAGE, DEFAULT_VOLUME, DEFAULT_VPN_PORT, MIN_PASSPHRASE_LEN,
    ProvisionConfig,
};
pub use plan::{COMPLETION_MARKER, Step, StepKind, easy_rsa_prompts, plan};

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::driver::Driver;
use crate::error::{ConfigError, Error, ProvisionError, Result};

/// Runs the provisioning plan against a driver.
pub struct Provisioner<'a, D: Driver> {
    driver: &'a D,
}

impl<'a, D: Driver> Provisioner<'a, D> {
    pub fn new(driver: &'a D) -> Self {
        Self { driver }
    }

    /// Provision the server and write the client profile.
    ///
    /// Returns the path of the written `.ovpn` file.
    pub async fn run(&self, config: &ProvisionConfig) -> Result<PathBuf> {
        config.validate()?;
        let steps = plan(config)?;
        let total = steps.len();
        let mut profile = None;

        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            info!("[{}/{}] {}", index, total, step.description);

            let captured = self.run_step(step).await.map_err(|source| ProvisionError::Step {
                index,
                description: step.description.to_string(),
                source: Box::new(source),
            })?;
            if captured.is_some() {
                profile = captured;
            }
        }

        let profile = profile.ok_or_else(|| ConfigError::Invalid {
            message: "plan has no capture step".to_string(),
        })?;
        let path = config.profile_path();
        write_profile(&path, &profile).await?;
        info!("client profile written to {}", path.display());

        Ok(path)
    }

    /// Run one step, returning stdout for capture steps.
    async fn run_step(&self, step: &Step) -> Result<Option<Vec<u8>>> {
        match &step.kind {
            StepKind::Run => {
                self.driver.execute(&step.command).await?;
                Ok(None)
            }
            StepKind::Interactive(prompts) => {
                let outcome = self.driver.run_interactive(&step.command, prompts).await?;
                if !outcome.completed {
                    warn!(
                        "'{}' exited without printing {:?}",
                        step.description,
                        prompts.completion()
                    );
                }
                Ok(None)
            }
            StepKind::Capture => {
                let output = self.driver.execute(&step.command).await?;
                Ok(Some(output.into_bytes()))
            }
        }
    }
}

async fn write_profile(path: &Path, profile: &[u8]) -> Result<()> {
    let output_error = |source: std::io::Error| -> Error {
        ProvisionError::Output {
            path: path.to_path_buf(),
            source,
        }
        .into()
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await.map_err(output_error)?;
    }
    tokio::fs::write(path, profile).await.map_err(output_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use secrecy::SecretString;

    use crate::channel::PromptTable;
    use crate::driver::{CommandOutput, InteractiveOutcome};
    use crate::error::SessionError;

    /// Records every call; fails the call whose command contains `fail_on`.
    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl RecordingDriver {
        fn record(&self, kind: &str, command: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", kind, command));
            match self.fail_on {
                Some(needle) if command.contains(needle) => {
                    Err(SessionError::ExitStatus { status: 125 }.into())
                }
                _ => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Driver for RecordingDriver {
        async fn execute(&self, command: &str) -> Result<CommandOutput> {
            self.record("exec", command)?;
            let stdout = if command.contains("ovpn_getclient") {
                b"client\nremote vpn.example.net 1194 udp\n".to_vec()
            } else {
                Vec::new()
            };
            Ok(CommandOutput::new(command, stdout, Duration::ZERO))
        }

        async fn run_interactive(
            &self,
            command: &str,
            prompts: &PromptTable,
        ) -> Result<InteractiveOutcome> {
            assert_eq!(prompts.completion(), COMPLETION_MARKER);
            self.record("interactive", command)?;
            Ok(InteractiveOutcome {
                completed: true,
                replies_sent: 2,
                elapsed: Duration::ZERO,
            })
        }
    }

    fn config(dir: &Path) -> ProvisionConfig {
        ProvisionConfig::new("vpn.example.net", "alice", SecretString::from("s3cret!".to_string()))
            .with_output_dir(dir)
    }

    #[tokio::test]
    async fn test_runs_all_steps_and_writes_profile() {
        let dir = tempfile::tempdir().unwrap();
        let driver = RecordingDriver::default();

        let path = Provisioner::new(&driver).run(&config(dir.path())).await.unwrap();

        assert_eq!(path, dir.path().join("alice.ovpn"));
        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"client\nremote vpn.example.net 1194 udp\n"
        );

        let calls = driver.calls();
        assert_eq!(calls.len(), 7);
        assert!(calls[0].starts_with("exec apt install"));
        assert!(calls[2].starts_with("interactive ") && calls[2].ends_with("ovpn_initpki"));
        assert!(calls[5].contains("build-client-full alice nopass"));
        assert!(calls[6].ends_with("ovpn_getclient alice"));
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let driver = RecordingDriver {
            fail_on: Some("ovpn_initpki"),
            ..Default::default()
        };

        let result = Provisioner::new(&driver).run(&config(dir.path())).await;

        match result {
            Err(Error::Provision(ProvisionError::Step {
                index, description, ..
            })) => {
                assert_eq!(index, 3);
                assert_eq!(description, "initialise PKI");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(driver.calls().len(), 3);
        assert!(!dir.path().join("alice.ovpn").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let driver = RecordingDriver::default();
        let config = ProvisionConfig::new(
            "vpn.example.net",
            "alice",
            SecretString::from("no".to_string()),
        )
        .with_output_dir(dir.path());

        let result = Provisioner::new(&driver).run(&config).await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("profiles/2026");
        let driver = RecordingDriver::default();

        let path = Provisioner::new(&driver).run(&config(&nested)).await.unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.is_file());
    }
}
