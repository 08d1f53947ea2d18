//! # ferrovpn
//!
//! Provision an OpenVPN server over SSH.
//!
//! ferrovpn runs a fixed sequence of Docker commands on a remote host and
//! drives the interactive easy-rsa steps by watching their output for
//! prompts and typing the configured replies.
//!
//! ## Features
//!
//! - Async SSH via russh, one session channel per command
//! - Non-interactive execution with live output mirroring and capture
//! - Byte-level prompt automation with a single-writer stdin relay
//! - Bounded transcript windows, deterministic multi-match order
//! - Local child-process transport for rehearsal and testing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrovpn::{DriverBuilder, ProvisionConfig, Provisioner};
//! use secrecy::SecretString;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrovpn::Error> {
//!     let driver = DriverBuilder::new("203.0.113.7")
//!         .username("root")
//!         .private_key("/home/me/.ssh/id_rsa")
//!         .connect()
//!         .await?;
//!
//!     let config = ProvisionConfig::new(
//!         "203.0.113.7",
//!         "alice",
//!         SecretString::from("correct horse".to_string()),
//!     );
//!     let profile = Provisioner::new(&driver).run(&config).await?;
//!     println!("wrote {}", profile.display());
//!
//!     driver.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod provision;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Console, PromptTable};
pub use driver::{
    CommandOutput, Driver, DriverBuilder, GenericDriver, InteractiveOptions, InteractiveOutcome,
};
pub use error::Error;
pub use provision::{ProvisionConfig, Provisioner};
pub use transport::{AuthMethod, HostKeyVerification, LocalTransport, SshConfig, SshTransport};
