//! High-level driver for remote command execution.
//!
//! The driver layer provides the main API: run a command and capture its
//! output, or drive an interactive shell through a prompt table.

mod builder;
mod executor;
mod generic;
mod interactive;
pub(crate) mod response;

pub use builder::DriverBuilder;
pub use generic::GenericDriver;
pub use interactive::InteractiveOptions;
pub use response::{CommandOutput, InteractiveOutcome};

use std::future::Future;

use crate::channel::PromptTable;
use crate::error::Result;

/// Trait for remote command drivers.
pub trait Driver: Send + Sync {
    /// Run a command to completion, mirroring its output and capturing stdout.
    ///
    /// A non-zero exit status is returned as an error.
    fn execute(&self, command: &str) -> impl Future<Output = Result<CommandOutput>> + Send;

    /// Run commands sequentially, stopping at the first failure.
    fn execute_all(
        &self,
        commands: &[&str],
    ) -> impl Future<Output = Result<Vec<CommandOutput>>> + Send {
        async move {
            let mut outputs = Vec::with_capacity(commands.len());
            for command in commands {
                outputs.push(self.execute(command).await?);
            }
            Ok(outputs)
        }
    }

    /// Type `command` into an interactive shell and answer its prompts.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use ferrovpn::{Driver, PromptTable};
    ///
    /// # async fn example(driver: &impl Driver) -> Result<(), ferrovpn::Error> {
    /// let prompts = PromptTable::builder("Data Base Updated")
    ///     .prompt("removal:", "yes")
    ///     .build()?;
    /// let outcome = driver.run_interactive("easyrsa init-pki", &prompts).await?;
    /// assert!(outcome.completed);
    /// # Ok(())
    /// # }
    /// ```
    fn run_interactive(
        &self,
        command: &str,
        prompts: &PromptTable,
    ) -> impl Future<Output = Result<InteractiveOutcome>> + Send;
}
