//! Generic driver implementation that works with any transport.

use std::time::Duration;

use super::Driver;
use super::executor;
use super::interactive::{self, InteractiveOptions};
use super::response::{CommandOutput, InteractiveOutcome};
use crate::channel::{Console, PromptTable};
use crate::error::Result;
use crate::transport::{SshTransport, Transport};

/// Driver running every invocation in its own session on `T`.
pub struct GenericDriver<T: Transport> {
    transport: T,
    console: Console,
    interactive_timeout: Option<Duration>,
}

impl<T: Transport> GenericDriver<T> {
    /// Create a driver that echoes to the terminal and never times out
    /// interactive runs.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            console: Console::default(),
            interactive_timeout: None,
        }
    }

    /// Set where remote output is echoed.
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Bound how long an interactive shell may run.
    pub fn with_interactive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.interactive_timeout = timeout;
        self
    }

    /// Get a reference to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the driver, returning the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn interactive_options(&self) -> InteractiveOptions {
        InteractiveOptions {
            timeout: self.interactive_timeout,
            console: self.console,
        }
    }
}

impl GenericDriver<SshTransport> {
    /// Disconnect from the server.
    pub async fn close(self) -> Result<()> {
        self.transport.close().await
    }
}

impl<T: Transport> Driver for GenericDriver<T> {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        executor::execute(&self.transport, command, self.console).await
    }

    async fn run_interactive(
        &self,
        command: &str,
        prompts: &PromptTable,
    ) -> Result<InteractiveOutcome> {
        interactive::run_interactive(
            &self.transport,
            command,
            prompts,
            &self.interactive_options(),
        )
        .await
    }
}
