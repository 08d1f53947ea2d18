//! Where mirrored session output goes.

use tokio::io::AsyncWrite;

/// Destination for echoed remote output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Console {
    /// Mirror remote stdout to local stdout and remote stderr to local stderr.
    #[default]
    Terminal,

    /// Discard the mirror; output is still captured where applicable.
    Quiet,
}

impl Console {
    /// Writer receiving remote standard output.
    pub fn stdout(self) -> Box<dyn AsyncWrite + Send + Unpin> {
        match self {
            Console::Terminal => Box::new(tokio::io::stdout()),
            Console::Quiet => Box::new(tokio::io::sink()),
        }
    }

    /// Writer receiving remote standard error.
    pub fn stderr(self) -> Box<dyn AsyncWrite + Send + Unpin> {
        match self {
            Console::Terminal => Box::new(tokio::io::stderr()),
            Console::Quiet => Box::new(tokio::io::sink()),
        }
    }
}
