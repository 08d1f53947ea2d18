//! Channel layer: transcript windows and prompt detection.
//!
//! This module holds the pure matching machinery used by the interactive
//! driver, independent of any transport.

mod console;
mod prompts;
mod scanner;
mod transcript;

pub use console::Console;
pub use prompts::{Prompt, PromptTable, PromptTableBuilder, Reply};
pub use scanner::{PromptScanner, ScanEvent};
pub use transcript::Transcript;
