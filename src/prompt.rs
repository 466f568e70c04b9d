//! Operator prompts as a capability, so the install flow can be driven by a
//! scripted implementation in tests instead of real stdin reads.

use anyhow::{Context, Result};
use inquire::Confirm;

pub trait UserPrompt {
    /// Ask a yes/no question. The console implementation re-prompts on any
    /// input outside the accepted set.
    fn confirm(&mut self, question: &str) -> Result<bool>;

    /// Print a message and block until the operator presses enter.
    fn await_ready(&mut self, message: &str) -> Result<()>;
}

/// Line-based prompts on the controlling terminal.
pub struct ConsolePrompt;

impl UserPrompt for ConsolePrompt {
    fn confirm(&mut self, question: &str) -> Result<bool> {
        Confirm::new(question)
            .prompt()
            .map_err(|e| anyhow::anyhow!("prompt cancelled: {e}"))
    }

    fn await_ready(&mut self, message: &str) -> Result<()> {
        println!("{message}");
        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .context("failed to read from stdin")?;
        Ok(())
    }
}
