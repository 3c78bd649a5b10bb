//! Interactive confirmation prompts (`--assume-yes` bypasses these).

use dialoguer::{Confirm as DialoguerConfirm, theme::ColorfulTheme};
use std::io::{self, IsTerminal};

/// Whether a terminal is attached to both stdin and stdout.
#[must_use]
pub fn is_interactive() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

/// A yes/no confirmation. Outside a terminal, returns the configured
/// default rather than blocking.
pub struct Confirm {
    message: String,
    default: Option<bool>,
}

impl Confirm {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), default: None }
    }

    #[must_use]
    pub const fn default(mut self, value: bool) -> Self {
        self.default = Some(value);
        self
    }

    pub fn prompt(self) -> io::Result<bool> {
        if !is_interactive() {
            return Ok(self.default.unwrap_or(false));
        }

        let theme = ColorfulTheme::default();
        let mut prompt = DialoguerConfirm::with_theme(&theme).with_prompt(&self.message);
        if let Some(default) = self.default {
            prompt = prompt.default(default);
        }
        prompt.interact().map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_interactive_does_not_panic() {
        let _ = is_interactive();
    }
}
