use std::env;
use std::io;

use crossterm::tty::IsTty;

/// Prompt prefix used when `CSHELL_PROMPT` is unset.
pub const DEFAULT_PROMPT: &str = "CustomShell>";
/// The line that ends the read loop.
pub const EXIT_KEYWORD: &str = "quit";

/// Settings for one shell session, taken from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub prompt: String,
    /// Show a prompt and the farewell message.
    pub interactive: bool,
}

impl Config {
    pub fn from_env() -> Self {
        let prompt = env::var("CSHELL_PROMPT")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        Self {
            prompt,
            interactive: io::stdin().is_tty(),
        }
    }

    /// Settings for running input that does not come from a person.
    pub fn batch() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            interactive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::test_lock;

    #[test]
    fn test_batch_is_not_interactive() {
        let config = Config::batch();
        assert!(!config.interactive);
        assert_eq!(config.prompt, DEFAULT_PROMPT);
    }

    #[test]
    fn test_prompt_override_from_env() {
        let _guard = test_lock();

        env::set_var("CSHELL_PROMPT", "pipes$");
        assert_eq!(Config::from_env().prompt, "pipes$");

        env::set_var("CSHELL_PROMPT", "  \t ");
        assert_eq!(Config::from_env().prompt, DEFAULT_PROMPT);

        env::remove_var("CSHELL_PROMPT");
        assert_eq!(Config::from_env().prompt, DEFAULT_PROMPT);
    }
}
