use std::fmt;

/// One program invocation: `args[0]` is the program, the rest are its arguments.
///
/// A command parsed from a blank stage is empty. Empty commands are never
/// launched; the executors treat them as no-ops.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a stage on runs of spaces and tabs. No quoting is recognised.
    pub fn parse(input: &str) -> Self {
        Self::new(input.split([' ', '\t']).filter(|part| !part.is_empty()))
    }

    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_on_spaces_and_tabs() {
        let cmd = Command::parse("  tr \ta-z   A-Z\t");
        assert_eq!(cmd.args(), ["tr", "a-z", "A-Z"]);
        assert_eq!(cmd.program(), Some("tr"));
    }

    #[test]
    fn test_parse_keeps_quotes_literally() {
        let cmd = Command::parse("echo 'a b'");
        assert_eq!(cmd.args(), ["echo", "'a", "b'"]);
    }

    #[test]
    fn test_blank_stage_is_empty() {
        let cmd = Command::parse(" \t ");
        assert!(cmd.is_empty());
        assert_eq!(cmd.program(), None);
    }

    #[test]
    fn test_display_joins_args() {
        let cmd = Command::new(["ls", "-l"]);
        assert_eq!(cmd.to_string(), "ls -l");
    }
}
