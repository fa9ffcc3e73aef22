use std::io::{self, BufRead, ErrorKind, Write};

use colored::Colorize;
use nix::sys::signal::Signal;
use tracing::debug;

use crate::config::{Config, EXIT_KEYWORD};
use crate::launcher::{TerminationStatus, EXIT_NOT_EXECUTABLE, EXIT_NOT_FOUND};
use crate::pipes::{run_pipeline, run_single, Pipeline};
use crate::prompt::Prompt;
use crate::signal_handler;

pub struct Shell {
    config: Config,
    prompt: Prompt,
    last_status: TerminationStatus,
    running: bool,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let prompt = Prompt::new(&config.prompt);
        Self {
            config,
            prompt,
            last_status: TerminationStatus::NotRun,
            running: true,
        }
    }

    /// Status of the last stage of the last line that ran something.
    pub fn last_status(&self) -> TerminationStatus {
        self.last_status
    }

    /// Read and run lines from standard input until `quit` or end of input.
    pub fn run(&mut self) -> TerminationStatus {
        if self.config.interactive {
            signal_handler::ignore_interactive_signals();
        }

        let stdin = io::stdin();
        self.run_with(stdin.lock())
    }

    pub fn run_with<R: BufRead>(&mut self, mut input: R) -> TerminationStatus {
        let mut line = String::new();

        while self.running {
            if self.config.interactive {
                print!("{}", self.prompt.get_string());
                let _ = io::stdout().flush();
            }

            line.clear();
            match input.read_line(&mut line) {
                Ok(0) => {
                    if self.config.interactive {
                        println!();
                    }
                    break;
                }
                Ok(_) => self.execute_line(&line),
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    eprintln!("{} {}", "cshell:".red(), e);
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    break;
                }
            }
        }

        self.last_status
    }

    /// Run one line of input. Blank lines do nothing.
    pub fn execute_line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return;
        }

        if trimmed == EXIT_KEYWORD {
            if self.config.interactive {
                println!("Exiting shell...");
            }
            self.running = false;
            return;
        }

        let Some(pipeline) = Pipeline::parse(trimmed) else {
            return;
        };

        let statuses = if pipeline.len() == 1 {
            match run_single(&pipeline.stages()[0]) {
                Ok(status) => vec![status],
                Err(e) => {
                    eprintln!("{} {}", "cshell:".red(), e);
                    self.last_status = TerminationStatus::Abnormal;
                    return;
                }
            }
        } else {
            match run_pipeline(&pipeline) {
                Ok(statuses) => statuses,
                Err(e) => {
                    eprintln!("{} pipeline error: {}", "cshell:".red(), e);
                    debug!(statuses = ?e.statuses, "partial pipeline reaped");
                    self.last_status = TerminationStatus::Abnormal;
                    return;
                }
            }
        };

        debug!(?statuses, "line finished");
        self.report(&pipeline, &statuses);
    }

    /// The pipeline's result is its last stage, as in other shells.
    fn report(&mut self, pipeline: &Pipeline, statuses: &[TerminationStatus]) {
        let Some(&last) = statuses.last() else {
            return;
        };
        self.last_status = last;

        if last.success() {
            return;
        }
        let program = pipeline
            .stages()
            .last()
            .and_then(|cmd| cmd.program())
            .unwrap_or_default();

        match last {
            // the child already explained 126 / 127
            TerminationStatus::Exited(EXIT_NOT_FOUND | EXIT_NOT_EXECUTABLE) => {}
            TerminationStatus::Exited(code) => {
                eprintln!("{}: exited with code {}", program, code);
            }
            TerminationStatus::Signaled(Signal::SIGINT | Signal::SIGPIPE) => {}
            TerminationStatus::Signaled(_) | TerminationStatus::Abnormal => {
                eprintln!("{}: {}", program, last);
            }
            TerminationStatus::NotRun => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::test_lock;
    use std::io::Cursor;

    fn run_lines(input: &str) -> (Shell, TerminationStatus) {
        let mut shell = Shell::new(Config::batch());
        let status = shell.run_with(Cursor::new(input.as_bytes().to_vec()));
        (shell, status)
    }

    #[test]
    fn test_quit_stops_reading() {
        let _guard = test_lock();
        let (shell, status) = run_lines("false\nquit\ntrue\n");
        assert_eq!(status, TerminationStatus::Exited(1));
        assert!(!shell.running);
    }

    #[test]
    fn test_quit_must_match_exactly() {
        let _guard = test_lock();
        let (shell, _) = run_lines("  quit \t\n");
        assert!(!shell.running);

        let (shell, status) = run_lines("quitx\n");
        assert!(shell.running);
        assert_eq!(status, TerminationStatus::Exited(EXIT_NOT_FOUND));
    }

    #[test]
    fn test_blank_lines_launch_nothing() {
        let _guard = test_lock();
        let (shell, status) = run_lines("   \n\t\n\n");
        assert_eq!(status, TerminationStatus::NotRun);
        assert!(shell.running);
    }

    #[test]
    fn test_unknown_program_does_not_stop_loop() {
        let _guard = test_lock();
        let (_, status) = run_lines("doesnotexist\ntrue\n");
        assert_eq!(status, TerminationStatus::Exited(0));

        let (_, status) = run_lines("doesnotexist\n");
        assert_eq!(status, TerminationStatus::Exited(EXIT_NOT_FOUND));
    }

    #[test]
    fn test_pipeline_result_is_last_stage() {
        let _guard = test_lock();
        let (_, status) = run_lines("false | true\n");
        assert_eq!(status, TerminationStatus::Exited(0));

        let (_, status) = run_lines("true | false\n");
        assert_eq!(status, TerminationStatus::Exited(1));
    }

    #[test]
    fn test_launch_error_is_not_fatal() {
        let _guard = test_lock();
        let mut shell = Shell::new(Config::batch());
        shell.execute_line("echo a\0b | cat");
        assert_eq!(shell.last_status(), TerminationStatus::Abnormal);

        shell.execute_line("true");
        assert_eq!(shell.last_status(), TerminationStatus::Exited(0));
    }
}
