use std::env;
use std::process;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod command;
mod config;
mod error;
mod launcher;
mod pipes;
mod prompt;
mod shell;
mod signal_handler;

use config::Config;
use shell::Shell;

fn print_help() {
    println!("cshell - minimal command interpreter");
    println!();
    println!("Usage: cshell [OPTIONS]");
    println!("  -c <line>        Run one line and exit with its status");
    println!("  -h, --help       Print this help");
    println!("  -v, --version    Print version");
    println!();
    println!("Type 'quit' to leave the interactive loop.");
}

fn print_version() {
    println!("cshell v {}", env!("CARGO_PKG_VERSION"));
}

fn init_logging() {
    // RUST_LOG=debug shows every launch and reap; logs go to stderr so they
    // never mix with pipeline output
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Help,
    Version,
    Command(String),
    Interactive,
}

fn parse_args(args: &[String]) -> Result<Mode, String> {
    // respond to help/version before anything else, wherever they appear
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Ok(Mode::Help);
    }

    if args.iter().any(|a| a == "-v" || a == "--version" || a == "-V") {
        return Ok(Mode::Version);
    }

    if let Some(pos) = args.iter().position(|a| a == "-c") {
        return args
            .get(pos + 1)
            .map(|line| Mode::Command(line.clone()))
            .ok_or_else(|| "-c requires a command argument".to_string());
    }

    Ok(Mode::Interactive)
}

/// Run one line without a prompt and return the shell's exit code.
fn run_command(line: &str) -> i32 {
    let mut shell = Shell::new(Config::batch());
    shell.execute_line(line);
    shell.last_status().shell_code()
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let mode = match parse_args(&args) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("cshell: {}", e);
            process::exit(2);
        }
    };

    match mode {
        Mode::Help => print_help(),
        Mode::Version => print_version(),
        Mode::Command(line) => {
            init_logging();
            process::exit(run_command(&line));
        }
        Mode::Interactive => {
            init_logging();
            let mut shell = Shell::new(Config::from_env());
            let status = shell.run();
            process::exit(status.shell_code());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::test_lock;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_modes() {
        assert_eq!(parse_args(&args(&[])), Ok(Mode::Interactive));
        assert_eq!(parse_args(&args(&["--help"])), Ok(Mode::Help));
        assert_eq!(parse_args(&args(&["-c", "ls", "-V"])), Ok(Mode::Version));
        assert_eq!(
            parse_args(&args(&["-c", "echo hi | wc -c"])),
            Ok(Mode::Command("echo hi | wc -c".to_string()))
        );
    }

    #[test]
    fn test_dash_c_needs_a_line() {
        assert!(parse_args(&args(&["-c"])).is_err());
    }

    #[test]
    fn test_run_command_exit_codes() {
        let _guard = test_lock();
        assert_eq!(run_command("true"), 0);
        assert_eq!(run_command("false"), 1);
        assert_eq!(run_command("false | true"), 0);
        assert_eq!(run_command("true | sh -c false"), 1);
        assert_eq!(run_command("cshell-no-such-program"), 127);
        assert_eq!(run_command("quit"), 0);
        assert_eq!(run_command("   "), 0);
    }
}
