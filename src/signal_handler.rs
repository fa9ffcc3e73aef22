use nix::sys::signal::{signal, SigHandler, Signal};
use tracing::warn;

/// Signals whose disposition the shell changes and a child must get back.
const RESET_IN_CHILD: [Signal; 3] = [Signal::SIGINT, Signal::SIGQUIT, Signal::SIGPIPE];

/// Keep Ctrl+C and Ctrl+\ from killing the shell itself; the foreground
/// children still receive them from the terminal.
pub fn ignore_interactive_signals() {
    for sig in [Signal::SIGINT, Signal::SIGQUIT] {
        // SAFETY: SIG_IGN installs no handler code.
        if let Err(e) = unsafe { signal(sig, SigHandler::SigIgn) } {
            warn!("failed to ignore {}: {}", sig, e);
        }
    }
}

/// Called in a freshly forked child. Ignored dispositions survive `exec`, and
/// the Rust runtime ignores SIGPIPE, so put the defaults back for the program.
pub fn restore_default_signals() {
    for sig in RESET_IN_CHILD {
        // SAFETY: sigaction is async-signal-safe; errors cannot be reported here.
        unsafe {
            let _ = signal(sig, SigHandler::SigDfl);
        }
    }
}
