use std::ffi::CString;
use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use tracing::{debug, error, warn};

use crate::command::Command;
use crate::error::LaunchError;
use crate::signal_handler;

/// Exit code of a child whose program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code of a child whose program was found but could not be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    Exited(i32),
    Signaled(Signal),
    /// The child was started but its status could not be collected.
    Abnormal,
    /// No process was started for this stage.
    NotRun,
}

impl TerminationStatus {
    pub fn success(&self) -> bool {
        matches!(self, TerminationStatus::Exited(0))
    }

    /// The value a shell reports for this status, `128 + signo` for signals.
    pub fn shell_code(&self) -> i32 {
        match self {
            TerminationStatus::Exited(code) => *code,
            TerminationStatus::Signaled(signal) => 128 + *signal as i32,
            TerminationStatus::Abnormal => 1,
            TerminationStatus::NotRun => 0,
        }
    }
}

impl fmt::Display for TerminationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationStatus::Exited(code) => write!(f, "exit {}", code),
            TerminationStatus::Signaled(signal) => write!(f, "killed by {}", signal),
            TerminationStatus::Abnormal => write!(f, "abnormal termination"),
            TerminationStatus::NotRun => write!(f, "not run"),
        }
    }
}

/// A running child. Waiting consumes the handle, so a pid is reaped once.
#[derive(Debug)]
#[must_use = "a launched process must be waited on"]
pub struct ProcessHandle {
    pid: Pid,
    program: String,
}

impl ProcessHandle {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Block until the child terminates.
    pub fn wait(self) -> TerminationStatus {
        loop {
            match syscall(|| waitpid(self.pid, None)) {
                Ok(WaitStatus::Exited(_, code)) => {
                    debug!(pid = self.pid.as_raw(), code, "reaped");
                    return TerminationStatus::Exited(code);
                }
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    debug!(pid = self.pid.as_raw(), %signal, "reaped");
                    return TerminationStatus::Signaled(signal);
                }
                // stopped / continued: not terminal
                Ok(_) => continue,
                Err(e) => {
                    error!(
                        pid = self.pid.as_raw(),
                        program = %self.program,
                        "waitpid failed: {}",
                        e
                    );
                    return TerminationStatus::Abnormal;
                }
            }
        }
    }
}

/// Retry a system call interrupted by a signal.
fn syscall<F, T>(f: F) -> nix::Result<T>
where
    F: Fn() -> nix::Result<T>,
{
    loop {
        match f() {
            Err(Errno::EINTR) => (),
            result => return result,
        }
    }
}

/// Everything the child needs, prepared before `fork` so the child only makes
/// async-signal-safe calls.
struct ExecPlan {
    program: CString,
    // owns the strings `argv` points into
    #[allow(dead_code)]
    args: Vec<CString>,
    argv: Vec<*const libc::c_char>,
    not_found: Vec<u8>,
    not_executable: Vec<u8>,
}

impl ExecPlan {
    fn new(command: &Command) -> Result<Self, LaunchError> {
        let args = command
            .args()
            .iter()
            .map(|arg| {
                CString::new(arg.as_str()).map_err(|_| LaunchError::InvalidArgument(arg.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let program = args.first().cloned().ok_or(LaunchError::EmptyCommand)?;

        let mut argv: Vec<*const libc::c_char> = args.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(std::ptr::null());

        let name = program.to_string_lossy();
        let not_found = format!("cshell: command not found: {}\n", name).into_bytes();
        let not_executable = format!("cshell: cannot execute {}\n", name).into_bytes();

        Ok(Self {
            program,
            args,
            argv,
            not_found,
            not_executable,
        })
    }
}

/// Start one child running `command`.
///
/// `stdin` and `stdout` are moved in: they become the child's fd 0 and fd 1,
/// and the parent's copies are closed before this returns, whether or not the
/// fork succeeded. The child inherits whatever is not given.
pub fn launch(
    command: &Command,
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
) -> Result<ProcessHandle, LaunchError> {
    let plan = ExecPlan::new(command)?;
    let program = command.program().unwrap_or_default().to_string();

    // SAFETY: the child only calls async-signal-safe functions before exec or _exit.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            debug!(pid = child.as_raw(), command = %command, "launched");
            Ok(ProcessHandle {
                pid: child,
                program,
            })
        }
        Ok(ForkResult::Child) => exec_child(&plan, stdin.as_ref(), stdout.as_ref()),
        Err(source) => {
            warn!(program = %program, "fork failed: {}", source);
            Err(LaunchError::CreationFailed { program, source })
        }
    }
}

fn exec_child(plan: &ExecPlan, stdin: Option<&OwnedFd>, stdout: Option<&OwnedFd>) -> ! {
    if let Some(fd) = stdin {
        if bind(fd.as_raw_fd(), libc::STDIN_FILENO).is_err() {
            child_exit(b"cshell: cannot bind standard input\n", 1);
        }
    }
    if let Some(fd) = stdout {
        if bind(fd.as_raw_fd(), libc::STDOUT_FILENO).is_err() {
            child_exit(b"cshell: cannot bind standard output\n", 1);
        }
    }

    signal_handler::restore_default_signals();

    // SAFETY: `argv` is NULL-terminated and points into `plan.args`.
    unsafe {
        libc::execvp(plan.program.as_ptr(), plan.argv.as_ptr());
    }

    match Errno::last() {
        Errno::ENOENT | Errno::ENOTDIR => child_exit(&plan.not_found, EXIT_NOT_FOUND),
        _ => child_exit(&plan.not_executable, EXIT_NOT_EXECUTABLE),
    }
}

/// Make `fd` the child's `target` descriptor and close the original.
fn bind(fd: RawFd, target: RawFd) -> nix::Result<()> {
    if fd == target {
        // dup2 onto itself would leave close-on-exec set
        Errno::result(unsafe { libc::fcntl(fd, libc::F_SETFD, 0) })?;
        return Ok(());
    }
    Errno::result(unsafe { libc::dup2(fd, target) })?;
    unsafe {
        libc::close(fd);
    }
    Ok(())
}

fn child_exit(message: &[u8], code: i32) -> ! {
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            message.as_ptr() as *const libc::c_void,
            message.len(),
        );
        libc::_exit(code)
    }
}

/// Serialises tests that fork or count descriptors.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::Mutex;
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
