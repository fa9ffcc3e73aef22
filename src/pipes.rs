use std::os::fd::OwnedFd;

use tracing::{debug, warn};

use crate::command::Command;
use crate::error::{LaunchError, PipelineError};
use crate::launcher::{launch, ProcessHandle, TerminationStatus};

/// A non-empty sequence of stages, stage 0 first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Command>,
}

impl Pipeline {
    pub fn new(stages: Vec<Command>) -> Option<Self> {
        if stages.is_empty() {
            None
        } else {
            Some(Self { stages })
        }
    }

    /// Parse user input into pipeline stages
    /// e.g., "ls -l | grep cshell | wc -l" -> [["ls", "-l"], ["grep", "cshell"], ["wc", "-l"]]
    ///
    /// Returns `None` for a blank line. A blank stage between pipes is kept as
    /// an empty command.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        Self::new(input.split('|').map(Command::parse).collect())
    }

    pub fn stages(&self) -> &[Command] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Number of pipes needed to connect the stages.
    pub fn num_streams(&self) -> usize {
        self.stages.len() - 1
    }
}

/// One pipe between adjacent stages. Each side is taken by exactly one
/// consumer; a side nobody took is closed when the stream is dropped.
#[derive(Debug)]
struct Stream {
    read: Option<OwnedFd>,
    write: Option<OwnedFd>,
}

impl Stream {
    fn open() -> nix::Result<Self> {
        let (read, write) = cloexec_pipe()?;
        Ok(Self {
            read: Some(read),
            write: Some(write),
        })
    }
}

/// Both ends are close-on-exec, so copies inherited by unrelated children
/// vanish at exec. Children get theirs through dup2, which clears the flag.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn cloexec_pipe() -> nix::Result<(OwnedFd, OwnedFd)> {
    use nix::errno::Errno;
    use std::os::fd::AsRawFd;

    let (read, write) = nix::unistd::pipe()?;
    for fd in [&read, &write] {
        Errno::result(unsafe {
            libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC)
        })?;
    }
    Ok((read, write))
}

/// Run one command with the shell's own stdin and stdout.
pub fn run_single(command: &Command) -> Result<TerminationStatus, LaunchError> {
    if command.is_empty() {
        return Ok(TerminationStatus::NotRun);
    }

    let handle = launch(command, None, None)?;
    Ok(handle.wait())
}

/// Execute a pipeline of commands
/// Connects stdout of each command to stdin of the next
///
/// Returns one status per stage, in stage order. If a pipe or process cannot
/// be created, no further stages are started, the ones already running are
/// still reaped, and the error names the failing stage.
pub fn run_pipeline(pipeline: &Pipeline) -> Result<Vec<TerminationStatus>, PipelineError> {
    let stages = pipeline.stages();
    let n = stages.len();

    if n == 1 {
        return run_single(&stages[0])
            .map(|status| vec![status])
            .map_err(|source| PipelineError {
                stage: 0,
                source,
                statuses: vec![TerminationStatus::NotRun],
            });
    }

    let mut streams = Vec::with_capacity(pipeline.num_streams());
    for i in 0..pipeline.num_streams() {
        match Stream::open() {
            Ok(stream) => streams.push(stream),
            Err(e) => {
                warn!(stage = i, "pipe creation failed: {}", e);
                return Err(PipelineError {
                    stage: i,
                    source: LaunchError::StreamCreationFailed(e),
                    statuses: vec![TerminationStatus::NotRun; n],
                });
            }
        }
    }

    let mut handles: Vec<Option<ProcessHandle>> = Vec::with_capacity(n);
    let mut failure = None;

    for (i, command) in stages.iter().enumerate() {
        let stdin = if i > 0 { streams[i - 1].read.take() } else { None };
        let stdout = streams.get_mut(i).and_then(|stream| stream.write.take());

        if command.is_empty() {
            // the taken sides drop here, so the neighbours see EOF / EPIPE
            debug!(stage = i, "empty stage skipped");
            handles.push(None);
            continue;
        }

        // launch closes our copies of both sides before returning
        match launch(command, stdin, stdout) {
            Ok(handle) => {
                debug!(
                    stage = i,
                    pid = handle.pid().as_raw(),
                    program = handle.program(),
                    "stage started"
                );
                handles.push(Some(handle));
            }
            Err(e) => {
                failure = Some((i, e));
                break;
            }
        }
    }

    // after an abort, whatever was not handed out is still open here
    drop(streams);

    let mut statuses: Vec<TerminationStatus> = handles
        .into_iter()
        .map(|handle| handle.map_or(TerminationStatus::NotRun, ProcessHandle::wait))
        .collect();
    statuses.resize(n, TerminationStatus::NotRun);

    match failure {
        None => Ok(statuses),
        Some((stage, source)) => Err(PipelineError {
            stage,
            source,
            statuses,
        }),
    }
}
