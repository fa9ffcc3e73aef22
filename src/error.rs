use thiserror::Error;

use crate::launcher::TerminationStatus;

/// Reasons a stage could not be started.
///
/// Failures that happen inside the child after `fork` (an unknown program,
/// a permission problem) are not represented here: the child reports them
/// itself and they surface as a non-zero [`TerminationStatus`].
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("empty command")]
    EmptyCommand,

    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),

    #[error("failed to create process for `{program}`: {source}")]
    CreationFailed {
        program: String,
        #[source]
        source: nix::Error,
    },

    #[error("failed to create pipe: {0}")]
    StreamCreationFailed(#[source] nix::Error),
}

/// A pipeline that was abandoned part way through.
///
/// Every stage that did start has already been reaped; `statuses` holds their
/// results at their stage index and `NotRun` everywhere else.
#[derive(Debug, Error)]
#[error("stage {stage}: {source}")]
pub struct PipelineError {
    pub stage: usize,
    #[source]
    pub source: LaunchError,
    pub statuses: Vec<TerminationStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_names_stage() {
        let err = PipelineError {
            stage: 2,
            source: LaunchError::EmptyCommand,
            statuses: vec![TerminationStatus::NotRun; 3],
        };
        assert_eq!(err.to_string(), "stage 2: empty command");
    }

    #[test]
    fn test_creation_failed_mentions_program() {
        let err = LaunchError::CreationFailed {
            program: "ls".to_string(),
            source: nix::Error::EAGAIN,
        };
        assert!(err.to_string().contains("`ls`"));
    }
}
