//! Boundary to the process that actually runs a trial.

use hs_types::{internal_error, ExecutionParameterSet, HsError, ProcessResult};

/// Why a trial produced no result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    /// The environment could not take the job now (e.g. capacity limits).
    #[error("dispatch rejected: {reason}")]
    Rejected { reason: String },
    /// The configuration itself cannot be run.
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },
    /// The run started but failed.
    #[error("execution failed: {message}")]
    Failed { message: String },
}

/// Runs one configuration to completion.
pub trait ProcessExecutor {
    fn execute(&mut self, params: &ExecutionParameterSet) -> Result<ProcessResult, ExecutionError>;
}

impl<F> ProcessExecutor for F
where
    F: FnMut(&ExecutionParameterSet) -> Result<ProcessResult, ExecutionError>,
{
    fn execute(&mut self, params: &ExecutionParameterSet) -> Result<ProcessResult, ExecutionError> {
        self(params)
    }
}

impl From<ExecutionError> for HsError {
    fn from(err: ExecutionError) -> Self {
        match err {
            ExecutionError::Rejected { reason } => HsError::DispatchRejected { reason },
            ExecutionError::InvalidParameters { reason } => HsError::InvalidParameter { parameters: reason },
            ExecutionError::Failed { message } => internal_error!("execution failed: {message}"),
        }
    }
}
