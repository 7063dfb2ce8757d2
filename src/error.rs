use std::path::PathBuf;

use thiserror::Error;

/// The six error kinds named by the driver's contract, each mapped to a
/// distinct process exit code (see `exit_code`).
#[derive(Debug, Error)]
pub enum IndexToolsError {
    #[error("usage error: {0}")]
    UsageError(String),

    #[error("malformed index at offset {offset}: {message}")]
    MalformedIndex { offset: u64, message: String },

    #[error("inconsistent inputs: {0}")]
    InconsistentInputs(String),

    #[error("infeasible partitioning: achievable: {achievable}")]
    InfeasiblePartitioning { achievable: usize },

    #[error("I/O error reading/writing {}: {source}", path.display())]
    IOError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

impl IndexToolsError {
    /// Exit code per the CLI surface contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            IndexToolsError::UsageError(_) => 1,
            IndexToolsError::MalformedIndex { .. } => 2,
            IndexToolsError::InconsistentInputs(_) => 2,
            IndexToolsError::InfeasiblePartitioning { .. } => 3,
            IndexToolsError::IOError { .. } => 4,
            IndexToolsError::Cancelled => 4,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexToolsError::IOError {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        IndexToolsError::MalformedIndex {
            offset,
            message: message.into(),
        }
    }
}
