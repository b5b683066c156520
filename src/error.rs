use thiserror::Error;

/// Everything the purge workflow distinguishes about a failed call.
///
/// `NotFound` is the only kind that is recovered from silently (an archive
/// that is already gone counts as deleted). `TransientFailure` is what earns
/// an archive deletion its single retry. `Fatal` aborts the run.
#[derive(Debug, Error)]
pub enum PurgeError {
    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{operation} failed, but may succeed later: {message}")]
    TransientFailure { operation: &'static str, message: String },

    #[error("{operation} failed: {message}")]
    Fatal { operation: &'static str, message: String },
}

impl PurgeError {
    pub fn transient(
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::TransientFailure {
            operation,
            message: message.into(),
        }
    }

    pub fn fatal(
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Fatal {
            operation,
            message: message.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFailure { .. })
    }
}

pub type PurgeResult<T> = Result<T, PurgeError>;
