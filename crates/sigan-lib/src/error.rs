use thiserror::Error;

/// Failures surfaced by the analysis core.
///
/// An empty peak set is not an error; callers get an empty [`crate::signal::Events`]
/// and an undetermined rate instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("signal too short for zero-phase filtering: need more than {required} samples, got {actual}")]
    InsufficientLength { required: usize, actual: usize },
    #[error("{operation} needs a {required} session, but the session is {current}")]
    NotReady {
        operation: &'static str,
        required: &'static str,
        current: &'static str,
    },
    #[error("record has {found} channel(s); ECG and PPG need at least 2")]
    MissingChannel { found: usize },
    #[error("sample range [{start}, {end}) is outside the signal (length {len})")]
    OutOfRange { start: usize, end: usize, len: usize },
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }
}
