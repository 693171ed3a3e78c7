use thiserror::Error;

use meridian_metrics::MetricsError;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("line {line}: {message}")]
    Script { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("journal encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error("core {0} is not available on this machine")]
    UnknownCore(usize),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    #[error("either --input or --orders is required")]
    NoWorkload,
}

impl ReplayError {
    pub(crate) fn script(line: usize, message: impl Into<String>) -> Self {
        ReplayError::Script { line, message: message.into() }
    }
}
