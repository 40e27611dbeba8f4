use thiserror::Error as TError;

#[derive(TError, Debug)]
pub enum ChunkupError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("chunk transport error (retryable: {retryable}): {reason}")]
    Transport { reason: String, retryable: bool },

    #[error("chunk {index} failed: {reason}")]
    Upload { index: usize, reason: String },

    #[error("upload is incomplete: {missing} chunk(s) not acknowledged")]
    IncompleteUpload { missing: usize },

    #[error("upload cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Send(#[from] futures_channel::mpsc::SendError),

    #[error(transparent)]
    Canceled(#[from] futures_channel::oneshot::Canceled),

    #[error("{0}")]
    Other(String),
}

impl ChunkupError {
    pub(crate) fn invalid(detail: impl Into<String>) -> Self {
        Self::InvalidArgument(detail.into())
    }
}

impl From<String> for ChunkupError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for ChunkupError {
    fn from(s: &str) -> Self {
        Self::Other(s.into())
    }
}

pub type ChunkupResult<T> = Result<T, ChunkupError>;
