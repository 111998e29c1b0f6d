use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("job {0} was already enqueued")]
    DoubleEnqueue(Uuid),

    #[error("{stage} failed on {}: {detail}", artifact.display())]
    ToolFailed {
        stage: String,
        artifact: PathBuf,
        detail: String,
    },

    #[error("{stage}: declared output {} is missing or empty", artifact.display())]
    MissingOutput { stage: String, artifact: PathBuf },

    #[error("{stage} barrier aborted: {detail}")]
    JoinAborted { stage: String, detail: String },

    #[error("unsupported placement backend: {0}")]
    UnsupportedBackend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PlacementError>;
