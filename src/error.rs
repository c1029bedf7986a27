use thiserror::Error;

use crate::model::{UploadId, UploadStatus};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by an upload record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("upload {0} not found")]
    UploadNotFound(UploadId),

    #[error("upload {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: UploadId,
        from: UploadStatus,
        to: UploadStatus,
    },

    #[error("upload {id} expected {kind} {expected}, got {got}")]
    OutOfOrder {
        id: UploadId,
        kind: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("upload {0} already holds records of the other layout")]
    LayoutConflict(UploadId),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Backend(String),
}

/// Rejections raised before a submitted file enters the pipeline.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("only CSV files are allowed (got '{filename}')")]
    UnsupportedType { filename: String },

    #[error("file is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures during an ingestion run; each one leaves the upload in `error`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file is empty")]
    EmptyFile,

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to decode row {row}: {message}")]
    Decode { row: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// Whether the failure was caused by the submitted content rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::EmptyFile | IngestError::Csv(_) | IngestError::Decode { .. }
        )
    }
}
