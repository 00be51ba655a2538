use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("segment not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to delete {path}: {reason}")]
    DeleteFailed { path: PathBuf, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
