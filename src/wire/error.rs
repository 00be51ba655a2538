use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WireResult<T> = std::result::Result<T, WireError>;
