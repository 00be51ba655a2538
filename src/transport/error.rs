use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;
