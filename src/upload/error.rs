use thiserror::Error;

use crate::store::StoreError;
use crate::transport::TransportError;
use crate::wire::WireError;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pause requested mid-transfer")]
    Paused,

    #[error("response timed out")]
    ResponseTimeout,

    #[error("no parseable status line in response")]
    MalformedResponse,

    #[error("server rejected upload with status {0}")]
    RejectedStatus(u16),
}

pub type TransferResult<T> = std::result::Result<T, TransferError>;
