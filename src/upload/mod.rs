pub mod error;
pub mod pipeline;
pub mod queue;
pub mod schedule;
pub mod session;
pub mod types;

pub use error::{TransferError, TransferResult};
pub use pipeline::UploadPipeline;
pub use queue::UploadQueue;
pub use schedule::CaptureTiming;
pub use types::{UploadConfig, UploadOutcome, UploadStatus};
