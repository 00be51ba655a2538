pub mod manager;
pub mod types;

pub use manager::RetentionManager;
pub use types::{RetentionPolicy, StorageInfo};
