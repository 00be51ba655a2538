pub mod endpoint;
pub mod error;
pub mod multipart;
pub mod request;
pub mod response;

pub use endpoint::{Endpoint, Scheme};
pub use error::{WireError, WireResult};
pub use multipart::MultipartEncoding;
pub use request::request_head;
pub use response::ResponseParser;
