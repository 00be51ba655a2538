pub mod connector;
pub mod error;
pub mod link;

pub use connector::{ClientStream, Connector, TcpConnector};
pub use error::{TransportError, TransportResult};
pub use link::{AlwaysOnline, LinkMonitor, SharedLink};
