pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod host;
pub mod locator;
pub mod observability;
pub mod request;
pub mod response;
pub mod server;

pub use backend::JsonpBackend;
pub use connection::{JsonpConnection, ResponseSubscription};
pub use error::JsonpError;
pub use request::{ReadyState, Request, RequestMethod};
pub use response::{Response, ResponseOptions};
