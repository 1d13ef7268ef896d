use thiserror::Error;

use crate::host::ScriptError;
use crate::request::RequestMethod;

/// Errors surfaced by JSONP connections
#[derive(Debug, Error)]
pub enum JsonpError {
    #[error("JSONP requests must use GET request method, got {0}")]
    InvalidMethod(RequestMethod),

    #[error("JSONP injected script did not invoke callback")]
    CallbackNotInvoked,

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("connection response already has a subscriber")]
    AlreadySubscribed,

    #[error("connection was dropped before a result was produced")]
    Disconnected,

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JsonpError>;
