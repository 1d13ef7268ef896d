//! Parsing of JSONP script bodies
//!
//! The native host does not run JavaScript. It understands the one shape a
//! JSONP endpoint produces, a single call of the callback with a JSON
//! argument:
//!
//! ```text
//! /**/ __jsonp__.__req0.finished({"a": 1});
//! ```

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("script is not a callback invocation")]
    MissingCall,

    #[error("invalid callee name: {0:?}")]
    InvalidCallee(String),

    #[error("invalid callback argument: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

/// A parsed `callee(payload)` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub callee: String,
    pub payload: Option<Value>,
}

pub fn parse(script: &str) -> Result<Invocation, EnvelopeError> {
    let mut body = script.trim();
    while let Some(rest) = body.strip_prefix("/**/") {
        body = rest.trim_start();
    }
    let body = body.trim_end();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();

    let open = body.find('(').ok_or(EnvelopeError::MissingCall)?;
    let args = body[open + 1..]
        .strip_suffix(')')
        .ok_or(EnvelopeError::MissingCall)?
        .trim();

    let callee = body[..open].trim();
    if !is_callee(callee) {
        return Err(EnvelopeError::InvalidCallee(callee.to_string()));
    }

    let payload = if args.is_empty() {
        None
    } else {
        Some(serde_json::from_str(args)?)
    };

    Ok(Invocation {
        callee: callee.to_string(),
        payload,
    })
}

/// Dotted path of JavaScript identifiers, e.g. `ns.__req1.finished`
pub fn is_callee(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_identifier)
}

fn is_identifier(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
