//! Response configuration and the immutable response value

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::JsonpError;

pub type HeadersMap = BTreeMap<String, String>;

/// Partial response configuration.
///
/// Every field is optional so a per-fetch configuration can be layered over
/// a shared template with [`ResponseOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: HeadersMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ResponseOptions {
    /// Template used when the backend is not given one: `200 Ok`, no headers
    pub fn base() -> Self {
        Self {
            status: Some(200),
            status_text: Some("Ok".to_string()),
            ..Default::default()
        }
    }

    pub fn with_body(body: Option<Value>) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    /// Combine `self` with `other`; fields present in `other` win.
    ///
    /// Headers are merged key by key.
    pub fn merge(&self, other: &ResponseOptions) -> ResponseOptions {
        let mut headers = self.headers.clone();
        headers.extend(other.headers.iter().map(|(k, v)| (k.clone(), v.clone())));

        ResponseOptions {
            body: other.body.clone().or_else(|| self.body.clone()),
            status: other.status.or(self.status),
            status_text: other
                .status_text
                .clone()
                .or_else(|| self.status_text.clone()),
            headers,
            url: other.url.clone().or_else(|| self.url.clone()),
        }
    }
}

/// Final response of a successful fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub body: Option<Value>,
    pub status: u16,
    pub status_text: String,
    pub headers: HeadersMap,
    pub url: Option<String>,
}

impl Response {
    pub fn new(options: ResponseOptions) -> Self {
        Self {
            body: options.body,
            status: options.status.unwrap_or(200),
            status_text: options.status_text.unwrap_or_default(),
            headers: options.headers,
            url: options.url,
        }
    }

    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the delivered payload
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, JsonpError> {
        let body = self.body.clone().unwrap_or(Value::Null);
        Ok(serde_json::from_value(body)?)
    }

    /// Payload as text; strings are returned unquoted
    pub fn text(&self) -> String {
        match &self.body {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_override_wins() {
        let mut base = ResponseOptions::base();
        base.headers.insert("x-source".into(), "jsonp".into());
        base.body = Some(json!("template"));

        let mut over = ResponseOptions::with_body(Some(json!({"a": 1})));
        over.headers.insert("x-extra".into(), "1".into());

        let merged = base.merge(&over);
        assert_eq!(merged.body, Some(json!({"a": 1})));
        assert_eq!(merged.status, Some(200));
        assert_eq!(merged.status_text.as_deref(), Some("Ok"));
        assert_eq!(merged.headers.len(), 2);
    }

    #[test]
    fn test_merge_keeps_base_when_override_empty() {
        let base = ResponseOptions::base();
        let merged = base.merge(&ResponseOptions::default());
        assert_eq!(merged, base);
    }

    #[test]
    fn test_response_accessors() {
        let response = Response::new(
            ResponseOptions::base().merge(&ResponseOptions::with_body(Some(json!({"n": 3})))),
        );
        assert!(response.ok());

        #[derive(Deserialize)]
        struct Payload {
            n: u32,
        }
        let payload: Payload = response.json().unwrap();
        assert_eq!(payload.n, 3);
        assert_eq!(response.text(), r#"{"n":3}"#);
    }

    #[test]
    fn test_response_json_decode_error() {
        let response = Response::new(ResponseOptions::with_body(Some(json!("nope"))));
        let result: Result<Vec<u32>, _> = response.json();
        assert!(matches!(result, Err(JsonpError::Decode(_))));
        assert_eq!(response.text(), "nope");
    }
}
