use super::models::Config;
use crate::host::envelope::is_callee;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Callback namespace '{namespace}' is not a dotted JavaScript identifier path")]
    InvalidCallbackNamespace { namespace: String },

    #[error("Timeout must be positive: {field} = {value}")]
    InvalidTimeout { field: String, value: u64 },

    #[error("max_script_bytes must be positive")]
    InvalidMaxScriptBytes,

    #[error("Response status {status} is outside 100..=599")]
    InvalidResponseStatus { status: u16 },

    #[error("User agent must not be empty")]
    EmptyUserAgent,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_host(config)?;
    validate_response(config)?;
    validate_fetch(config)?;
    Ok(())
}

fn validate_host(config: &Config) -> Result<(), ValidationError> {
    let host = &config.host;

    if !is_callee(&host.callback_namespace) {
        return Err(ValidationError::InvalidCallbackNamespace {
            namespace: host.callback_namespace.clone(),
        });
    }

    for (field, value) in [
        ("host.connect_timeout_ms", host.connect_timeout_ms),
        ("host.request_timeout_ms", host.request_timeout_ms),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout {
                field: field.to_string(),
                value,
            });
        }
    }

    if host.max_script_bytes == 0 {
        return Err(ValidationError::InvalidMaxScriptBytes);
    }

    if host.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    Ok(())
}

fn validate_response(config: &Config) -> Result<(), ValidationError> {
    let status = config.response.status;
    if !(100..=599).contains(&status) {
        return Err(ValidationError::InvalidResponseStatus { status });
    }
    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    if config.fetch.timeout_ms == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: "fetch.timeout_ms".to_string(),
            value: 0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_namespace() {
        let mut config = Config::default();
        for namespace in ["", "my-app", "a..b", "1abc", "ns.__req0.finished()"] {
            config.host.callback_namespace = namespace.to_string();
            assert!(matches!(
                validate(&config),
                Err(ValidationError::InvalidCallbackNamespace { .. })
            ));
        }

        config.host.callback_namespace = "window.$app.jsonp".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_timeouts() {
        let mut config = Config::default();
        config.host.request_timeout_ms = 0;
        match validate(&config) {
            Err(ValidationError::InvalidTimeout { field, .. }) => {
                assert_eq!(field, "host.request_timeout_ms")
            }
            other => panic!("unexpected: {other:?}"),
        }

        let mut config = Config::default();
        config.fetch.timeout_ms = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn test_zero_script_limit() {
        let mut config = Config::default();
        config.host.max_script_bytes = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxScriptBytes)
        ));
    }

    #[test]
    fn test_response_status_range() {
        let mut config = Config::default();
        config.response.status = 99;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidResponseStatus { status: 99 })
        ));
        config.response.status = 600;
        assert!(validate(&config).is_err());
        config.response.status = 599;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_user_agent() {
        let mut config = Config::default();
        config.host.user_agent = "  ".to_string();
        assert!(matches!(validate(&config), Err(ValidationError::EmptyUserAgent)));
    }
}
