//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Enforce mutual exclusion of unix socket and host/port
//! - Validate value ranges (xff_depth >= 1, timeout > 0)
//! - Check the override origin parses as an absolute URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::{GatewayConfig, ListenerConfig};

/// A single semantic configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unix_socket is mutually exclusive with host/port")]
    UnixSocketConflict,

    #[error("xff_depth must be at least 1")]
    XffDepthZero,

    #[error("timeout_secs must be greater than zero")]
    TimeoutZero,

    #[error("override_origin {0:?} is not an absolute URL with a host")]
    BadOverrideOrigin(String),

    #[error("{field} {value:?} is not a valid header name")]
    BadHeaderName { field: &'static str, value: String },
}

/// Validate a loaded configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let defaults = ListenerConfig::default();
    if config.listener.unix_socket.is_some()
        && (config.listener.host != defaults.host || config.listener.port != defaults.port)
    {
        errors.push(ValidationError::UnixSocketConflict);
    }

    if config.listener.timeout_secs == 0 {
        errors.push(ValidationError::TimeoutZero);
    }

    if config.client_addr.xff_depth == 0 {
        errors.push(ValidationError::XffDepthZero);
    }

    if let Some(origin) = &config.origin.override_origin {
        match Url::parse(origin) {
            Ok(url) if url.host_str().is_some() => {}
            _ => errors.push(ValidationError::BadOverrideOrigin(origin.clone())),
        }
    }

    let header_fields = [
        ("origin.host_header", config.origin.host_header.as_deref()),
        (
            "origin.protocol_header",
            config.origin.protocol_header.as_deref(),
        ),
        ("client_addr.ip_header", config.client_addr.ip_header.as_deref()),
    ];
    for (field, value) in header_fields {
        if let Some(name) = value {
            if name.parse::<HeaderName>().is_err() {
                errors.push(ValidationError::BadHeaderName {
                    field,
                    value: name.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::GatewayConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_unix_socket_conflicts_with_host_port() {
        let mut config = GatewayConfig::default();
        config.listener.unix_socket = Some("/tmp/gateway.sock".into());
        assert!(validate_config(&config).is_ok());

        config.listener.port = 8080;
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::UnixSocketConflict));
    }

    #[test]
    fn test_bad_override_origin() {
        let mut config = GatewayConfig::default();
        config.origin.override_origin = Some("not a url".to_string());
        assert!(validate_config(&config).is_err());

        config.origin.override_origin = Some("https://example.com:8443".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.client_addr.xff_depth = 0;
        config.client_addr.ip_header = Some("bad header\n".to_string());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
