//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, window > 0)
//! - Check the CORS origin is a bare scheme://host[:port] origin
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host `{0}` is not an IP address")]
    InvalidHost(String),

    #[error("cors.allowed_origin `{0}` is not a valid origin")]
    InvalidOrigin(String),

    #[error("limits.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,

    #[error("rate_limit.path_prefix `{0}` must start and end with `/`")]
    InvalidPathPrefix(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }

    if !is_valid_origin(&config.cors.allowed_origin) {
        errors.push(ValidationError::InvalidOrigin(
            config.cors.allowed_origin.clone(),
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let rate_limit = &config.rate_limit;
    if rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }
    if rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }
    if !rate_limit.path_prefix.starts_with('/') || !rate_limit.path_prefix.ends_with('/') {
        errors.push(ValidationError::InvalidPathPrefix(
            rate_limit.path_prefix.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin is `http(s)://host[:port]` with nothing after the authority.
fn is_valid_origin(origin: &str) -> bool {
    let Ok(url) = Url::parse(origin) else {
        return false;
    };

    matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some()
        && url.path() == "/"
        && !origin.ends_with('/')
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.host = "localhost:80".into();
        config.limits.max_body_bytes = 0;
        config.rate_limit.window_secs = 0;
        config.rate_limit.path_prefix = "api".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors.contains(&ValidationError::ZeroWindow));
    }

    #[test]
    fn test_origin_shapes() {
        assert!(is_valid_origin("https://lumelaunch.com"));
        assert!(is_valid_origin("http://localhost:5173"));
        assert!(!is_valid_origin("https://lumelaunch.com/"));
        assert!(!is_valid_origin("https://lumelaunch.com/app"));
        assert!(!is_valid_origin("ftp://lumelaunch.com"));
        assert!(!is_valid_origin("*"));
        assert!(!is_valid_origin("lumelaunch.com"));
    }
}
