//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Origin allowed by default when none is configured.
pub const DEFAULT_CORS_ORIGIN: &str = "https://lumelaunch.com";

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Rate limiting for API routes.
    pub rate_limit: RateLimitConfig,

    /// Query parameter pollution handling.
    pub pollution: PollutionConfig,

    /// Static frontend serving.
    pub static_files: StaticFilesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ListenerConfig {
    /// Address string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// The single origin browsers may call the API from.
    pub allowed_origin: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: DEFAULT_CORS_ORIGIN.to_string(),
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Only paths starting with this prefix are limited.
    pub path_prefix: String,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Requests allowed per client within one window.
    pub max_requests: u32,

    /// Message returned to clients over the limit.
    pub message: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/api/".to_string(),
            window_secs: 60,
            max_requests: 20,
            message: "Too many requests, please try later.".to_string(),
        }
    }
}

/// Query parameter pollution handling.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PollutionConfig {
    /// Parameters allowed to keep every repeated value.
    pub allow_multiple: Vec<String>,
}

/// Static frontend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Directory served for requests no route matches.
    pub root: PathBuf,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("frontend"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = ServerConfig::default();
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.cors.allowed_origin, "https://lumelaunch.com");
        assert_eq!(config.limits.max_body_bytes, 10_240);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.rate_limit.max_requests, 20);
        assert_eq!(config.rate_limit.path_prefix, "/api/");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [listener]
            port = 8080

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.listener.host, "0.0.0.0");
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.cors.allowed_origin, DEFAULT_CORS_ORIGIN);
    }
}
