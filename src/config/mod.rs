//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flags / PORT / CORS_ORIGIN overrides
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, ConfigOverrides};
pub use schema::{
    CorsConfig, LimitsConfig, ListenerConfig, ObservabilityConfig, PollutionConfig,
    RateLimitConfig, ServerConfig, StaticFilesConfig,
};
