//! Hardened web server for the Lume Launch site.
//!
//! Serves a static frontend and one contact-form API behind a fixed chain
//! of protections: security headers, origin restriction, a bounded JSON
//! body, XSS and operator-key sanitization, query deduplication and a
//! per-client rate limit on `/api/`.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::schema::ServerConfig;
pub use http::AppServer;
pub use lifecycle::Shutdown;
