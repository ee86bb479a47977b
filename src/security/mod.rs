//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (hardened response headers, outermost)
//!     → origin.rs (reject foreign origins, CORS preflight)
//!     → xss.rs (escape markup in body and query values)
//!     → injection.rs (strip `$`/`.` keys)
//!     → pollution.rs (collapse repeated query parameters)
//!     → rate_limit.rs (per-client window on /api/)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input
//! - Sanitizers are idempotent

pub mod headers;
pub mod injection;
pub mod origin;
pub mod pollution;
pub mod rate_limit;
pub mod xss;
