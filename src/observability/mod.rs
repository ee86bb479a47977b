//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline stages and handlers produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line via the trace span
//! - Metrics are cheap no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
