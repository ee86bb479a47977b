//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layer stack, graceful shutdown)
//!     → pipeline (input hardening stages)
//!     → health.rs | contact.rs | static fallback
//!     → error.rs (terminal error responder)
//!     → Send to client
//! ```

pub mod contact;
pub mod error;
pub mod health;
pub mod server;

pub use contact::{
    ContactHandler, ContactRequest, ContactResponse, HandlerError, LogContactHandler,
    SharedContactHandler,
};
pub use error::{ApiError, GENERIC_ERROR};
pub use server::{AppServer, AppState, ServerError};
