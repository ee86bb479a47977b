//! Request pipeline: the ordered input-hardening stages.
//!
//! # Data Flow
//! ```text
//! security headers → metrics → origin guard → CORS  (tower layers, server.rs)
//!     → run_pipeline
//!         → RequestContext::collect (10 KB bound)
//!         → json_body → xss → injection → pollution → rate_limit
//!     → router (/health, /api/contact, static fallback)
//!     → ApiError::into_response on any failure
//! ```
//!
//! # Design Decisions
//! - Stages are plain values in a `Vec`, run in insertion order
//! - Each stage returns a `Flow`; the first non-`Continue` ends the chain
//! - Stages are synchronous; all I/O happens in `collect` before them

pub mod body;
pub mod context;

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::ServerConfig;
use crate::http::error::ApiError;
use crate::security::injection::InjectionStage;
use crate::security::pollution::PollutionStage;
use crate::security::rate_limit::{RateLimitStage, RateLimiter};
use crate::security::xss::XssStage;

pub use body::JsonBodyStage;
pub use context::{ParamValue, Params, RequestContext, SanitizedInput, UNKNOWN_CLIENT};

/// Outcome of one stage.
#[derive(Debug)]
pub enum Flow {
    /// Hand the (possibly modified) context to the next stage.
    Continue(RequestContext),
    /// Stop and send this response.
    Respond(Response),
    /// Stop and send this error through the terminal responder.
    Fail(ApiError),
}

/// A single unit of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, ctx: RequestContext) -> Flow;
}

/// Ordered list of stages sharing one body bound.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    max_body_bytes: usize,
}

impl Pipeline {
    /// An empty pipeline; add stages with [`Pipeline::with_stage`].
    pub fn new(max_body_bytes: usize) -> Self {
        Self {
            stages: Vec::new(),
            max_body_bytes,
        }
    }

    /// The standard stage order for the server.
    pub fn from_config(config: &ServerConfig, limiter: Arc<RateLimiter>) -> Self {
        Self::new(config.limits.max_body_bytes)
            .with_stage(JsonBodyStage)
            .with_stage(XssStage)
            .with_stage(InjectionStage)
            .with_stage(PollutionStage::new(config.pollution.allow_multiple.iter().cloned()))
            .with_stage(RateLimitStage::new(limiter))
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in order, stopping at the first short-circuit.
    pub fn run(&self, mut ctx: RequestContext) -> Flow {
        for stage in &self.stages {
            match stage.apply(ctx) {
                Flow::Continue(next) => ctx = next,
                stop => {
                    tracing::debug!(stage = stage.name(), "Pipeline short-circuited");
                    return stop;
                }
            }
        }
        Flow::Continue(ctx)
    }
}

/// Axum middleware running the pipeline in front of the router.
pub async fn run_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response {
    match RequestContext::collect(request, pipeline.max_body_bytes()).await {
        Err(e) => e.into_response(),
        Ok(ctx) => match pipeline.run(ctx) {
            Flow::Continue(ctx) => {
                let rate_limit = ctx.rate_limit.clone();
                let mut response = next.run(ctx.into_request()).await;
                if let Some(status) = rate_limit {
                    status.apply_headers(response.headers_mut());
                }
                response
            }
            Flow::Respond(response) => response,
            Flow::Fail(e) => e.into_response(),
        },
    }
}
