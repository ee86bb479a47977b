//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use futures_util::future::BoxFuture;
use serde_json::{json, Value};
use tokio::time::Instant;

use lume_server::config::ServerConfig;
use lume_server::http::{AppServer, ContactHandler, ContactRequest, ContactResponse, HandlerError};
use lume_server::security::rate_limit::{MemoryStore, RateLimitStore, WindowHit};

/// What the recording collaborator should do with each request.
#[derive(Clone, Copy)]
pub enum Behavior {
    Accept,
    Fail(Option<StatusCode>),
    Panic,
}

/// Contact collaborator that remembers every request it receives.
pub struct RecordingContact {
    behavior: Behavior,
    received: Mutex<Vec<ContactRequest>>,
}

impl RecordingContact {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<ContactRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }
}

impl ContactHandler for RecordingContact {
    fn handle(&self, request: ContactRequest) -> BoxFuture<'static, Result<ContactResponse, HandlerError>> {
        self.received.lock().unwrap().push(request);
        let behavior = self.behavior;

        Box::pin(async move {
            match behavior {
                Behavior::Accept => Ok(ContactResponse::ok(json!({ "received": true }))),
                Behavior::Fail(Some(status)) => Err(HandlerError::with_status(status, "rejected by test")),
                Behavior::Fail(None) => Err(HandlerError::new("mail relay unreachable")),
                Behavior::Panic => panic!("contact handler exploded"),
            }
        })
    }
}

/// Rate-limit store that remembers which client keys it was asked about.
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    keys: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl RateLimitStore for RecordingStore {
    fn hit(&self, key: &str, window: Duration, now: Instant) -> WindowHit {
        self.keys.lock().unwrap().push(key.to_string());
        self.inner.hit(key, window, now)
    }

    fn prune(&self, window: Duration, now: Instant) -> usize {
        self.inner.prune(window, now)
    }
}

/// Config pointing the static root at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.host = "127.0.0.1".into();
    config.listener.port = 0;
    config.static_files.root = root.to_path_buf();
    config
}

/// Build the full router around a recording collaborator.
pub fn app(config: ServerConfig, behavior: Behavior) -> (Router, Arc<RecordingContact>) {
    let contact = RecordingContact::new(behavior);
    let server = AppServer::new(config, contact.clone()).unwrap();
    (server.router(), contact)
}

/// A JSON POST to `uri`.
pub fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Attach a peer address the way `into_make_service_with_connect_info` does.
pub fn from_client(mut request: Request<Body>, ip: &str) -> Request<Body> {
    let addr: SocketAddr = format!("{ip}:40000").parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
