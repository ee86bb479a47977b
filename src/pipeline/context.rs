//! Per-request state carried through the stage list.
//!
//! # Responsibilities
//! - Collect the body under the configured byte bound
//! - Resolve the client identity used for rate limiting
//! - Split the query string into ordered pairs for the sanitizers
//! - Rebuild an `axum` request from the sanitized state
//!
//! # Design Decisions
//! - A declared `Content-Length` over the bound is rejected without reading
//! - Query pairs stay ordered until pollution normalization collapses them
//! - Handlers read sanitized values from the `SanitizedInput` extension

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Request},
    http::{header, request::Parts, uri::PathAndQuery, HeaderMap, HeaderValue, Uri},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Serialize;
use serde_json::Value;
use url::form_urlencoded;

use crate::http::error::ApiError;
use crate::security::rate_limit::RateLimitStatus;

/// Identity used when the peer address is unknown.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// A normalized query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    /// Only produced for parameters allow-listed to keep repeats.
    Multiple(Vec<String>),
}

impl ParamValue {
    /// The scalar value, or the last of several.
    pub fn last(&self) -> &str {
        match self {
            ParamValue::Single(value) => value,
            ParamValue::Multiple(values) => values.last().map(String::as_str).unwrap_or(""),
        }
    }
}

/// Normalized query parameters, keyed deterministically.
pub type Params = BTreeMap<String, ParamValue>;

/// Sanitized input attached to the request for handlers.
#[derive(Debug, Clone, Default)]
pub struct SanitizedInput {
    pub client: String,
    pub body: Option<Value>,
    pub query: Params,
    /// Every original value of a parameter that was collapsed.
    pub polluted: BTreeMap<String, Vec<String>>,
}

/// State a request carries through the stage list.
#[derive(Debug)]
pub struct RequestContext {
    pub parts: Parts,
    pub client: String,
    pub raw_body: Bytes,
    pub body: Option<Value>,
    pub query: Vec<(String, String)>,
    pub polluted: BTreeMap<String, Vec<String>>,
    pub rate_limit: Option<RateLimitStatus>,
}

impl RequestContext {
    /// Build a context from parts and an already collected body.
    pub fn new(parts: Parts, raw_body: Bytes) -> Self {
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

        let query = parts
            .uri
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            parts,
            client,
            raw_body,
            body: None,
            query,
            polluted: BTreeMap::new(),
            rate_limit: None,
        }
    }

    /// Read the request body, failing once it exceeds `max_body_bytes`.
    pub async fn collect(request: Request, max_body_bytes: usize) -> Result<Self, ApiError> {
        let (parts, body) = request.into_parts();

        if declared_length(&parts.headers).is_some_and(|len| len > max_body_bytes) {
            return Err(ApiError::PayloadTooLarge {
                limit: max_body_bytes,
            });
        }

        let raw_body = match Limited::new(body, max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                return Err(ApiError::PayloadTooLarge {
                    limit: max_body_bytes,
                })
            }
            Err(e) => return Err(ApiError::BodyRead(e.to_string())),
        };

        Ok(Self::new(parts, raw_body))
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    /// Normalized view of the current query pairs.
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        for (key, value) in &self.query {
            match params.get_mut(key) {
                None => {
                    params.insert(key.clone(), ParamValue::Single(value.clone()));
                }
                Some(ParamValue::Single(first)) => {
                    let first = std::mem::take(first);
                    params.insert(key.clone(), ParamValue::Multiple(vec![first, value.clone()]));
                }
                Some(ParamValue::Multiple(values)) => values.push(value.clone()),
            }
        }
        params
    }

    /// Rebuild the request with the sanitized query and body.
    pub fn into_request(self) -> Request {
        let input = SanitizedInput {
            query: self.params(),
            client: self.client,
            body: self.body,
            polluted: self.polluted,
        };

        let mut parts = self.parts;
        if parts.uri.query().is_some() {
            parts.uri = with_query(&parts.uri, &self.query);
        }

        let body = match &input.body {
            Some(value) => match serde_json::to_vec(value) {
                Ok(bytes) => Bytes::from(bytes),
                Err(_) => self.raw_body,
            },
            None => self.raw_body,
        };

        parts.headers.remove(header::TRANSFER_ENCODING);
        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        parts.extensions.insert(input);

        Request::from_parts(parts, Body::from(body))
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn with_query(uri: &Uri, pairs: &[(String, String)]) -> Uri {
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();

    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };

    let mut uri_parts = uri.clone().into_parts();
    match path_and_query.parse::<PathAndQuery>() {
        Ok(pq) => uri_parts.path_and_query = Some(pq),
        Err(_) => return uri.clone(),
    }
    Uri::from_parts(uri_parts).unwrap_or_else(|_| uri.clone())
}
