//! Core data types shared by every gateway contract.
//!
//! [`Request`] and [`Response`] are plain owned values so they can move
//! across task boundaries freely.  [`PipelineContext`] is the per-request unit
//! of work threaded through the pipeline; it is owned by exactly one pipeline
//! execution and never shared between requests.

use crate::error::GatewayError;
use crate::route::Route;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP primitives
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP method, covering the standard verbs used in REST and proxy scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Case-insensitive parse from a string slice.
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            "TRACE" => Some(HttpMethod::Trace),
            _ => None,
        }
    }

    /// Methods whose repetition has the same effect as a single call.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }

    /// Return the standard uppercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_ci(s).ok_or_else(|| {
            GatewayError::validation(
                crate::error::codes::INVALID_ARGUMENT,
                "request",
                format!("unsupported HTTP method '{s}'"),
            )
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// An inbound request flowing through the gateway.
///
/// Treated as immutable once built: transform stages replace the request in
/// the context rather than editing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique identifier for correlating this request across logs and responses.
    /// Transports that do not supply one leave it empty and let the gateway
    /// assign one.
    #[serde(default)]
    pub request_id: String,
    /// Request path, e.g. `/api/user`.
    pub path: String,
    pub method: HttpMethod,
    /// HTTP headers (header names are lowercased).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Query parameters; repeated keys keep their order.
    #[serde(default)]
    pub query_params: HashMap<String, Vec<String>>,
    /// Raw body text.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub client_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Free-form scratch data shared between stages.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Request {
    /// Construct a minimal request with the given id, path, and method.
    pub fn new(request_id: impl Into<String>, path: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            request_id: request_id.into(),
            path: path.into(),
            method,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: String::new(),
            content_type: None,
            client_ip: None,
            user_agent: None,
            timestamp: Utc::now(),
            attributes: HashMap::new(),
        }
    }

    /// Fresh random request id for transports that do not supply one.
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Builder helper: append a query parameter value.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params
            .entry(key.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Builder helper: set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response
// ─────────────────────────────────────────────────────────────────────────────

/// An outbound response produced by an adapter, a short-circuiting stage, or
/// the error model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub request_id: String,
    /// HTTP status code (100–599).
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// When the response was produced; filled by the engine if no stage set it.
    #[serde(default)]
    pub response_time: Option<DateTime<Utc>>,
    /// Wall-clock time spent in the pipeline; set once, by the engine.
    #[serde(default)]
    pub processing_time: Option<Duration>,
    /// Set on gateway-produced failure responses.
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl Response {
    /// Construct a minimal response.
    pub fn new(request_id: impl Into<String>, status_code: u16) -> Self {
        Self {
            request_id: request_id.into(),
            status_code,
            headers: HashMap::new(),
            body: String::new(),
            content_type: None,
            response_time: None,
            processing_time: None,
            error_message: None,
            attributes: HashMap::new(),
        }
    }

    /// `200 OK` with a JSON body.
    pub fn ok_json(request_id: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::new(request_id, 200).with_json_body(value)
    }

    /// Builder helper: attach a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_lowercase(), value.into());
        self
    }

    /// Builder helper: set the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Builder helper: serialize `value` as the body and mark it JSON.
    pub fn with_json_body(mut self, value: &serde_json::Value) -> Self {
        self.body = value.to_string();
        self.content_type = Some("application/json".to_string());
        self
    }

    /// `true` for failure responses produced by the gateway itself.
    ///
    /// A backend's own 4xx/5xx relayed verbatim is not a gateway failure.
    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline context
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable context that flows through the pipeline for a single request.
///
/// Stages read from and write to this context, enabling inner stages to use
/// decisions made by outer ones (e.g. the route attached by the routing stage
/// is read by the dispatch stage).
#[derive(Debug)]
pub struct PipelineContext {
    /// The current request.  Replaced, never edited, by transform stages.
    pub request: Request,
    /// `None` until a stage produces it.
    pub response: Option<Response>,
    /// Populated by the routing stage.
    pub route: Option<Arc<Route>>,
    /// Free-form attributes written and read by stages.
    pub attributes: HashMap<String, serde_json::Value>,
    /// Failure captured by a stage that converted it into a response.
    pub failure: Option<GatewayError>,
    inbound_id: String,
}

impl PipelineContext {
    /// Create a fresh context from an inbound request.
    pub fn new(request: Request) -> Self {
        Self {
            inbound_id: request.request_id.clone(),
            request,
            response: None,
            route: None,
            attributes: HashMap::new(),
            failure: None,
        }
    }

    /// Id of the inbound request.  Stable even when a transform replaces
    /// `request` with one carrying a different id.
    pub fn request_id(&self) -> &str {
        &self.inbound_id
    }

    /// Convenience: read a typed attribute, returning `None` if absent or
    /// if deserialization fails.
    pub fn get_attr<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Convenience: write a serializable attribute.
    pub fn set_attr<T: serde::Serialize>(&mut self, key: impl Into<String>, val: &T) {
        if let Ok(v) = serde_json::to_value(val) {
            self.attributes.insert(key.into(), v);
        }
    }

    /// Record a failure and replace the response with its rendering.
    pub fn fail(&mut self, err: GatewayError) {
        self.response = Some(err.to_response(&self.inbound_id));
        self.failure = Some(err);
    }
}
