//! Route entity, target-string parsing and deterministic route identity.
//!
//! A [`Route`] maps an exact `(path, method)` pair to a backend described by
//! a single scheme-prefixed `target` string:
//!
//! ```text
//! http://svc.internal/users        → HTTP,  target_url = whole string
//! https://svc.internal/users       → HTTP,  target_url = whole string
//! bean://userService:getUser       → BEAN,  target_bean + target_method
//! rpc://com.acme.UserApi:get:1.0   → RPC,   target_url = "com.acme.UserApi:get:1.0"
//! ```
//!
//! `route_id` and `route_name` are derived from `(path, method)`, never
//! stored, and reproduce the identifiers existing deployments already use.

use crate::error::{GatewayError, GatewayResult, codes};
use crate::types::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Property key: per-route backend timeout in milliseconds.
pub const PROP_TIMEOUT: &str = "timeout";
/// Property key: extra attempts for retryable backend failures.
pub const PROP_RETRY_COUNT: &str = "retryCount";
/// Property key: wrap successful bodies in the uniform envelope.
pub const PROP_WRAP_RESPONSE: &str = "wrapResponse";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_RETRY_COUNT: u32 = 3;

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";
const BEAN_PREFIX: &str = "bean://";
const RPC_PREFIX: &str = "rpc://";

// ─────────────────────────────────────────────────────────────────────────────
// Protocol
// ─────────────────────────────────────────────────────────────────────────────

/// Backend protocol a route dispatches to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Protocol {
    Http,
    Rpc,
    Bean,
    /// Protocols contributed by embedders; stored uppercased.
    Custom(String),
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Rpc => "RPC",
            Protocol::Bean => "BEAN",
            Protocol::Custom(name) => name,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Protocol {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HTTP" => Protocol::Http,
            "RPC" => Protocol::Rpc,
            "BEAN" => Protocol::Bean,
            other => Protocol::Custom(other.to_string()),
        }
    }
}

impl From<Protocol> for String {
    fn from(p: Protocol) -> Self {
        p.as_str().to_string()
    }
}

impl FromStr for Protocol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Protocol::from(s.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Route
// ─────────────────────────────────────────────────────────────────────────────

/// A routing rule mapping an exact `(path, method)` to a backend target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Exact request path.  Must begin with `/`.
    pub path: String,
    pub method: HttpMethod,
    /// `None` until a target has been parsed (or set explicitly).
    #[serde(default)]
    pub protocol: Option<Protocol>,
    /// Canonical scheme-prefixed target.
    pub target: String,
    /// Parsed from `target` for HTTP (whole URL) and RPC (`iface:method[:version]`).
    #[serde(default)]
    pub target_url: Option<String>,
    /// Parsed from `target` for BEAN.
    #[serde(default)]
    pub target_bean: Option<String>,
    /// Parsed from `target` for BEAN.
    #[serde(default)]
    pub target_method: Option<String>,
    /// Request transform script reference.
    #[serde(default)]
    pub request_transform: Option<String>,
    /// Response transform script reference.
    #[serde(default)]
    pub response_transform: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Open properties; see the `PROP_*` keys.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl Route {
    /// Build an enabled route and parse its target.
    pub fn new(path: impl Into<String>, method: HttpMethod, target: impl Into<String>) -> Self {
        let mut route = Self {
            path: path.into(),
            method,
            protocol: None,
            target: target.into(),
            target_url: None,
            target_bean: None,
            target_method: None,
            request_transform: None,
            response_transform: None,
            enabled: true,
            properties: HashMap::new(),
        };
        route.parse_target();
        route
    }

    pub fn with_request_transform(mut self, script: impl Into<String>) -> Self {
        self.request_transform = Some(script.into());
        self
    }

    pub fn with_response_transform(mut self, script: impl Into<String>) -> Self {
        self.response_transform = Some(script.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Replace the target and re-parse it.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
        self.parse_target();
    }

    /// Derive protocol and protocol-specific fields from `target`.
    ///
    /// A blank target is a no-op.  Unknown schemes leave every field,
    /// including a previously set protocol, untouched.  The target is
    /// matched and stored verbatim; surrounding whitespace is not stripped.
    pub fn parse_target(&mut self) {
        if self.target.trim().is_empty() {
            return;
        }
        let target = self.target.as_str();

        if target.starts_with(HTTP_PREFIX) || target.starts_with(HTTPS_PREFIX) {
            self.protocol = Some(Protocol::Http);
            self.target_url = Some(target.to_string());
            self.target_bean = None;
            self.target_method = None;
        } else if let Some(rest) = target.strip_prefix(BEAN_PREFIX) {
            self.protocol = Some(Protocol::Bean);
            let parts: Vec<&str> = rest.split(':').collect();
            if parts.len() >= 2 {
                self.target_bean = Some(parts[0].to_string());
                self.target_method = Some(parts[1].to_string());
            }
            self.target_url = None;
        } else if let Some(rest) = target.strip_prefix(RPC_PREFIX) {
            self.protocol = Some(Protocol::Rpc);
            self.target_url = Some(rest.to_string());
            self.target_bean = None;
            self.target_method = None;
        }
    }

    /// `true` when `target` carries one of the recognised schemes.
    pub fn has_known_scheme(&self) -> bool {
        let target = self.target.as_str();
        [HTTP_PREFIX, HTTPS_PREFIX, BEAN_PREFIX, RPC_PREFIX]
            .iter()
            .any(|prefix| target.starts_with(prefix))
    }

    /// Deterministic id derived from `(path, method)`.
    pub fn route_id(&self) -> String {
        route_id(&self.path, &self.method)
    }

    /// Human-readable name derived from `(path, method)`.
    pub fn route_name(&self) -> String {
        route_name(&self.path, &self.method)
    }

    /// Cache key used by the resolver: `METHOD:path`.
    pub fn cache_key(&self) -> String {
        cache_key(&self.path, &self.method)
    }

    /// Property lookup; exact key first, then ASCII case-insensitive.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key).or_else(|| {
            self.properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
    }

    /// Backend timeout; falls back to 30 s when absent or unparseable.
    pub fn timeout(&self) -> Duration {
        self.property(PROP_TIMEOUT)
            .and_then(value_as_u64)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Extra attempts for retryable failures; falls back to 3.
    pub fn retry_count(&self) -> u32 {
        self.property(PROP_RETRY_COUNT)
            .and_then(value_as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_RETRY_COUNT)
    }

    /// Per-route envelope override; `None` defers to the global setting.
    pub fn wrap_response(&self) -> Option<bool> {
        match self.property(PROP_WRAP_RESPONSE)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The protocol-specific target handed to the adapter: the URL for HTTP
    /// and RPC, `bean:method` for BEAN.
    pub fn resolved_target(&self) -> GatewayResult<String> {
        let invalid = |what: &str| {
            GatewayError::configuration(
                codes::INVALID_TARGET,
                "route",
                format!("route {} has no {what} (target '{}')", self.route_id(), self.target),
            )
        };

        match &self.protocol {
            Some(Protocol::Bean) => match (&self.target_bean, &self.target_method) {
                (Some(bean), Some(method)) => Ok(format!("{bean}:{method}")),
                _ => Err(invalid("bean name and method")),
            },
            _ => self.target_url.clone().ok_or_else(|| invalid("target url")),
        }
    }
}

fn value_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// `"route-" + |h(path + ":" + method)|`, where `h` is the base-31 polynomial
/// hash over UTF-16 code units with 32-bit wrapping.
///
/// `i32::MIN` has no positive counterpart and keeps its sign.
pub fn route_id(path: &str, method: &HttpMethod) -> String {
    let key = format!("{}:{}", path, method.as_str());
    format!("route-{}", string_hash(&key).wrapping_abs())
}

/// Path with the leading `/` stripped, separators turned into spaces and the
/// first letter capitalised, suffixed with the method: `"Api user (GET)"`.
pub fn route_name(path: &str, method: &HttpMethod) -> String {
    let stripped = path.strip_prefix('/').unwrap_or(path);
    let spaced = stripped.replace(['/', '-'], " ");
    let trimmed = spaced.trim();

    let mut chars = trimmed.chars();
    let base = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => "Root".to_string(),
    };
    format!("{base} ({})", method.as_str())
}

/// Resolver cache key for `(path, method)`.
pub fn cache_key(path: &str, method: &HttpMethod) -> String {
    format!("{}:{}", method.as_str(), path)
}

fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}
