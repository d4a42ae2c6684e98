//! Gateway error taxonomy.
//!
//! Every failure raised anywhere in the gateway (route resolution, protocol
//! dispatch, transforms and adapters alike) is represented as a
//! [`GatewayError`] carrying a stable short code, one [`ErrorKind`], the name of the module it
//! originated in, a human message and an optional wrapped cause.
//!
//! [`classify`] turns arbitrary foreign errors into a [`GatewayError`], and
//! [`GatewayError::to_response`] renders any error into the uniform error
//! [`Response`] returned to callers:
//!
//! ```text
//! {"error":{"code":"ROUTE_NOT_FOUND","type":"ROUTING","module":"route-resolver",
//!           "message":"no route for GET /missing"},"timestamp":1700000000000}
//! ```

use crate::types::Response;
use serde_json::json;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed, thread-safe error used as the wrapped cause of a [`GatewayError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Result alias used by every gateway contract.
pub type GatewayResult<T> = Result<T, GatewayError>;

// ─────────────────────────────────────────────────────────────────────────────
// Error codes
// ─────────────────────────────────────────────────────────────────────────────

/// Stable error codes emitted by the gateway core.
pub mod codes {
    pub const ROUTE_NOT_FOUND: &str = "ROUTE_NOT_FOUND";
    pub const PROTOCOL_MISSING: &str = "PROTOCOL_MISSING";
    pub const ADAPTER_NOT_FOUND: &str = "ADAPTER_NOT_FOUND";
    pub const INVALID_TARGET: &str = "INVALID_TARGET";
    pub const BEAN_NOT_FOUND: &str = "BEAN_NOT_FOUND";
    pub const TRANSFORM_FAILED: &str = "TRANSFORM_FAILED";
    pub const UPSTREAM_TIMEOUT: &str = "UPSTREAM_TIMEOUT";
    pub const UPSTREAM_UNREACHABLE: &str = "UPSTREAM_UNREACHABLE";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const STORE_UNAVAILABLE: &str = "STORE_UNAVAILABLE";
    pub const NO_RESPONSE: &str = "NO_RESPONSE";
    pub const INVALID_CONFIG: &str = "INVALID_CONFIG";
    pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";
    pub const SERIALIZATION_FAILED: &str = "SERIALIZATION_FAILED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

// ─────────────────────────────────────────────────────────────────────────────
// ErrorKind
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of a gateway failure.  Each kind maps to a default HTTP
/// status via [`status_code`](Self::status_code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Routing,
    Validation,
    Authorization,
    RateLimit,
    Timeout,
    Network,
    Proxy,
    Plugin,
    System,
    Serialization,
    Template,
    Storage,
    Business,
    Configuration,
    Unknown,
}

impl ErrorKind {
    /// Default HTTP status for failures of this kind.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Routing => 404,
            ErrorKind::Validation => 400,
            ErrorKind::Authorization => 401,
            ErrorKind::RateLimit => 429,
            ErrorKind::Timeout => 408,
            ErrorKind::Network => 502,
            ErrorKind::Proxy
            | ErrorKind::Plugin
            | ErrorKind::System
            | ErrorKind::Serialization
            | ErrorKind::Template
            | ErrorKind::Storage
            | ErrorKind::Business
            | ErrorKind::Configuration
            | ErrorKind::Unknown => 500,
        }
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Uppercase name used as the `type` field of the error body.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Routing => "ROUTING",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Authorization => "AUTHORIZATION",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::Network => "NETWORK",
            ErrorKind::Proxy => "PROXY",
            ErrorKind::Plugin => "PLUGIN",
            ErrorKind::System => "SYSTEM",
            ErrorKind::Serialization => "SERIALIZATION",
            ErrorKind::Template => "TEMPLATE",
            ErrorKind::Storage => "STORAGE",
            ErrorKind::Business => "BUSINESS",
            ErrorKind::Configuration => "CONFIGURATION",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    fn default_code(self) -> &'static str {
        match self {
            ErrorKind::Timeout => codes::UPSTREAM_TIMEOUT,
            ErrorKind::Network => codes::UPSTREAM_UNREACHABLE,
            ErrorKind::Validation => codes::INVALID_ARGUMENT,
            ErrorKind::Serialization => codes::SERIALIZATION_FAILED,
            _ => codes::INTERNAL_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayError
// ─────────────────────────────────────────────────────────────────────────────

/// A classified gateway failure.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct GatewayError {
    /// Stable short error code, e.g. `ROUTE_NOT_FOUND`.
    pub code: String,
    /// Taxonomy kind; drives the HTTP status and retryability.
    pub kind: ErrorKind,
    /// Name of the module that raised the failure.
    pub module: String,
    /// Human-readable message.
    pub message: String,
    /// Wrapped cause, if any.
    #[source]
    pub source: Option<BoxError>,
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            pub fn $name(
                code: impl Into<String>,
                module: impl Into<String>,
                message: impl Into<String>,
            ) -> Self {
                Self::new(ErrorKind::$kind, code, module, message)
            }
        )*
    };
}

impl GatewayError {
    /// Construct an error without a cause.
    pub fn new(
        kind: ErrorKind,
        code: impl Into<String>,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            kind,
            module: module.into(),
            message: message.into(),
            source: None,
        }
    }

    kind_constructors! {
        /// 404-class: no route matched.
        routing => Routing,
        /// 400-class: malformed input.
        validation => Validation,
        /// 408-class: the backend did not answer in time.
        timeout => Timeout,
        /// 502-class: the backend could not be reached or failed.
        network => Network,
        plugin => Plugin,
        system => System,
        serialization => Serialization,
        template => Template,
        storage => Storage,
        configuration => Configuration,
    }

    /// Builder: attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// HTTP status derived from the kind.
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    /// See [`ErrorKind::is_retryable`].
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Classify an `anyhow::Error`.  A [`GatewayError`] at the root is returned
    /// untouched; otherwise the context chain is inspected the same way
    /// [`classify`] inspects a source chain.
    pub fn from_anyhow(err: anyhow::Error, module: &str) -> Self {
        let err = match err.downcast::<GatewayError>() {
            Ok(gateway) => return gateway,
            Err(other) => other,
        };
        let kind = err
            .chain()
            .find_map(kind_of_single)
            .unwrap_or_else(|| kind_from_text(&format!("{err:#}")));
        GatewayError::new(kind, kind.default_code(), module, format!("{err:#}"))
            .with_source(BoxError::from(err))
    }

    /// Render this failure as the final error [`Response`] for `request_id`.
    pub fn to_response(&self, request_id: &str) -> Response {
        let mut error = json!({
            "code": self.code,
            "type": self.kind.as_str(),
            "module": self.module,
            "message": self.message,
        });
        if let Some(cause) = &self.source {
            error["cause"] = json!(cause.to_string());
        }
        let body = json!({
            "error": error,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });

        let mut resp = Response::new(request_id, self.status_code())
            .with_json_body(&body)
            .with_header("x-gateway-error-code", self.code.clone());
        resp.error_message = Some(self.message.clone());
        resp
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Turn an arbitrary error into a [`GatewayError`].
///
/// A boxed [`GatewayError`] is returned unchanged.  Otherwise the source chain
/// is inspected: I/O errors are network failures (or timeouts for
/// `TimedOut`), JSON errors are serialization failures, primitive parse errors
/// are validation failures.  Failing a type match, the rendered message is
/// checked for connection or timeout wording; anything left is `System`.
pub fn classify(err: BoxError, module: &str) -> GatewayError {
    let err = match err.downcast::<GatewayError>() {
        Ok(gateway) => return *gateway,
        Err(other) => other,
    };

    let kind = kind_of(&*err);
    GatewayError::new(kind, kind.default_code(), module, err.to_string()).with_source(err)
}

fn kind_of(err: &(dyn StdError + 'static)) -> ErrorKind {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(kind) = kind_of_single(e) {
            return kind;
        }
        current = e.source();
    }
    kind_from_text(&err.to_string())
}

fn kind_of_single(e: &(dyn StdError + 'static)) -> Option<ErrorKind> {
    if let Some(gateway) = e.downcast_ref::<GatewayError>() {
        return Some(gateway.kind);
    }
    if let Some(io) = e.downcast_ref::<std::io::Error>() {
        return Some(match io.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                ErrorKind::Validation
            }
            _ => ErrorKind::Network,
        });
    }
    if e.is::<serde_json::Error>() {
        return Some(ErrorKind::Serialization);
    }
    if e.is::<std::num::ParseIntError>()
        || e.is::<std::num::ParseFloatError>()
        || e.is::<std::str::ParseBoolError>()
    {
        return Some(ErrorKind::Validation);
    }
    None
}

fn kind_from_text(text: &str) -> ErrorKind {
    let text = text.to_lowercase();
    if text.contains("timed out") || text.contains("timeout") {
        ErrorKind::Timeout
    } else if text.contains("connection refused")
        || text.contains("connection reset")
        || text.contains("broken pipe")
        || text.contains("connect error")
    {
        ErrorKind::Network
    } else if text.contains("invalid argument") || text.contains("illegal argument") {
        ErrorKind::Validation
    } else {
        ErrorKind::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_table_matches_taxonomy() {
        assert_eq!(ErrorKind::Routing.status_code(), 404);
        assert_eq!(ErrorKind::Validation.status_code(), 400);
        assert_eq!(ErrorKind::Authorization.status_code(), 401);
        assert_eq!(ErrorKind::RateLimit.status_code(), 429);
        assert_eq!(ErrorKind::Timeout.status_code(), 408);
        assert_eq!(ErrorKind::Network.status_code(), 502);
        for kind in [
            ErrorKind::Proxy,
            ErrorKind::Plugin,
            ErrorKind::System,
            ErrorKind::Serialization,
            ErrorKind::Template,
            ErrorKind::Storage,
            ErrorKind::Business,
            ErrorKind::Configuration,
            ErrorKind::Unknown,
        ] {
            assert_eq!(kind.status_code(), 500, "{kind}");
        }
    }

    #[test]
    fn only_network_and_timeout_retry() {
        assert!(ErrorKind::Network.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Routing.is_retryable());
        assert!(!ErrorKind::System.is_retryable());
    }

    #[test]
    fn classify_keeps_gateway_errors() {
        let original = GatewayError::routing(codes::ROUTE_NOT_FOUND, "resolver", "missing");
        let classified = classify(Box::new(original), "dispatch");
        assert_eq!(classified.kind, ErrorKind::Routing);
        assert_eq!(classified.module, "resolver");
    }

    #[test]
    fn classify_io_errors() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify(Box::new(refused), "http").kind, ErrorKind::Network);

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(classify(Box::new(timed_out), "http").kind, ErrorKind::Timeout);
    }

    #[test]
    fn classify_json_and_parse_errors() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert_eq!(
            classify(Box::new(json_err), "bean").kind,
            ErrorKind::Serialization
        );

        let parse_err = "abc".parse::<u32>().unwrap_err();
        assert_eq!(classify(Box::new(parse_err), "bean").kind, ErrorKind::Validation);
    }

    #[test]
    fn classify_unknown_is_system() {
        let err: BoxError = "something odd happened".into();
        let classified = classify(err, "bean");
        assert_eq!(classified.kind, ErrorKind::System);
        assert_eq!(classified.code, codes::INTERNAL_ERROR);
        assert_eq!(classified.message, "something odd happened");
    }

    #[test]
    fn from_anyhow_finds_wrapped_kinds() {
        let err = anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ))
        .context("calling inventory");
        assert_eq!(GatewayError::from_anyhow(err, "bean").kind, ErrorKind::Network);

        let gateway = anyhow::Error::new(GatewayError::validation("BAD_ID", "bean", "bad id"));
        let back = GatewayError::from_anyhow(gateway, "other");
        assert_eq!(back.code, "BAD_ID");
        assert_eq!(back.module, "bean");
    }

    #[test]
    fn error_response_shape() {
        let err = GatewayError::plugin(codes::ADAPTER_NOT_FOUND, "protocol-router", "no adapter")
            .with_source(std::io::Error::other("root cause"));
        let resp = err.to_response("req-42");

        assert_eq!(resp.request_id, "req-42");
        assert_eq!(resp.status_code, 500);
        assert_eq!(resp.error_message.as_deref(), Some("no adapter"));

        let body: serde_json::Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body["error"]["code"], "ADAPTER_NOT_FOUND");
        assert_eq!(body["error"]["type"], "PLUGIN");
        assert_eq!(body["error"]["module"], "protocol-router");
        assert_eq!(body["error"]["cause"], "root cause");
        assert!(body["timestamp"].is_i64());
    }
}
