//! Gateway configuration container and up-front validation.
//!
//! [`GatewayConfig`] aggregates the global settings and the seed route set,
//! and exposes a single [`validate()`](GatewayConfig::validate) method that
//! checks all structural invariants *before* any runtime resources are
//! allocated.

use crate::error::{GatewayError, codes};
use crate::route::{self, PROP_RETRY_COUNT, PROP_TIMEOUT, Route};
use crate::transform::TransformPolicy;
use crate::types::HttpMethod;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

const MODULE: &str = "config";

// ─────────────────────────────────────────────────────────────────────────────
// RouteDefinition
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted form of a [`Route`], as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub path: String,
    pub method: HttpMethod,
    pub target: String,
    #[serde(default)]
    pub request_transform: Option<String>,
    #[serde(default)]
    pub response_transform: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl From<RouteDefinition> for Route {
    fn from(def: RouteDefinition) -> Self {
        let mut route = Route::new(def.path, def.method, def.target).with_enabled(def.enabled);
        route.request_transform = def.request_transform;
        route.response_transform = def.response_transform;
        route.properties = def.properties;
        route
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level gateway configuration.
///
/// Call [`validate()`](Self::validate) before handing this config to the
/// gateway runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Identifier for this gateway instance (used in logs).
    pub id: String,
    /// Wrap successful bodies in the uniform envelope unless a route says
    /// otherwise.
    pub wrap_response: bool,
    pub request_transform_policy: TransformPolicy,
    pub response_transform_policy: TransformPolicy,
    /// Periodic route refresh; `None` means refresh only on demand.
    pub route_refresh_interval_ms: Option<u64>,
    /// Timeout applied to routes that do not declare one (must be > 0).
    pub default_timeout_ms: u64,
    /// Retry count applied to routes that do not declare one.
    pub default_retry_count: u32,
    /// Seed routes for the in-memory store.
    pub routes: Vec<RouteDefinition>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("portico")
    }
}

impl GatewayConfig {
    /// Construct a config with defaults and the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wrap_response: false,
            request_transform_policy: TransformPolicy::BestEffort,
            response_transform_policy: TransformPolicy::BestEffort,
            route_refresh_interval_ms: None,
            default_timeout_ms: route::DEFAULT_TIMEOUT.as_millis() as u64,
            default_retry_count: route::DEFAULT_RETRY_COUNT,
            routes: Vec::new(),
        }
    }

    /// Builder: add a seed route.
    pub fn with_route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_wrap_response(mut self, wrap: bool) -> Self {
        self.wrap_response = wrap;
        self
    }

    pub fn with_transform_policies(
        mut self,
        request: TransformPolicy,
        response: TransformPolicy,
    ) -> Self {
        self.request_transform_policy = request;
        self.response_transform_policy = response;
        self
    }

    pub fn with_refresh_interval_ms(mut self, ms: u64) -> Self {
        self.route_refresh_interval_ms = Some(ms);
        self
    }

    /// Seed routes converted to [`Route`]s, with the global timeout and retry
    /// defaults filled into routes that do not declare their own.
    pub fn seed_routes(&self) -> Vec<Route> {
        self.routes
            .iter()
            .cloned()
            .map(|def| {
                let mut route = Route::from(def);
                if route.property(PROP_TIMEOUT).is_none() {
                    route.properties.insert(
                        PROP_TIMEOUT.to_string(),
                        serde_json::json!(self.default_timeout_ms),
                    );
                }
                if route.property(PROP_RETRY_COUNT).is_none() {
                    route.properties.insert(
                        PROP_RETRY_COUNT.to_string(),
                        serde_json::json!(self.default_retry_count),
                    );
                }
                route
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate all structural invariants of this configuration.
    ///
    /// Returns the *first* detected problem as a `Configuration`-kind error.
    ///
    /// Checks performed (in order):
    /// 1. Gateway id is non-empty.
    /// 2. `default_timeout_ms` is non-zero.
    /// 3. A refresh interval, if set, is non-zero.
    /// 4. Each route path starts with `/`.
    /// 5. Each route target is non-blank and uses a known scheme.
    /// 6. No two routes share the same `(path, method)`.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let invalid = |msg: String| GatewayError::configuration(codes::INVALID_CONFIG, MODULE, msg);

        // ── 1. Gateway id ────────────────────────────────────────────────────
        if self.id.trim().is_empty() {
            return Err(invalid("gateway id cannot be empty".to_string()));
        }

        // ── 2. Global timeout is non-zero ────────────────────────────────────
        if self.default_timeout_ms == 0 {
            return Err(invalid("default timeout must be greater than 0 ms".to_string()));
        }

        // ── 3. Refresh interval ──────────────────────────────────────────────
        if self.route_refresh_interval_ms == Some(0) {
            return Err(invalid(
                "route refresh interval must be greater than 0 ms".to_string(),
            ));
        }

        // ── 4–6. Routes ──────────────────────────────────────────────────────
        let mut seen: HashSet<String> = HashSet::new();
        for def in &self.routes {
            if !def.path.starts_with('/') {
                return Err(invalid(format!(
                    "route path '{}' must start with '/'",
                    def.path
                )));
            }
            if def.target.trim().is_empty() {
                return Err(invalid(format!(
                    "route {} {} has an empty target",
                    def.method, def.path
                )));
            }
            let route = Route::new(def.path.clone(), def.method.clone(), def.target.clone());
            if !route.has_known_scheme() {
                return Err(invalid(format!(
                    "route {} {} has unsupported target '{}'",
                    def.method, def.path, def.target
                )));
            }
            if !seen.insert(route.cache_key()) {
                return Err(invalid(format!(
                    "route {} {} is defined more than once",
                    def.method, def.path
                )));
            }
        }

        Ok(())
    }
}
