//! HTTP protocol adapter.
//!
//! [`HttpAdapter`] forwards the request to the route's `target_url`, relaying
//! method, headers, query parameters and body.  The route timeout bounds the
//! whole call, retries included.  A failed connect is always retried; any
//! failure after the request may have reached the backend (timeouts, 5xx) is
//! retried only for idempotent methods.  Upstream 4xx responses are relayed
//! transparently so callers can inspect the backend's own error body; 5xx
//! responses surface as `UPSTREAM_ERROR`.

use super::retry::deadline;
use async_trait::async_trait;
use portico_kernel::{
    CallPolicy, GatewayError, GatewayResult, Protocol, ProtocolAdapter, Request, Response, codes,
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

const MODULE: &str = "http-adapter";

/// Headers never copied onto the outbound request.
const HOP_HEADERS: [&str; 3] = ["host", "content-length", "connection"];

/// Proxies requests to plain HTTP(S) backends.
pub struct HttpAdapter {
    client: Client,
}

impl HttpAdapter {
    /// Create an adapter with a default client.  Per-call timeouts come from
    /// the route, so the client itself carries only a connect timeout.
    pub fn new() -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                GatewayError::configuration(
                    codes::INVALID_CONFIG,
                    MODULE,
                    "failed to build HTTP client",
                )
                .with_source(e)
            })?;
        Ok(Self::with_client(client))
    }

    /// Create an adapter around a caller-configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    async fn send_once(
        &self,
        request: &Request,
        target: &str,
        timeout: Duration,
    ) -> GatewayResult<Response> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes()).map_err(|e| {
            GatewayError::validation(codes::INVALID_ARGUMENT, MODULE, "unsupported HTTP method")
                .with_source(e)
        })?;

        let mut builder = self
            .client
            .request(method, target)
            .timeout(timeout)
            .header("x-request-id", &request.request_id);

        let query: Vec<(&str, &str)> = request
            .query_params
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect();
        if !query.is_empty() {
            builder = builder.query(&query);
        }

        for (key, value) in &request.headers {
            if HOP_HEADERS.contains(&key.as_str()) {
                continue;
            }
            builder = builder.header(key, value);
        }
        if let Some(content_type) = &request.content_type
            && !request.headers.contains_key("content-type")
        {
            builder = builder.header("content-type", content_type);
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let start = Instant::now();
        let upstream = builder.send().await.map_err(|e| map_reqwest(e, target))?;
        let status = upstream.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in upstream.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_lowercase(), v.to_string());
            }
        }
        let body = upstream.text().await.map_err(|e| map_reqwest(e, target))?;
        debug!(
            %target,
            status,
            latency_ms = start.elapsed().as_millis() as u64,
            "upstream responded"
        );

        if status >= 500 {
            return Err(GatewayError::network(
                codes::UPSTREAM_ERROR,
                MODULE,
                format!("{target} answered {status}: {body}"),
            ));
        }

        let mut resp = Response::new(&request.request_id, status).with_body(body);
        resp.content_type = headers.get("content-type").cloned();
        resp.headers = headers;
        Ok(resp)
    }
}

#[async_trait]
impl ProtocolAdapter for HttpAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Http
    }

    async fn invoke(
        &self,
        request: &Request,
        target: &str,
        policy: &CallPolicy,
    ) -> GatewayResult<Response> {
        let replay_safe = request.method.is_idempotent();
        deadline(
            policy,
            MODULE,
            target,
            |err| err.code == codes::UPSTREAM_UNREACHABLE || (replay_safe && err.is_retryable()),
            |_| self.send_once(request, target, policy.timeout),
        )
        .await
    }
}

fn map_reqwest(err: reqwest::Error, target: &str) -> GatewayError {
    let mapped = if err.is_timeout() {
        GatewayError::timeout(
            codes::UPSTREAM_TIMEOUT,
            MODULE,
            format!("{target} timed out"),
        )
    } else if err.is_connect() {
        GatewayError::network(
            codes::UPSTREAM_UNREACHABLE,
            MODULE,
            format!("cannot connect to {target}"),
        )
    } else if err.is_builder() {
        GatewayError::configuration(
            codes::INVALID_TARGET,
            MODULE,
            format!("invalid target url '{target}'"),
        )
    } else {
        GatewayError::network(
            codes::UPSTREAM_ERROR,
            MODULE,
            format!("request to {target} failed"),
        )
    };
    mapped.with_source(err)
}
