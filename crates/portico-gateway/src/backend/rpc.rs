//! RPC adapter over a pluggable [`RpcClient`].
//!
//! The wire codec is not part of this crate.  The adapter only parses the
//! `iface:method[:version]` target, retries retryable failures and bounds the
//! whole call, retries included, by the route timeout.

use super::retry::deadline;
use async_trait::async_trait;
use portico_kernel::{
    CallPolicy, GatewayError, GatewayResult, Protocol, ProtocolAdapter, Request, Response, codes,
};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const MODULE: &str = "rpc-adapter";

/// Parsed `rpc://` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTarget {
    pub interface: String,
    pub method: String,
    pub version: Option<String>,
}

impl RpcTarget {
    /// Parse `iface:method[:version]`.
    pub fn parse(target: &str) -> GatewayResult<Self> {
        let mut parts = target.split(':').map(str::trim);
        let interface = parts.next().filter(|s| !s.is_empty());
        let method = parts.next().filter(|s| !s.is_empty());
        let (Some(interface), Some(method)) = (interface, method) else {
            return Err(GatewayError::configuration(
                codes::INVALID_TARGET,
                MODULE,
                format!("rpc target '{target}' is not 'interface:method[:version]'"),
            ));
        };
        Ok(Self {
            interface: interface.to_string(),
            method: method.to_string(),
            version: parts.next().filter(|s| !s.is_empty()).map(str::to_string),
        })
    }
}

impl fmt::Display for RpcTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.interface, self.method)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

/// Transport for RPC calls.  Implementations own the codec and connection
/// handling and report failures with the appropriate [`ErrorKind`]
/// (`Network`/`Timeout` failures are retried).
///
/// [`ErrorKind`]: portico_kernel::ErrorKind
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, target: &RpcTarget, request: &Request) -> GatewayResult<Response>;
}

pub struct RpcAdapter {
    client: Arc<dyn RpcClient>,
}

impl RpcAdapter {
    pub fn new(client: Arc<dyn RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProtocolAdapter for RpcAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Rpc
    }

    async fn invoke(
        &self,
        request: &Request,
        target: &str,
        policy: &CallPolicy,
    ) -> GatewayResult<Response> {
        let rpc = RpcTarget::parse(target)?;
        debug!(request_id = %request.request_id, target = %rpc, "invoking rpc");
        deadline(policy, MODULE, target, GatewayError::is_retryable, |_| {
            self.client.call(&rpc, request)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_kernel::{ErrorKind, HttpMethod};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakyClient {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RpcClient for FlakyClient {
        async fn call(&self, target: &RpcTarget, request: &Request) -> GatewayResult<Response> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GatewayError::network(codes::UPSTREAM_UNREACHABLE, "test", "reset"));
            }
            Ok(Response::new(&request.request_id, 200).with_body(target.to_string()))
        }
    }

    struct SilentClient {
        calls: AtomicU32,
    }

    #[async_trait]
    impl RpcClient for SilentClient {
        async fn call(&self, _: &RpcTarget, _: &Request) -> GatewayResult<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<GatewayResult<Response>>().await
        }
    }

    #[test]
    fn parses_optional_version() {
        let t = RpcTarget::parse("com.acme.UserApi:get:2.0").unwrap();
        assert_eq!(t.interface, "com.acme.UserApi");
        assert_eq!(t.method, "get");
        assert_eq!(t.version.as_deref(), Some("2.0"));
        assert_eq!(RpcTarget::parse("a:b").unwrap().version, None);
        assert_eq!(
            RpcTarget::parse("onlyiface").unwrap_err().code,
            codes::INVALID_TARGET
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_network_failures() {
        let client = Arc::new(FlakyClient {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let adapter = RpcAdapter::new(client.clone());
        let req = Request::new("req-1", "/rpc", HttpMethod::Post);
        let resp = adapter
            .invoke(&req, "svc.Api:run", &CallPolicy::new(Duration::from_secs(1), 3))
            .await
            .unwrap();
        assert_eq!(resp.body, "svc.Api:run");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let client = Arc::new(FlakyClient {
            failures: 10,
            calls: AtomicU32::new(0),
        });
        let adapter = RpcAdapter::new(client.clone());
        let req = Request::new("req-1", "/rpc", HttpMethod::Post);
        let err = adapter
            .invoke(&req, "svc.Api:run", &CallPolicy::new(Duration::from_secs(1), 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn route_timeout_is_a_total_budget() {
        let client = Arc::new(SilentClient {
            calls: AtomicU32::new(0),
        });
        let adapter = RpcAdapter::new(client.clone());
        let req = Request::new("req-1", "/rpc", HttpMethod::Post);
        let start = tokio::time::Instant::now();
        let err = adapter
            .invoke(&req, "svc.Api:run", &CallPolicy::new(Duration::from_millis(150), 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.code, codes::UPSTREAM_TIMEOUT);
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }
}
