//! Protocol router: adapter selection and dispatch.
//!
//! The adapter list is fixed once the router is built and shared read-only
//! across requests.  Selection is first-match on [`ProtocolAdapter::protocol`];
//! registering two adapters for one protocol is a caller error and the second
//! is never consulted.

use portico_kernel::{
    CallPolicy, GatewayError, GatewayResult, Protocol, ProtocolAdapter, Request, Response, Route,
    codes,
};
use std::sync::Arc;
use tracing::debug;

const MODULE: &str = "protocol-router";

/// Registry of protocol adapters plus target resolution.
#[derive(Default, Clone)]
pub struct ProtocolRouter {
    adapters: Vec<Arc<dyn ProtocolAdapter>>,
}

impl ProtocolRouter {
    /// Build a router over `adapters` (selection order = list order).
    pub fn new(adapters: Vec<Arc<dyn ProtocolAdapter>>) -> Self {
        Self { adapters }
    }

    /// Builder: append an adapter.
    pub fn with_adapter(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Protocols served, in registration order.
    pub fn supported_protocols(&self) -> Vec<Protocol> {
        self.adapters.iter().map(|a| a.protocol()).collect()
    }

    /// First adapter declaring `protocol`.
    pub fn adapter_for(&self, protocol: &Protocol) -> Option<&Arc<dyn ProtocolAdapter>> {
        self.adapters.iter().find(|a| &a.protocol() == protocol)
    }

    /// Invoke the adapter matching `route.protocol`.
    ///
    /// Fails with `PROTOCOL_MISSING` before touching any adapter when the
    /// route has no protocol, and with `ADAPTER_NOT_FOUND` when none is
    /// registered for it.  Adapter errors are returned unchanged.
    pub async fn dispatch(&self, request: &Request, route: &Route) -> GatewayResult<Response> {
        let protocol = route
            .protocol
            .as_ref()
            .filter(|p| !p.as_str().trim().is_empty())
            .ok_or_else(|| {
                GatewayError::configuration(
                    codes::PROTOCOL_MISSING,
                    MODULE,
                    format!(
                        "route {} ({}) has no protocol; target '{}'",
                        route.route_id(),
                        route.route_name(),
                        route.target
                    ),
                )
            })?;

        let adapter = self.adapter_for(protocol).ok_or_else(|| {
            GatewayError::plugin(
                codes::ADAPTER_NOT_FOUND,
                MODULE,
                format!("no adapter registered for protocol {protocol}"),
            )
        })?;

        let target = route.resolved_target()?;
        let policy = CallPolicy::for_route(route);
        debug!(
            request_id = %request.request_id,
            route_id = %route.route_id(),
            %protocol,
            %target,
            timeout_ms = policy.timeout.as_millis() as u64,
            retry_count = policy.retry_count,
            "dispatching to adapter"
        );

        adapter.invoke(request, &target, &policy).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use portico_kernel::{ErrorKind, HttpMethod};

    /// Adapter echoing the target it was invoked with.
    struct EchoAdapter {
        protocol: Protocol,
        calls: Mutex<Vec<(String, CallPolicy)>>,
    }

    impl EchoAdapter {
        fn new(protocol: Protocol) -> Arc<Self> {
            Arc::new(Self {
                protocol,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProtocolAdapter for EchoAdapter {
        fn protocol(&self) -> Protocol {
            self.protocol.clone()
        }

        async fn invoke(
            &self,
            request: &Request,
            target: &str,
            policy: &CallPolicy,
        ) -> GatewayResult<Response> {
            self.calls.lock().push((target.to_string(), *policy));
            Ok(Response::new(&request.request_id, 200).with_body(target))
        }
    }

    fn request() -> Request {
        Request::new("req-1", "/api/user", HttpMethod::Get)
    }

    #[tokio::test]
    async fn bean_target_is_bean_colon_method() {
        let bean = EchoAdapter::new(Protocol::Bean);
        let router = ProtocolRouter::new(vec![EchoAdapter::new(Protocol::Http), bean.clone()]);
        let route = Route::new("/api/user", HttpMethod::Get, "bean://userService:getUser");

        let resp = router.dispatch(&request(), &route).await.unwrap();
        assert_eq!(resp.body, "userService:getUser");
        assert_eq!(bean.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn http_and_rpc_targets_use_target_url() {
        let router = ProtocolRouter::default()
            .with_adapter(EchoAdapter::new(Protocol::Http))
            .with_adapter(EchoAdapter::new(Protocol::Rpc));

        let http = Route::new("/a", HttpMethod::Get, "https://svc/a");
        assert_eq!(router.dispatch(&request(), &http).await.unwrap().body, "https://svc/a");

        let rpc = Route::new("/b", HttpMethod::Get, "rpc://com.acme.Api:get:2");
        assert_eq!(router.dispatch(&request(), &rpc).await.unwrap().body, "com.acme.Api:get:2");
    }

    #[tokio::test]
    async fn policy_comes_from_route_properties() {
        let http = EchoAdapter::new(Protocol::Http);
        let router = ProtocolRouter::new(vec![http.clone()]);
        let route = Route::new("/a", HttpMethod::Get, "http://svc/a")
            .with_property("timeout", serde_json::json!(1200))
            .with_property("retryCount", serde_json::json!("1"));

        router.dispatch(&request(), &route).await.unwrap();
        let policy = http.calls.lock()[0].1;
        assert_eq!(policy.timeout.as_millis(), 1200);
        assert_eq!(policy.retry_count, 1);
    }

    #[tokio::test]
    async fn missing_protocol_fails_before_any_adapter() {
        let http = EchoAdapter::new(Protocol::Http);
        let router = ProtocolRouter::new(vec![http.clone()]);
        let route = Route::new("/a", HttpMethod::Get, "");

        let err = router.dispatch(&request(), &route).await.unwrap_err();
        assert_eq!(err.code, codes::PROTOCOL_MISSING);
        assert!(http.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unregistered_protocol_is_plugin_error() {
        let router = ProtocolRouter::new(vec![EchoAdapter::new(Protocol::Http)]);
        let route = Route::new("/a", HttpMethod::Get, "bean://svc:run");

        let err = router.dispatch(&request(), &route).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Plugin);
        assert_eq!(err.code, codes::ADAPTER_NOT_FOUND);
        assert_eq!(err.status_code(), 500);
    }

    #[tokio::test]
    async fn first_registered_adapter_wins() {
        let first = EchoAdapter::new(Protocol::Http);
        let second = EchoAdapter::new(Protocol::Http);
        let router = ProtocolRouter::new(vec![first.clone(), second.clone()]);
        router
            .dispatch(&request(), &Route::new("/a", HttpMethod::Get, "http://x"))
            .await
            .unwrap();
        assert_eq!(first.calls.lock().len(), 1);
        assert!(second.calls.lock().is_empty());
        assert_eq!(router.supported_protocols(), vec![Protocol::Http, Protocol::Http]);
    }
}
