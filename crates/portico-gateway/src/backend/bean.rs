//! In-process BEAN adapter.
//!
//! Beans are named handlers registered explicitly at startup; there is no
//! reflective lookup.  A route target `bean://orders:create` resolves to the
//! `("orders", "create")` entry of the [`BeanRegistry`].

use super::retry::bounded;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use portico_kernel::{
    CallPolicy, GatewayError, GatewayResult, Protocol, ProtocolAdapter, Request, Response, codes,
};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

const MODULE: &str = "bean-adapter";

/// A registered bean method.
pub type BeanMethod =
    Arc<dyn Fn(Request) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Explicit `(bean, method)` → handler registry.
#[derive(Default)]
pub struct BeanRegistry {
    methods: RwLock<HashMap<(String, String), BeanMethod>>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async handler.  Registering the same pair twice is an
    /// error.
    pub fn register<F, Fut>(
        &self,
        bean: impl Into<String>,
        method: impl Into<String>,
        handler: F,
    ) -> GatewayResult<()>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let key = (bean.into(), method.into());
        let mut methods = self.methods.write();
        if methods.contains_key(&key) {
            return Err(GatewayError::configuration(
                codes::INVALID_CONFIG,
                MODULE,
                format!("bean method '{}:{}' is already registered", key.0, key.1),
            ));
        }
        let handler: BeanMethod = Arc::new(move |req| handler(req).boxed());
        methods.insert(key, handler);
        Ok(())
    }

    /// Register a synchronous handler.
    pub fn register_fn<F>(
        &self,
        bean: impl Into<String>,
        method: impl Into<String>,
        handler: F,
    ) -> GatewayResult<()>
    where
        F: Fn(&Request) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(bean, method, move |req| {
            let handler = Arc::clone(&handler);
            async move { handler(&req) }
        })
    }

    pub fn lookup(&self, bean: &str, method: &str) -> Option<BeanMethod> {
        self.methods
            .read()
            .get(&(bean.to_string(), method.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }
}

/// Invokes handlers from a [`BeanRegistry`].  Bean calls are local, so they
/// are bounded by the route timeout but never retried.
pub struct BeanAdapter {
    registry: Arc<BeanRegistry>,
}

impl BeanAdapter {
    pub fn new(registry: Arc<BeanRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BeanRegistry> {
        &self.registry
    }
}

#[async_trait]
impl ProtocolAdapter for BeanAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Bean
    }

    async fn invoke(
        &self,
        request: &Request,
        target: &str,
        policy: &CallPolicy,
    ) -> GatewayResult<Response> {
        let (bean, method) = target
            .split_once(':')
            .filter(|(b, m)| !b.is_empty() && !m.is_empty())
            .ok_or_else(|| {
                GatewayError::configuration(
                    codes::INVALID_TARGET,
                    MODULE,
                    format!("bean target '{target}' is not 'bean:method'"),
                )
            })?;

        let handler = self.registry.lookup(bean, method).ok_or_else(|| {
            GatewayError::configuration(
                codes::BEAN_NOT_FOUND,
                MODULE,
                format!("no bean method registered for '{bean}:{method}'"),
            )
        })?;

        debug!(request_id = %request.request_id, %bean, %method, "invoking bean");
        let call = async {
            handler(request.clone())
                .await
                .map_err(|e| GatewayError::from_anyhow(e, MODULE))
        };
        let value = bounded(policy.timeout, MODULE, target, call).await?;
        Ok(Response::ok_json(&request.request_id, &value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_kernel::{ErrorKind, HttpMethod};
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> Arc<BeanRegistry> {
        let registry = BeanRegistry::new();
        registry
            .register_fn("userService", "getUser", |req| {
                Ok(json!({ "id": req.query("id"), "name": "alice" }))
            })
            .unwrap();
        registry
            .register("orders", "create", |req: Request| async move {
                let order: Value = serde_json::from_str(&req.body)?;
                Ok::<_, anyhow::Error>(json!({ "created": order }))
            })
            .unwrap();
        Arc::new(registry)
    }

    fn policy() -> CallPolicy {
        CallPolicy::new(Duration::from_secs(1), 3)
    }

    #[tokio::test]
    async fn invokes_registered_method() {
        let adapter = BeanAdapter::new(registry());
        let req = Request::new("req-1", "/api/user", HttpMethod::Get).with_query("id", "7");
        let resp = adapter
            .invoke(&req, "userService:getUser", &policy())
            .await
            .unwrap();
        assert_eq!(resp.status_code, 200);
        let body: Value = serde_json::from_str(&resp.body).unwrap();
        assert_eq!(body, json!({ "id": "7", "name": "alice" }));
    }

    #[tokio::test]
    async fn unknown_method_is_bean_not_found() {
        let adapter = BeanAdapter::new(registry());
        let req = Request::new("req-1", "/x", HttpMethod::Get);
        let err = adapter
            .invoke(&req, "userService:deleteUser", &policy())
            .await
            .unwrap_err();
        assert_eq!(err.code, codes::BEAN_NOT_FOUND);
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn handler_errors_are_classified() {
        let adapter = BeanAdapter::new(registry());
        let req = Request::new("req-1", "/orders", HttpMethod::Post).with_body("not json");
        let err = adapter
            .invoke(&req, "orders:create", &policy())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = registry();
        let err = registry
            .register_fn("userService", "getUser", |_| Ok(Value::Null))
            .unwrap_err();
        assert_eq!(err.code, codes::INVALID_CONFIG);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_bean_times_out_without_retry() {
        let calls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let registry = BeanRegistry::new();
        registry
            .register("slow", "run", move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(Value::Null)
                }
            })
            .unwrap();
        let adapter = BeanAdapter::new(Arc::new(registry));
        let req = Request::new("req-1", "/x", HttpMethod::Get);
        let err = adapter
            .invoke(&req, "slow:run", &CallPolicy::new(Duration::from_millis(100), 3))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
