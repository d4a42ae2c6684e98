//! Gateway façade.
//!
//! [`Gateway`] wires a [`RouteStore`], the [`RouteResolver`], the
//! [`ProtocolRouter`] and the default stage set into a single
//! [`handle`](Gateway::handle) entry point.  Transports (HTTP servers, test
//! harnesses, the `portico` binary) build a [`Request`] and hand it over.
//!
//! Default stages, outermost first:
//!
//! | Order | Stage |
//! |-------|-------|
//! | 0 | [`AccessLogStage`] |
//! | 50 | [`ResponseWrapStage`] |
//! | 100 | [`RoutingStage`] |
//! | 200 | [`RequestTransformStage`] |
//! | 300 | [`ResponseTransformStage`] |
//! | `i32::MAX` | [`DispatchStage`] |

use crate::pipeline::Pipeline;
use crate::router::{ProtocolRouter, RouteResolver};
use crate::stage::{
    AccessLogStage, DispatchStage, RequestTransformStage, ResponseTransformStage,
    ResponseWrapStage, RoutingStage,
};
use crate::store::InMemoryRouteStore;
use portico_kernel::{
    GatewayConfig, GatewayResult, PipelineStage, ProtocolAdapter, Request, Response, RouteStore,
    Transform,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// A configured gateway instance.
pub struct Gateway {
    config: GatewayConfig,
    resolver: Arc<RouteResolver>,
    router: Arc<ProtocolRouter>,
    pipeline: Pipeline,
    refresh_task: Option<JoinHandle<()>>,
}

impl Gateway {
    pub fn builder(config: GatewayConfig) -> GatewayBuilder {
        GatewayBuilder::new(config)
    }

    /// Run one request through the pipeline.  A request without an id is
    /// given a fresh one.
    pub async fn handle(&self, mut request: Request) -> Response {
        if request.request_id.trim().is_empty() {
            request.request_id = Request::generate_id();
        }
        self.pipeline.execute(request).await
    }

    /// Reload the route cache from the store.
    pub async fn refresh_routes(&self) -> GatewayResult<usize> {
        self.resolver.refresh().await
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<RouteResolver> {
        &self.resolver
    }

    pub fn router(&self) -> &Arc<ProtocolRouter> {
        &self.router
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GatewayBuilder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    store: Option<Arc<dyn RouteStore>>,
    adapters: Vec<Arc<dyn ProtocolAdapter>>,
    transform: Option<Arc<dyn Transform>>,
    extra_stages: Vec<Arc<dyn PipelineStage>>,
}

impl GatewayBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            store: None,
            adapters: Vec::new(),
            transform: None,
            extra_stages: Vec::new(),
        }
    }

    /// Use `store` instead of an in-memory store seeded from the config.
    pub fn with_store(mut self, store: Arc<dyn RouteStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ProtocolAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Transform engine for routes declaring transform scripts.
    pub fn with_transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Add a custom stage; it is slotted in by its declared order.
    pub fn with_stage(mut self, stage: Arc<dyn PipelineStage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// Validate the config, warm the route cache and assemble the pipeline.
    ///
    /// When the config sets `route_refresh_interval_ms`, a background refresh
    /// task is started; it stops when the gateway is dropped.
    pub async fn build(self) -> GatewayResult<Gateway> {
        let config = self.config;
        config.validate()?;

        let store = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryRouteStore::from_routes(config.seed_routes())),
        };
        let resolver = Arc::new(RouteResolver::new(store));
        let servable = resolver.refresh().await?;
        let router = Arc::new(ProtocolRouter::new(self.adapters));

        let mut stages: Vec<Arc<dyn PipelineStage>> = vec![
            Arc::new(AccessLogStage::new()),
            Arc::new(ResponseWrapStage::new(config.wrap_response)),
            Arc::new(RoutingStage::new(Arc::clone(&resolver))),
            Arc::new(RequestTransformStage::new(
                self.transform.clone(),
                config.request_transform_policy,
            )),
            Arc::new(ResponseTransformStage::new(
                self.transform,
                config.response_transform_policy,
            )),
            Arc::new(DispatchStage::new(Arc::clone(&router))),
        ];
        stages.extend(self.extra_stages);
        let pipeline = Pipeline::new(stages);

        let refresh_task = config
            .route_refresh_interval_ms
            .map(|ms| resolver.spawn_refresh(Duration::from_millis(ms)));

        info!(
            gateway_id = %config.id,
            routes = servable,
            protocols = ?router.supported_protocols(),
            stages = ?pipeline.stage_names(),
            periodic_refresh = refresh_task.is_some(),
            "gateway ready"
        );

        Ok(Gateway {
            config,
            resolver,
            router,
            pipeline,
            refresh_task,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BeanAdapter, BeanRegistry};
    use portico_kernel::{ErrorKind, GatewayError, HttpMethod, RouteDefinition, codes};
    use serde_json::json;
    use std::collections::HashMap;

    fn def(path: &str, method: HttpMethod, target: &str) -> RouteDefinition {
        RouteDefinition {
            path: path.to_string(),
            method,
            target: target.to_string(),
            request_transform: None,
            response_transform: None,
            enabled: true,
            properties: HashMap::new(),
        }
    }

    fn beans() -> Arc<BeanAdapter> {
        let registry = BeanRegistry::new();
        registry
            .register_fn("health", "ping", |_| Ok(json!({ "pong": true })))
            .unwrap();
        Arc::new(BeanAdapter::new(Arc::new(registry)))
    }

    #[tokio::test]
    async fn default_stage_set_is_ordered() {
        let gateway = Gateway::builder(GatewayConfig::new("gw")).build().await.unwrap();
        assert_eq!(
            gateway.pipeline().stage_names(),
            vec![
                "access-log",
                "response-wrap",
                "routing",
                "request-transform",
                "response-transform",
                "dispatch"
            ]
        );
    }

    #[tokio::test]
    async fn serves_seeded_bean_route() {
        let config = GatewayConfig::new("gw").with_route(def("/ping", HttpMethod::Get, "bean://health:ping"));
        let gateway = Gateway::builder(config)
            .with_adapter(beans())
            .build()
            .await
            .unwrap();
        assert_eq!(gateway.resolver().len(), 1);

        let resp = gateway.handle(Request::new("", "/ping", HttpMethod::Get)).await;
        assert_eq!(resp.status_code, 200);
        assert!(!resp.request_id.is_empty());
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&resp.body).unwrap(),
            json!({ "pong": true })
        );
    }

    #[tokio::test]
    async fn invalid_config_fails_build() {
        let config = GatewayConfig::new("gw").with_route(def("ping", HttpMethod::Get, "bean://h:p"));
        let err = Gateway::builder(config).build().await.err().unwrap();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn store_failure_at_startup_is_reported() {
        struct Down;

        #[async_trait::async_trait]
        impl RouteStore for Down {
            async fn find_by_path(
                &self,
                _: &str,
                _: &HttpMethod,
            ) -> GatewayResult<Option<portico_kernel::Route>> {
                Ok(None)
            }

            async fn find_all(&self) -> GatewayResult<Vec<portico_kernel::Route>> {
                Err(GatewayError::storage(codes::STORE_UNAVAILABLE, "test", "down"))
            }

            async fn find_by_id(&self, _: &str) -> GatewayResult<Option<portico_kernel::Route>> {
                Ok(None)
            }
        }

        let err = Gateway::builder(GatewayConfig::new("gw"))
            .with_store(Arc::new(Down))
            .build()
            .await
            .err()
            .unwrap();
        assert_eq!(err.code, codes::STORE_UNAVAILABLE);
    }
}
