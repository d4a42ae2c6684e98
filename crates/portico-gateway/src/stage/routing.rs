//! Routing stage: resolve and attach the route.

use crate::router::RouteResolver;
use async_trait::async_trait;
use portico_kernel::{GatewayResult, Next, PipelineContext, PipelineStage, StageOrder};
use std::sync::Arc;
use tracing::debug;

/// Resolves `(path, method)` through the [`RouteResolver`] and stores the
/// route on the context.  An unknown route short-circuits the chain with a
/// 404 error response; nothing nested inside runs.
pub struct RoutingStage {
    resolver: Arc<RouteResolver>,
}

impl RoutingStage {
    pub fn new(resolver: Arc<RouteResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl PipelineStage for RoutingStage {
    fn name(&self) -> &str {
        "routing"
    }

    fn order(&self) -> StageOrder {
        StageOrder::ROUTING
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        let resolved = self
            .resolver
            .resolve(&ctx.request.path, &ctx.request.method)
            .await;
        match resolved {
            Ok(route) => {
                debug!(
                    request_id = %ctx.request.request_id,
                    route_id = %route.route_id(),
                    route_name = %route.route_name(),
                    "route resolved"
                );
                ctx.set_attr("route.id", &route.route_id());
                ctx.route = Some(route);
                next.run(ctx).await
            }
            Err(err) => {
                ctx.fail(err);
                Ok(())
            }
        }
    }
}
