//! Terminal dispatch stage.

use crate::router::ProtocolRouter;
use async_trait::async_trait;
use portico_kernel::{
    GatewayError, GatewayResult, Next, PipelineContext, PipelineStage, StageOrder, codes,
};
use std::sync::Arc;

const MODULE: &str = "dispatch";

/// Hands the request to the [`ProtocolRouter`].  Any failure is converted
/// into an error response here and never propagated.
pub struct DispatchStage {
    router: Arc<ProtocolRouter>,
}

impl DispatchStage {
    pub fn new(router: Arc<ProtocolRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl PipelineStage for DispatchStage {
    fn name(&self) -> &str {
        "dispatch"
    }

    fn order(&self) -> StageOrder {
        StageOrder::DISPATCH
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        let outcome = match ctx.route.clone() {
            Some(route) => self.router.dispatch(&ctx.request, &route).await,
            None => Err(GatewayError::system(
                codes::INTERNAL_ERROR,
                MODULE,
                "dispatch reached without a resolved route",
            )),
        };
        match outcome {
            Ok(response) => ctx.response = Some(response),
            Err(err) => ctx.fail(err),
        }
        next.run(ctx).await
    }
}
