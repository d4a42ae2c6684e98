//! Request and response transform stages.
//!
//! Both stages apply the script referenced by the resolved route through the
//! external [`Transform`] capability.  What happens when the transform fails
//! is governed by [`TransformPolicy`]: `BestEffort` logs a warning and keeps
//! the untransformed value, `Strict` turns the failure into a `Template`-kind
//! `TRANSFORM_FAILED` error response.
//!
//! A route that declares a script while no transform engine is installed is
//! treated as a transform failure.

use async_trait::async_trait;
use portico_kernel::{
    GatewayError, GatewayResult, Next, PipelineContext, PipelineStage, StageOrder, Transform,
    TransformPolicy, codes,
};
use std::sync::Arc;
use tracing::{debug, warn};

const MODULE: &str = "transform";

fn transform_failed(side: &str, script: &str, cause: Option<GatewayError>) -> GatewayError {
    match cause {
        Some(cause) => GatewayError::template(
            codes::TRANSFORM_FAILED,
            MODULE,
            format!("{side} transform '{script}' failed: {}", cause.message),
        )
        .with_source(cause),
        None => GatewayError::template(
            codes::TRANSFORM_FAILED,
            MODULE,
            format!("{side} transform '{script}' declared but no transform engine is installed"),
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request side
// ─────────────────────────────────────────────────────────────────────────────

/// Pre-only: replaces `ctx.request` with the transformed copy.
pub struct RequestTransformStage {
    transform: Option<Arc<dyn Transform>>,
    policy: TransformPolicy,
}

impl RequestTransformStage {
    pub fn new(transform: Option<Arc<dyn Transform>>, policy: TransformPolicy) -> Self {
        Self { transform, policy }
    }

    pub fn policy(&self) -> TransformPolicy {
        self.policy
    }
}

#[async_trait]
impl PipelineStage for RequestTransformStage {
    fn name(&self) -> &str {
        "request-transform"
    }

    fn order(&self) -> StageOrder {
        StageOrder::REQUEST_TRANSFORM
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        let script = ctx
            .route
            .as_ref()
            .and_then(|r| r.request_transform.clone())
            .filter(|s| !s.trim().is_empty());

        if let Some(script) = script {
            let outcome = match &self.transform {
                Some(transform) => transform
                    .transform_request(&ctx.request, &script)
                    .await
                    .map_err(|e| transform_failed("request", &script, Some(e))),
                None => Err(transform_failed("request", &script, None)),
            };
            match (outcome, self.policy) {
                (Ok(request), _) => {
                    debug!(request_id = %ctx.request.request_id, %script, "request transformed");
                    ctx.request = request;
                }
                (Err(err), TransformPolicy::BestEffort) => {
                    warn!(
                        request_id = %ctx.request.request_id,
                        %script,
                        error = %err.message,
                        "request transform failed, keeping original request"
                    );
                }
                (Err(err), TransformPolicy::Strict) => {
                    ctx.fail(err);
                    return Ok(());
                }
            }
        }

        next.run(ctx).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Response side
// ─────────────────────────────────────────────────────────────────────────────

/// Post-only: replaces the response produced by the inner stages with the
/// transformed copy.  Failure responses are left alone.
pub struct ResponseTransformStage {
    transform: Option<Arc<dyn Transform>>,
    policy: TransformPolicy,
}

impl ResponseTransformStage {
    pub fn new(transform: Option<Arc<dyn Transform>>, policy: TransformPolicy) -> Self {
        Self { transform, policy }
    }

    pub fn policy(&self) -> TransformPolicy {
        self.policy
    }
}

#[async_trait]
impl PipelineStage for ResponseTransformStage {
    fn name(&self) -> &str {
        "response-transform"
    }

    fn order(&self) -> StageOrder {
        StageOrder::RESPONSE_TRANSFORM
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        next.run(ctx).await?;

        let script = ctx
            .route
            .as_ref()
            .and_then(|r| r.response_transform.clone())
            .filter(|s| !s.trim().is_empty());
        let (Some(script), Some(response)) = (script, ctx.response.as_ref()) else {
            return Ok(());
        };
        if response.is_failure() {
            return Ok(());
        }

        let outcome = match &self.transform {
            Some(transform) => transform
                .transform_response(response, &script)
                .await
                .map_err(|e| transform_failed("response", &script, Some(e))),
            None => Err(transform_failed("response", &script, None)),
        };
        match (outcome, self.policy) {
            (Ok(transformed), _) => {
                debug!(request_id = %ctx.request.request_id, %script, "response transformed");
                ctx.response = Some(transformed);
            }
            (Err(err), TransformPolicy::BestEffort) => {
                warn!(
                    request_id = %ctx.request.request_id,
                    %script,
                    error = %err.message,
                    "response transform failed, keeping original response"
                );
            }
            (Err(err), TransformPolicy::Strict) => ctx.fail(err),
        }
        Ok(())
    }
}
