//! Structured access-logging stage.
//!
//! Emits `tracing` events on both sides of the chain, recording path, method,
//! request id, resolved route, response status and round-trip latency.

use async_trait::async_trait;
use portico_kernel::{GatewayResult, Next, PipelineContext, PipelineStage, StageOrder};
use std::time::Instant;
use tracing::{error, info};

/// Access-log stage; outermost, so it observes the final response.
#[derive(Default)]
pub struct AccessLogStage;

impl AccessLogStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineStage for AccessLogStage {
    fn name(&self) -> &str {
        "access-log"
    }

    fn order(&self) -> StageOrder {
        StageOrder::ACCESS_LOG
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        info!(
            request_id = %ctx.request.request_id,
            method     = ctx.request.method.as_str(),
            path       = %ctx.request.path,
            client_ip  = ?ctx.request.client_ip,
            "→ inbound request"
        );
        let started = Instant::now();

        let result = next.run(ctx).await;
        let latency_ms = started.elapsed().as_millis() as u64;
        let route_id = ctx.route.as_ref().map(|r| r.route_id()).unwrap_or_default();

        match (&result, &ctx.response) {
            (Err(err), _) => error!(
                request_id = %ctx.request.request_id,
                path       = %ctx.request.path,
                route_id   = %route_id,
                code       = %err.code,
                latency_ms,
                "← pipeline error"
            ),
            (Ok(()), Some(resp)) if resp.status_code >= 500 => error!(
                request_id = %ctx.request.request_id,
                path       = %ctx.request.path,
                route_id   = %route_id,
                status     = resp.status_code,
                error      = ?resp.error_message,
                latency_ms,
                "← error response"
            ),
            (Ok(()), Some(resp)) => info!(
                request_id = %ctx.request.request_id,
                path       = %ctx.request.path,
                route_id   = %route_id,
                status     = resp.status_code,
                latency_ms,
                "← outbound response"
            ),
            (Ok(()), None) => info!(
                request_id = %ctx.request.request_id,
                path       = %ctx.request.path,
                latency_ms,
                "← no response produced"
            ),
        }

        ctx.set_attr("access_log.latency_ms", &latency_ms);
        result
    }
}
