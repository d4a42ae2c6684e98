//! Uniform response envelope.
//!
//! ```json
//! {
//!   "result": { "code": 200, "status": "SUCCESS", "message": "OK" },
//!   "data":   <backend body, parsed as JSON when possible>,
//!   "meta":   { "requestId": "...", "timestamp": 1700000000000 }
//! }
//! ```

use async_trait::async_trait;
use portico_kernel::{
    GatewayResult, Next, PipelineContext, PipelineStage, Response, StageOrder,
};
use serde_json::{Value, json};

/// Post-only: re-shapes successful backend responses into the envelope when
/// the route's `wrapResponse` property (or, failing that, the global default)
/// asks for it.  Gateway failure responses keep the error body.
pub struct ResponseWrapStage {
    default_enabled: bool,
}

impl ResponseWrapStage {
    pub fn new(default_enabled: bool) -> Self {
        Self { default_enabled }
    }
}

#[async_trait]
impl PipelineStage for ResponseWrapStage {
    fn name(&self) -> &str {
        "response-wrap"
    }

    fn order(&self) -> StageOrder {
        StageOrder::RESPONSE_WRAP
    }

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
        next.run(ctx).await?;

        let enabled = ctx
            .route
            .as_ref()
            .and_then(|r| r.wrap_response())
            .unwrap_or(self.default_enabled);
        if !enabled {
            return Ok(());
        }
        let request_id = ctx.request_id().to_string();
        if let Some(response) = ctx.response.as_mut()
            && !response.is_failure()
        {
            wrap(response, &request_id);
        }
        Ok(())
    }
}

fn wrap(response: &mut Response, request_id: &str) {
    let success = response.is_success();
    let data = if response.body.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&response.body).unwrap_or_else(|_| Value::String(response.body.clone()))
    };
    let (status, message) = if success {
        ("SUCCESS", "OK".to_string())
    } else {
        ("FAIL", format!("upstream returned {}", response.status_code))
    };
    let envelope = json!({
        "result": {
            "code": response.status_code,
            "status": status,
            "message": message,
        },
        "data": data,
        "meta": {
            "requestId": request_id,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        },
    });
    response.body = envelope.to_string();
    response.content_type = Some("application/json".to_string());
    response
        .headers
        .insert("content-type".to_string(), "application/json".to_string());
    response.headers.remove("content-length");
}
