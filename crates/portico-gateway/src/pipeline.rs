//! Pipeline engine.

use portico_kernel::{
    GatewayError, Next, PipelineContext, PipelineStage, Request, Response, codes,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

const MODULE: &str = "pipeline";

/// Ordered list of stages executed as a wrapping chain.
///
/// Stages are sorted by [`StageOrder`](portico_kernel::StageOrder) in
/// ascending order (lowest value is the outermost wrapper).  Ties keep
/// registration order.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn PipelineStage>>,
}

impl Pipeline {
    /// Build a pipeline from a list of stages, sorted by their declared order.
    pub fn new(mut stages: Vec<Arc<dyn PipelineStage>>) -> Self {
        stages.sort_by_key(|s| s.order());
        Self { stages }
    }

    /// Stage names, outermost first.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run `request` through every stage and produce the final response.
    ///
    /// Never fails: an error escaping the chain is rendered by the error
    /// model, and a chain that completes without producing a response yields
    /// a `NO_RESPONSE` system error.  The returned response always carries
    /// the inbound request id and the processing time.
    pub async fn execute(&self, request: Request) -> Response {
        let started = Instant::now();
        let request_id = request.request_id.clone();
        let mut ctx = PipelineContext::new(request);

        let outcome = Next::new(&self.stages).run(&mut ctx).await;
        let mut response = match outcome {
            Ok(()) => match ctx.response.take() {
                Some(resp) => resp,
                None => {
                    warn!(request_id = %request_id, "pipeline completed without a response");
                    GatewayError::system(
                        codes::NO_RESPONSE,
                        MODULE,
                        "no stage produced a response",
                    )
                    .to_response(&request_id)
                }
            },
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    code = %err.code,
                    kind = err.kind.as_str(),
                    error = %err.message,
                    "pipeline aborted"
                );
                err.to_response(&request_id)
            }
        };

        response.request_id = request_id;
        response.processing_time = Some(started.elapsed());
        if response.response_time.is_none() {
            response.response_time = Some(chrono::Utc::now());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use portico_kernel::{ErrorKind, GatewayResult, HttpMethod, StageOrder};

    /// Stage appending `label:pre` / `label:post` to the `trace` attribute.
    struct Recorder {
        label: &'static str,
        order: i32,
        respond: bool,
    }

    fn recorder(label: &'static str, order: i32) -> Arc<dyn PipelineStage> {
        Arc::new(Recorder {
            label,
            order,
            respond: false,
        })
    }

    fn push(ctx: &mut PipelineContext, entry: String) {
        let mut trace: Vec<String> = ctx.get_attr("trace").unwrap_or_default();
        trace.push(entry);
        ctx.set_attr("trace", &trace);
    }

    #[async_trait]
    impl PipelineStage for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn order(&self) -> StageOrder {
            StageOrder(self.order)
        }

        async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()> {
            push(ctx, format!("{}:pre", self.label));
            if self.respond {
                ctx.response = Some(Response::new(ctx.request_id(), 200));
            }
            let result = next.run(ctx).await;
            push(ctx, format!("{}:post", self.label));
            let trace: Vec<String> = ctx.get_attr("trace").unwrap_or_default();
            if let Some(resp) = ctx.response.as_mut() {
                resp.body = trace.join(",");
            }
            result
        }
    }

    struct Failing;

    #[async_trait]
    impl PipelineStage for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn order(&self) -> StageOrder {
            StageOrder(10)
        }

        async fn execute(&self, _ctx: &mut PipelineContext, _next: Next<'_>) -> GatewayResult<()> {
            Err(GatewayError::validation("BAD_INPUT", "test", "bad input"))
        }
    }

    fn request() -> Request {
        Request::new("req-42", "/x", HttpMethod::Get)
    }

    #[tokio::test]
    async fn stages_nest_by_order_with_stable_ties() {
        let terminal: Arc<dyn PipelineStage> = Arc::new(Recorder {
            label: "d",
            order: i32::MAX,
            respond: true,
        });
        let pipeline = Pipeline::new(vec![
            terminal,
            recorder("c", 300),
            recorder("a", 100),
            recorder("b", 100),
        ]);
        assert_eq!(pipeline.stage_names(), vec!["a", "b", "c", "d"]);

        let resp = pipeline.execute(request()).await;
        assert_eq!(
            resp.body,
            "a:pre,b:pre,c:pre,d:pre,d:post,c:post,b:post,a:post"
        );
        assert_eq!(resp.request_id, "req-42");
        assert!(resp.processing_time.is_some());
        assert!(resp.response_time.is_some());
    }

    #[tokio::test]
    async fn missing_response_is_system_error() {
        let pipeline = Pipeline::new(vec![recorder("a", 1)]);
        let resp = pipeline.execute(request()).await;
        assert_eq!(resp.status_code, 500);
        assert_eq!(
            resp.headers.get("x-gateway-error-code").map(String::as_str),
            Some(codes::NO_RESPONSE)
        );
    }

    #[tokio::test]
    async fn errors_unwind_through_outer_stages() {
        let pipeline = Pipeline::new(vec![recorder("outer", 0), Arc::new(Failing)]);
        let resp = pipeline.execute(request()).await;
        assert_eq!(resp.status_code, ErrorKind::Validation.status_code());
        assert_eq!(resp.request_id, "req-42");
        assert_eq!(resp.error_message.as_deref(), Some("bad input"));
    }

    #[tokio::test]
    async fn empty_pipeline_produces_no_response_error() {
        let resp = Pipeline::new(Vec::new()).execute(request()).await;
        assert!(resp.is_failure());
        assert_eq!(resp.request_id, "req-42");
    }
}
