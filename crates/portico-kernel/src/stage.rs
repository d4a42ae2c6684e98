//! Pipeline stage trait and continuation type.
//!
//! Stages are sorted by their declared [`StageOrder`] and *nested*: the
//! lowest order is the outermost wrapper, the highest is innermost and
//! conventionally performs the backend dispatch.
//!
//! ```text
//! AccessLog ─► ResponseWrap ─► Routing ─► RequestTransform ─► ResponseTransform ─► Dispatch
//!                                                                                     │
//! AccessLog ◄─ ResponseWrap ◄─ Routing ◄─ RequestTransform ◄─ ResponseTransform ◄─────┘
//! ```
//!
//! Each stage receives a [`Next`] continuation.  Code before
//! `next.run(ctx).await` is request pre-processing, code after it is response
//! post-processing; not calling it short-circuits everything nested inside.

use crate::error::GatewayResult;
use crate::types::PipelineContext;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

// ─────────────────────────────────────────────────────────────────────────────
// Stage ordering
// ─────────────────────────────────────────────────────────────────────────────

/// Numeric nesting slot for a stage.
///
/// The well-known slots below are guidelines; any value is accepted so
/// embedders can slot custom stages between the standard phases.  Stages with
/// equal order values nest in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StageOrder(pub i32);

impl StageOrder {
    /// Access logging; outermost so it observes the final response.
    pub const ACCESS_LOG: StageOrder = StageOrder(0);
    /// Uniform envelope; wraps whatever the inner stages produced.
    pub const RESPONSE_WRAP: StageOrder = StageOrder(50);
    /// Route resolution.
    pub const ROUTING: StageOrder = StageOrder(100);
    pub const REQUEST_TRANSFORM: StageOrder = StageOrder(200);
    pub const RESPONSE_TRANSFORM: StageOrder = StageOrder(300);
    /// Terminal protocol dispatch.
    pub const DISPATCH: StageOrder = StageOrder(i32::MAX);
}

// ─────────────────────────────────────────────────────────────────────────────
// PipelineStage trait
// ─────────────────────────────────────────────────────────────────────────────

/// A single ordered unit of request/response processing.
///
/// Implementations must be `Send + Sync`: one stage instance serves every
/// request concurrently, while each [`PipelineContext`] belongs to exactly one.
///
/// An `Err` returned from `execute` unwinds through the outer stages exactly
/// like a normal return; stages that want to post-process failures should
/// capture the result of `next.run(..)` instead of using `?` on it.
#[async_trait]
pub trait PipelineStage: Send + Sync {
    /// Stable, human-readable identifier for this stage (used in logs).
    fn name(&self) -> &str;

    /// Nesting position.  Lower values wrap higher ones.
    fn order(&self) -> StageOrder;

    async fn execute(&self, ctx: &mut PipelineContext, next: Next<'_>) -> GatewayResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Next
// ─────────────────────────────────────────────────────────────────────────────

/// Continuation over the stages nested inside the current one.
pub struct Next<'a> {
    stages: &'a [Arc<dyn PipelineStage>],
}

impl<'a> Next<'a> {
    /// Continuation over `stages`, which must already be sorted.
    pub fn new(stages: &'a [Arc<dyn PipelineStage>]) -> Self {
        Self { stages }
    }

    /// Number of stages still to run.
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }

    /// Run the remaining stages, returning once all of them (and everything
    /// nested inside them) have completed.  Past the last stage this is a
    /// no-op.
    pub async fn run(self, ctx: &mut PipelineContext) -> GatewayResult<()> {
        let Some((stage, rest)) = self.stages.split_first() else {
            return Ok(());
        };
        trace!(
            request_id = %ctx.request.request_id,
            stage = stage.name(),
            order = stage.order().0,
            "entering stage"
        );
        stage.execute(ctx, Next { stages: rest }).await
    }
}
