//! Request/response transform: kernel contract.
//!
//! Transforms are externally supplied (typically a scripting engine).  They
//! receive a value plus a script reference and return a possibly modified
//! copy; the input is never edited in place.

use crate::error::GatewayResult;
use crate::types::{Request, Response};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What a transform stage does when the transform fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPolicy {
    /// Log a warning and keep the untransformed value.
    #[default]
    BestEffort,
    /// Surface the failure as a `Template`-kind error.
    Strict,
}

/// Kernel contract for the transform capability.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform_request(&self, request: &Request, script: &str) -> GatewayResult<Request>;

    async fn transform_response(
        &self,
        response: &Response,
        script: &str,
    ) -> GatewayResult<Response>;
}
