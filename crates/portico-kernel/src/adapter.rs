//! Protocol adapter: kernel contract.
//!
//! One adapter exists per backend protocol.  The protocol router selects the
//! adapter whose [`ProtocolAdapter::protocol`] equals the route's protocol and
//! hands it the resolved target string together with the route's
//! [`CallPolicy`].

use crate::error::GatewayResult;
use crate::route::{Protocol, Route};
use crate::types::{Request, Response};
use async_trait::async_trait;
use std::time::Duration;

/// Per-call limits an adapter must honour.
///
/// Enforcement is the adapter's responsibility: it bounds each outbound call
/// by `timeout` and raises a `Timeout`-kind failure on expiry.  Retryable
/// failures may be retried up to `retry_count` extra times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub retry_count: u32,
}

impl CallPolicy {
    pub fn new(timeout: Duration, retry_count: u32) -> Self {
        Self {
            timeout,
            retry_count,
        }
    }

    /// Policy declared by the route's `timeout` / `retryCount` properties.
    pub fn for_route(route: &Route) -> Self {
        Self::new(route.timeout(), route.retry_count())
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::new(crate::route::DEFAULT_TIMEOUT, crate::route::DEFAULT_RETRY_COUNT)
    }
}

/// Kernel contract for a backend protocol implementation.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// The protocol this adapter serves.
    fn protocol(&self) -> Protocol;

    /// Perform the backend call.
    ///
    /// `target` is the protocol-specific target: the URL for HTTP,
    /// `iface:method[:version]` for RPC, `bean:method` for BEAN.
    async fn invoke(
        &self,
        request: &Request,
        target: &str,
        policy: &CallPolicy,
    ) -> GatewayResult<Response>;
}
