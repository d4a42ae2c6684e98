//! Route persistence: kernel contract.
//!
//! The [`RouteStore`] trait is the single abstraction over wherever routes are
//! persisted (files, CSV, a database…).  Implementations live outside the
//! kernel; the runtime ships an in-memory store for embedding and tests.

use crate::error::GatewayResult;
use crate::route::Route;
use crate::types::HttpMethod;
use async_trait::async_trait;

/// Kernel contract for route persistence.
///
/// Routes returned must already have their target parsed (see
/// [`Route::parse_target`]).  Disabled routes may be returned; filtering them
/// out is the resolver's job.
#[async_trait]
pub trait RouteStore: Send + Sync {
    /// Look up the route for an exact `(path, method)` pair.
    async fn find_by_path(&self, path: &str, method: &HttpMethod) -> GatewayResult<Option<Route>>;

    /// Return a full snapshot of all persisted routes.
    async fn find_all(&self) -> GatewayResult<Vec<Route>>;

    /// Look up a route by its derived id (see [`Route::route_id`]).
    async fn find_by_id(&self, route_id: &str) -> GatewayResult<Option<Route>>;
}
