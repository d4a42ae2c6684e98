//! In-memory [`RouteStore`] implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use portico_kernel::route::cache_key;
use portico_kernel::{GatewayResult, HttpMethod, Route, RouteStore};
use std::collections::HashMap;

/// [`RouteStore`] backed by a `HashMap` keyed by `METHOD:path`.
///
/// Suitable for embedding and tests, and as the seed store built from
/// [`GatewayConfig::routes`](portico_kernel::GatewayConfig).  File and
/// database backed stores belong in separate crates.
#[derive(Default)]
pub struct InMemoryRouteStore {
    routes: RwLock<HashMap<String, Route>>,
}

impl InMemoryRouteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `routes`; later duplicates win.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let store = Self::new();
        store.replace_all(routes);
        store
    }

    /// Insert or replace a route, returning the previous one.
    pub fn upsert(&self, route: Route) -> Option<Route> {
        self.routes.write().insert(route.cache_key(), route)
    }

    pub fn remove(&self, path: &str, method: &HttpMethod) -> Option<Route> {
        self.routes.write().remove(&cache_key(path, method))
    }

    /// Replace the whole route set.
    pub fn replace_all(&self, routes: impl IntoIterator<Item = Route>) {
        let next: HashMap<String, Route> = routes
            .into_iter()
            .map(|route| (route.cache_key(), route))
            .collect();
        *self.routes.write() = next;
    }

    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

#[async_trait]
impl RouteStore for InMemoryRouteStore {
    async fn find_by_path(&self, path: &str, method: &HttpMethod) -> GatewayResult<Option<Route>> {
        Ok(self.routes.read().get(&cache_key(path, method)).cloned())
    }

    async fn find_all(&self) -> GatewayResult<Vec<Route>> {
        Ok(self.routes.read().values().cloned().collect())
    }

    async fn find_by_id(&self, route_id: &str) -> GatewayResult<Option<Route>> {
        Ok(self
            .routes
            .read()
            .values()
            .find(|route| route.route_id() == route_id)
            .cloned())
    }
}
