//! Route resolver: exact-match lookup over a [`RouteStore`] with a shared cache.
//!
//! The cache is keyed by `METHOD:path` and only ever holds *enabled* routes.
//! Concurrency contract:
//!
//! - any number of concurrent readers (`resolve`);
//! - cache misses insert single entries under a short write lock;
//! - [`refresh`](RouteResolver::refresh) builds the replacement map without
//!   holding any lock and swaps it in under one write lock, so readers see
//!   either the old or the new set, never an empty cache.
//!
//! A generation counter is bumped on every swap; a miss that started before
//! a swap does not insert its (possibly stale) result afterwards.

use parking_lot::RwLock;
use portico_kernel::route::cache_key;
use portico_kernel::{GatewayError, GatewayResult, HttpMethod, Route, RouteStore, codes};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const MODULE: &str = "route-resolver";

/// Cache + lookup over an injected [`RouteStore`].
pub struct RouteResolver {
    store: Arc<dyn RouteStore>,
    cache: RwLock<HashMap<String, Arc<Route>>>,
    generation: AtomicU64,
}

impl RouteResolver {
    /// Create a resolver with an empty cache.
    pub fn new(store: Arc<dyn RouteStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Resolve an exact `(path, method)` pair.
    ///
    /// Returns a `Routing`-kind `ROUTE_NOT_FOUND` error when the store has no
    /// such route or the route is disabled.  Store failures propagate as-is.
    pub async fn resolve(&self, path: &str, method: &HttpMethod) -> GatewayResult<Arc<Route>> {
        let key = cache_key(path, method);

        if let Some(route) = self.cached(&key) {
            return Ok(route);
        }

        let generation = self.generation.load(Ordering::Acquire);
        match self.store.find_by_path(path, method).await? {
            Some(route) if route.enabled => {
                let route = Arc::new(route);
                self.insert_if_current(key, Arc::clone(&route), generation);
                debug!(route_id = %route.route_id(), %path, method = method.as_str(), "route cached");
                Ok(route)
            }
            Some(_) => {
                debug!(%path, method = method.as_str(), "route is disabled");
                Err(not_found(path, method))
            }
            None => Err(not_found(path, method)),
        }
    }

    /// Resolve by derived route id, consulting the cache first.
    pub async fn resolve_by_id(&self, route_id: &str) -> GatewayResult<Arc<Route>> {
        let hit = self
            .cache
            .read()
            .values()
            .find(|route| route.route_id() == route_id)
            .cloned();
        if let Some(route) = hit {
            return Ok(route);
        }

        let generation = self.generation.load(Ordering::Acquire);
        match self.store.find_by_id(route_id).await? {
            Some(route) if route.enabled => {
                let route = Arc::new(route);
                self.insert_if_current(route.cache_key(), Arc::clone(&route), generation);
                Ok(route)
            }
            _ => Err(GatewayError::routing(
                codes::ROUTE_NOT_FOUND,
                MODULE,
                format!("route not found: {route_id}"),
            )),
        }
    }

    /// Replace the cache with the enabled routes of the latest store snapshot.
    ///
    /// Returns the number of servable routes.  On store failure the previous
    /// cache is kept.
    pub async fn refresh(&self) -> GatewayResult<usize> {
        let snapshot = self.store.find_all().await?;
        let total = snapshot.len();
        let next: HashMap<String, Arc<Route>> = snapshot
            .into_iter()
            .filter(|route| route.enabled)
            .map(|route| (route.cache_key(), Arc::new(route)))
            .collect();
        let servable = next.len();

        {
            let mut cache = self.cache.write();
            *cache = next;
            self.generation.fetch_add(1, Ordering::AcqRel);
        }

        info!(
            total,
            servable,
            disabled = total - servable,
            "route cache refreshed"
        );
        Ok(servable)
    }

    /// Drop one cached entry; the next lookup goes to the store.
    pub fn invalidate(&self, path: &str, method: &HttpMethod) -> bool {
        self.cache.write().remove(&cache_key(path, method)).is_some()
    }

    /// Snapshot of the cached routes.
    pub fn cached_routes(&self) -> Vec<Arc<Route>> {
        self.cache.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Refresh every `interval` on a background task.  Failures are logged
    /// and the previous cache stays in place.
    pub fn spawn_refresh(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let resolver = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = resolver.refresh().await {
                    warn!(error = %err, "periodic route refresh failed");
                }
            }
        })
    }

    fn cached(&self, key: &str) -> Option<Arc<Route>> {
        self.cache
            .read()
            .get(key)
            .filter(|route| route.enabled)
            .cloned()
    }

    fn insert_if_current(&self, key: String, route: Arc<Route>, generation: u64) {
        let mut cache = self.cache.write();
        if self.generation.load(Ordering::Acquire) == generation {
            cache.insert(key, route);
        }
    }
}

fn not_found(path: &str, method: &HttpMethod) -> GatewayError {
    GatewayError::routing(
        codes::ROUTE_NOT_FOUND,
        MODULE,
        format!("route not found: {} {}", method.as_str(), path),
    )
}
