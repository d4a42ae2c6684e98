//! `portico-kernel`: data model and contracts for the Portico gateway core.
//!
//! This crate defines the *types, error taxonomy and trait interfaces* of the
//! gateway.  Concrete implementations (pipeline engine, resolver, protocol
//! router, adapters) live in `portico-gateway`.
//!
//! # Architecture mapping
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              portico-kernel  (this crate)                   │
//! │  Request / Response / PipelineContext   Route + Protocol    │
//! │  GatewayError + ErrorKind + classify    GatewayConfig       │
//! │  PipelineStage + Next   RouteStore   ProtocolAdapter        │
//! │  Transform                                                  │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │  depends on
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │              portico-gateway  (runtime crate)               │
//! │  Pipeline + built-in stages     RouteResolver (cache)       │
//! │  ProtocolRouter   HttpAdapter / BeanAdapter / RpcAdapter    │
//! │  InMemoryRouteStore             Gateway façade              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust
//! use portico_kernel::{HttpMethod, Protocol, Route};
//!
//! let route = Route::new("/api/user", HttpMethod::Get, "bean://userService:getUser");
//! assert_eq!(route.protocol, Some(Protocol::Bean));
//! assert_eq!(route.route_id(), "route-858608907");
//! assert_eq!(route.route_name(), "Api user (GET)");
//! ```

pub mod adapter;
pub mod config;
pub mod error;
pub mod route;
pub mod stage;
pub mod store;
pub mod transform;
pub mod types;

// ── Flat re-exports ────────────────────────────────────────────────────────

pub use adapter::{CallPolicy, ProtocolAdapter};
pub use config::{GatewayConfig, RouteDefinition};
pub use error::{BoxError, ErrorKind, GatewayError, GatewayResult, classify, codes};
pub use route::{Protocol, Route, route_id, route_name};
pub use stage::{Next, PipelineStage, StageOrder};
pub use store::RouteStore;
pub use transform::{Transform, TransformPolicy};
pub use types::{HttpMethod, PipelineContext, Request, Response};
