//! `portico-gateway`: Portico gateway runtime.
//!
//! This crate provides the concrete implementations of the contracts defined
//! in `portico-kernel`:
//!
//! | Kernel contract | Implementation |
//! |----------------|----------------|
//! | [`PipelineStage`] | [`stage::AccessLogStage`], [`stage::ResponseWrapStage`], [`stage::RoutingStage`], [`stage::RequestTransformStage`], [`stage::ResponseTransformStage`], [`stage::DispatchStage`] |
//! | [`RouteStore`] | [`store::InMemoryRouteStore`] |
//! | [`ProtocolAdapter`] | [`backend::HttpAdapter`], [`backend::BeanAdapter`], [`backend::RpcAdapter`] |
//!
//! The [`pipeline::Pipeline`] runs the stages; [`gateway::Gateway`] wires
//! everything together.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use portico_gateway::backend::HttpAdapter;
//! use portico_gateway::gateway::Gateway;
//! use portico_gateway::kernel::{GatewayConfig, HttpMethod, Request, RouteDefinition};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GatewayConfig::new("edge").with_route(RouteDefinition {
//!         path: "/api/user".into(),
//!         method: HttpMethod::Get,
//!         target: "http://users.internal/users".into(),
//!         request_transform: None,
//!         response_transform: None,
//!         enabled: true,
//!         properties: HashMap::new(),
//!     });
//!
//!     let gateway = Gateway::builder(config)
//!         .with_adapter(Arc::new(HttpAdapter::new()?))
//!         .build()
//!         .await?;
//!
//!     let response = gateway
//!         .handle(Request::new(Request::generate_id(), "/api/user", HttpMethod::Get))
//!         .await;
//!     println!("{} {}", response.status_code, response.body);
//!     Ok(())
//! }
//! ```
//!
//! [`PipelineStage`]: portico_kernel::PipelineStage
//! [`RouteStore`]: portico_kernel::RouteStore
//! [`ProtocolAdapter`]: portico_kernel::ProtocolAdapter

pub mod backend;
pub mod config;
pub mod gateway;
pub mod pipeline;
pub mod router;
pub mod stage;
pub mod store;

pub use gateway::{Gateway, GatewayBuilder};
pub use pipeline::Pipeline;

// Re-export the kernel for convenience.
pub use portico_kernel as kernel;
