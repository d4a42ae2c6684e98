//! Built-in pipeline stages.

mod access_log;
mod dispatch;
mod routing;
mod transform;
mod wrap;

pub use access_log::AccessLogStage;
pub use dispatch::DispatchStage;
pub use routing::RoutingStage;
pub use transform::{RequestTransformStage, ResponseTransformStage};
pub use wrap::ResponseWrapStage;
