//! Route resolution and protocol dispatch.

mod protocol;
mod resolver;

pub use protocol::ProtocolRouter;
pub use resolver::RouteResolver;
