//! Protocol adapters.

mod bean;
mod http;
pub(crate) mod retry;
mod rpc;

pub use bean::{BeanAdapter, BeanMethod, BeanRegistry};
pub use http::HttpAdapter;
pub use rpc::{RpcAdapter, RpcClient, RpcTarget};
