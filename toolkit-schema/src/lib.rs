pub mod connections;
pub mod mcp;
pub mod rpc;
pub mod webhook;

pub use rpc::{Page, PageInput, RpcResponse};
