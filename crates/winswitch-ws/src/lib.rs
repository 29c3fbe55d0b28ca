/*! Winswitch JSON-RPC over WebSocket. */

mod relay;
mod rpc;
mod server;

pub use relay::ServerFrame;
pub use rpc::{dispatch, dispatch_json, RpcRequest, RpcResponse};
pub use server::{router, start_server, WebSocketState, DEFAULT_WS_PORT};
