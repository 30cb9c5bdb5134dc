/// WebSocket 模块

pub mod handler;

pub use handler::handle_rpc_websocket;
