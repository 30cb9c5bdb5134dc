/// RPC 模块
///
/// 服务端动作调度与客户端响应流多路复用

pub mod message;
pub mod error;
pub mod server;
pub mod stream;
pub mod client;
pub mod transport;
pub mod frame;
pub mod ws;

pub use message::{Request, Response, TaggedResponse};
pub use error::{HandleError, TransportError};
pub use server::{dispatch, ActionRegistry, ContextBundle, IntoReply, Reply};
pub use stream::{EventStream, Operator, Subscription};
pub use client::{Action, Client};
pub use transport::{transport_fn, LocalTransport, Transport};
pub use ws::WsTransport;
