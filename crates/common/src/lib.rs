/// ActionRPC - 公共库
///
/// 提供 Server 和 Client 共享的协议类型、动作调度、事件流与传输

pub mod errors;
pub mod rpc;

// 重新导出常用类型
pub use errors::{Error, Result};
pub use rpc::{
    dispatch, Action, ActionRegistry, Client, ContextBundle, EventStream, HandleError,
    LocalTransport, Request, Response, TaggedResponse, Transport, TransportError, WsTransport,
};
