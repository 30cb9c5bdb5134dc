/// WebSocket 连接处理器
///
/// 每个文本帧是一条带 `id` 的 RPC 请求，在独立任务中分发，响应按完成顺序写回

use crate::actions::{contexts_for, Session};
use crate::app_state::AppState;
use actionrpc_common::rpc::frame::respond_to_frame;
use actionrpc_common::ActionRegistry;
use axum::extract::ws::{Message as AxumWsMessage, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// WebSocket 升级处理器
pub async fn handle_rpc_websocket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    // 会话在升级时确定，整个连接共用
    let session = Session::from_headers(&headers);
    let registry = state.registry();
    ws.on_upgrade(move |socket| handle_rpc_connection(socket, registry, session))
}

/// 处理 RPC WebSocket 连接
async fn handle_rpc_connection(socket: WebSocket, registry: Arc<ActionRegistry>, session: Session) {
    info!("新的 RPC WebSocket 连接: session={:?}", session.user);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // 创建消息发送通道
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // 创建消息发送任务
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sender.send(AxumWsMessage::Text(text)).await {
                error!("发送消息失败: {}", e);
                break;
            }
        }
        debug!("消息发送任务结束");
    });

    // 创建消息接收任务
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(AxumWsMessage::Text(text)) => {
                    let registry = registry.clone();
                    let session = session.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match respond_to_frame(&registry, &text, contexts_for(&session)).await {
                            Ok(reply) => {
                                if tx.send(reply).is_err() {
                                    debug!("连接已关闭，丢弃响应");
                                }
                            }
                            Err(e) => warn!("处理消息失败: {}", e),
                        }
                    });
                }
                Ok(AxumWsMessage::Close(_)) => {
                    debug!("收到关闭帧");
                    break;
                }
                Ok(AxumWsMessage::Binary(_)) => {
                    warn!("忽略二进制帧");
                }
                Ok(_) => {}
                Err(e) => {
                    error!("接收消息错误: {}", e);
                    break;
                }
            }
        }
        debug!("消息接收任务结束");
    });

    // 等待任一任务完成
    tokio::select! {
        _ = &mut send_task => {
            debug!("发送任务已结束");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            debug!("接收任务已结束");
            send_task.abort();
        }
    }

    info!("RPC WebSocket 连接已关闭");
}
