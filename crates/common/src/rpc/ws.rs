/// WebSocket 传输
///
/// 通过请求 ID 在一条 WebSocket 连接上关联请求与响应。
/// 不设超时：对端一直不应答时调用会一直挂起，连接关闭时所有挂起调用失败。

use super::error::TransportError;
use super::frame::{decode_response, encode_request, next_request_id};
use super::message::{Request, Response};
use super::transport::Transport;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, WebSocketStream};
use tracing::{debug, error, info, warn};

/// RPC 响应等待器
type ResponseWaiter = oneshot::Sender<Result<Response, TransportError>>;

#[derive(Default)]
struct PendingState {
    /// 待响应的请求映射（request_id -> response_sender）
    waiters: HashMap<String, ResponseWaiter>,
    /// 连接已关闭，不再接受新请求
    closed: bool,
}

/// WebSocket RPC 传输
#[derive(Clone)]
pub struct WsTransport {
    pending: Arc<Mutex<PendingState>>,

    /// 发送文本帧的通道
    sender: mpsc::UnboundedSender<String>,
}

impl WsTransport {
    /// 连接到服务端
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws_stream, _) = connect_async(url).await?;
        info!("✅ WebSocket 连接成功: {}", url);
        Ok(Self::from_stream(ws_stream))
    }

    /// 基于已建立的 WebSocket 流创建传输，并启动收发任务
    pub fn from_stream<S>(stream: WebSocketStream<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_sender, mut ws_receiver) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let pending = Arc::new(Mutex::new(PendingState::default()));

        // 发送任务：所有句柄都被丢弃后关闭连接
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                if let Err(e) = ws_sender.send(WsMessage::Text(text)).await {
                    error!("发送消息失败: {}", e);
                    break;
                }
            }
            let _ = ws_sender.close().await;
            debug!("发送任务结束");
        });

        // 接收任务：按 ID 唤醒等待器
        let receiver_pending = pending.clone();
        tokio::spawn(async move {
            while let Some(result) = ws_receiver.next().await {
                let text = match result {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("收到无效的二进制消息: {}", e);
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        error!("接收消息错误: {}", e);
                        break;
                    }
                };

                let frame = match decode_response(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("无法解析响应帧: {}", e);
                        continue;
                    }
                };

                let waiter = receiver_pending.lock().await.waiters.remove(&frame.id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(Ok(frame.response));
                    }
                    None => warn!("收到未预期的响应消息: {}", frame.id),
                }
            }

            Self::fail_pending(&receiver_pending).await;
            debug!("接收任务结束");
        });

        Self {
            pending,
            sender: tx,
        }
    }

    /// 连接关闭：拒绝后续请求并让所有挂起请求失败
    async fn fail_pending(pending: &Mutex<PendingState>) {
        let mut state = pending.lock().await;
        state.closed = true;
        for (id, waiter) in state.waiters.drain() {
            debug!("清理待处理请求: {}", id);
            let _ = waiter.send(Err(TransportError::ConnectionClosed));
        }
    }

    /// 获取待处理请求数量
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.waiters.len()
    }

    /// 连接是否已关闭
    pub async fn is_closed(&self) -> bool {
        self.pending.lock().await.closed
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let id = next_request_id();
        let text = encode_request(&id, &request)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.pending.lock().await;
            if state.closed {
                return Err(TransportError::ConnectionClosed);
            }
            state.waiters.insert(id.clone(), tx);
        }

        if self.sender.send(text).is_err() {
            self.pending.lock().await.waiters.remove(&id);
            return Err(TransportError::ConnectionClosed);
        }
        debug!("已发送请求: action={}, id={}", request.action, id);

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectionClosed),
        }
    }
}
