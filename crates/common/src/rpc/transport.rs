/// RPC 传输层
///
/// 客户端唯一跨越进程/网络边界的协作者：发送一个请求，得到一个响应信封。
/// 传输本身失败时返回 [`TransportError`]，与协议错误分开。

use super::error::TransportError;
use super::message::{Request, Response};
use super::server::{ActionRegistry, ContextBundle};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// 请求/响应传输
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// 发送请求并等待响应
    async fn send(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (**self).send(request).await
    }
}

/// 上下文工厂：为每个请求构造上下文集合
pub type ContextFactory = Arc<dyn Fn(&Request) -> ContextBundle + Send + Sync>;

/// 进程内传输
///
/// 直接调用本进程中的动作注册表，不经过序列化
#[derive(Clone)]
pub struct LocalTransport {
    registry: Arc<ActionRegistry>,
    contexts: ContextFactory,
}

impl LocalTransport {
    /// 创建不提供上下文的进程内传输
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self {
            registry,
            contexts: Arc::new(|_: &Request| ContextBundle::new()),
        }
    }

    /// 创建带上下文工厂的进程内传输
    pub fn with_contexts<F>(registry: Arc<ActionRegistry>, contexts: F) -> Self
    where
        F: Fn(&Request) -> ContextBundle + Send + Sync + 'static,
    {
        Self {
            registry,
            contexts: Arc::new(contexts),
        }
    }

    /// 获取注册表
    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.clone()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        debug!("进程内调用: {}", request.action);
        let contexts = (self.contexts)(&request);
        Ok(self.registry.dispatch(request, contexts).await)
    }
}

/// 由闭包实现的传输，便于接入自定义通道
pub struct FnTransport<F> {
    send: F,
}

/// 用闭包构造传输
pub fn transport_fn<F, Fut>(send: F) -> FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    FnTransport { send }
}

#[async_trait]
impl<F, Fut> Transport for FnTransport<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, TransportError>> + Send + 'static,
{
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        (self.send)(request).await
    }
}
