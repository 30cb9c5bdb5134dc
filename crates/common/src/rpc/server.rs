/// RPC 服务端调度器
///
/// 按动作名把请求路由到已注册的处理器，注入该动作的上下文，
/// 并把处理结果规整为一个响应信封。调度本身永远不会失败。

use super::error::HandleError;
use super::message::{Request, Response};
use futures_util::FutureExt;
use serde_json::Value;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::future::{ready, Future};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 装箱的 Future
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// 单个动作的上下文值（对调度器不透明）
pub type Context = Box<dyn Any + Send>;

/// 动作处理器类型
pub type ActionHandler = Arc<dyn Fn(Option<Context>, Vec<Value>) -> BoxFuture<Reply> + Send + Sync>;

/// 处理器的执行结果
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 处理器返回的信封，原样透传
    Envelope(Response),
    /// 没有返回信封（视为成功）
    Empty,
    /// 处理器故障，调度器转换为 `unknown`
    Fault(String),
}

/// 可转换为 [`Reply`] 的处理器返回值
pub trait IntoReply {
    fn into_reply(self) -> Reply;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Reply {
        self
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Reply {
        Reply::Envelope(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Reply {
        Reply::Empty
    }
}

impl IntoReply for Option<Response> {
    fn into_reply(self) -> Reply {
        match self {
            Some(response) => Reply::Envelope(response),
            None => Reply::Empty,
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: fmt::Display,
{
    fn into_reply(self) -> Reply {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Reply::Fault(err.to_string()),
        }
    }
}

/// 上下文集合：动作名 -> 该动作需要的上下文
///
/// 每个请求构造一份；不需要上下文的动作不必出现。
#[derive(Default)]
pub struct ContextBundle {
    entries: HashMap<String, Context>,
}

impl ContextBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置某个动作的上下文
    pub fn insert<C: Any + Send>(&mut self, action: impl Into<String>, context: C) {
        self.entries.insert(action.into(), Box::new(context));
    }

    /// 链式设置上下文
    pub fn with<C: Any + Send>(mut self, action: impl Into<String>, context: C) -> Self {
        self.insert(action, context);
        self
    }

    /// 取出某个动作的上下文
    pub fn take(&mut self, action: &str) -> Option<Context> {
        self.entries.remove(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.entries.contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ContextBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

fn downcast_context<C: Any>(context: Option<Context>) -> Result<C, Reply> {
    let context = context.ok_or_else(|| Reply::Fault("缺少上下文".to_string()))?;
    context
        .downcast::<C>()
        .map(|context| *context)
        .map_err(|_| Reply::Fault(format!("上下文类型不匹配，期望 {}", type_name::<C>())))
}

/// 动作注册表
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl ActionRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册同步处理器（不需要上下文）
    pub fn register<F, R>(&mut self, action: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let handler: ActionHandler = Arc::new(move |_context: Option<Context>, args: Vec<Value>| {
            Box::pin(ready(handler(args).into_reply())) as BoxFuture<Reply>
        });
        self.insert(action.into(), handler)
    }

    /// 注册异步处理器（不需要上下文）
    pub fn register_async<F, Fut, R>(&mut self, action: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        let handler: ActionHandler = Arc::new(move |_context: Option<Context>, args: Vec<Value>| {
            let fut = handler(args);
            Box::pin(async move { fut.await.into_reply() }) as BoxFuture<Reply>
        });
        self.insert(action.into(), handler)
    }

    /// 注册需要上下文 `C` 的同步处理器
    pub fn register_with_context<C, F, R>(&mut self, action: impl Into<String>, handler: F) -> &mut Self
    where
        C: Any + Send,
        F: Fn(C, Vec<Value>) -> R + Send + Sync + 'static,
        R: IntoReply,
    {
        let handler: ActionHandler = Arc::new(move |context: Option<Context>, args: Vec<Value>| {
            let reply = match downcast_context::<C>(context) {
                Ok(context) => handler(context, args).into_reply(),
                Err(fault) => fault,
            };
            Box::pin(ready(reply)) as BoxFuture<Reply>
        });
        self.insert(action.into(), handler)
    }

    /// 注册需要上下文 `C` 的异步处理器
    pub fn register_async_with_context<C, F, Fut, R>(
        &mut self,
        action: impl Into<String>,
        handler: F,
    ) -> &mut Self
    where
        C: Any + Send,
        F: Fn(C, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoReply,
    {
        let handler: ActionHandler = Arc::new(move |context: Option<Context>, args: Vec<Value>| match downcast_context::<C>(context) {
            Ok(context) => {
                let fut = handler(context, args);
                Box::pin(async move { fut.await.into_reply() }) as BoxFuture<Reply>
            }
            Err(fault) => Box::pin(ready(fault)) as BoxFuture<Reply>,
        });
        self.insert(action.into(), handler)
    }

    fn insert(&mut self, action: String, handler: ActionHandler) -> &mut Self {
        if self.handlers.insert(action.clone(), handler).is_some() {
            warn!("动作处理器被覆盖: {:?}", action);
        }
        self
    }

    /// 是否注册了该动作
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// 获取已注册的动作列表
    pub fn list_actions(&self) -> Vec<String> {
        let mut actions: Vec<String> = self.handlers.keys().cloned().collect();
        actions.sort();
        actions
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 处理 RPC 请求
    pub async fn dispatch(&self, request: Request, mut contexts: ContextBundle) -> Response {
        let Request { action, args } = request;

        info!("📨 [收到RPC请求] action={:?}, args={}", action, args.len());

        let Some(handler) = self.handlers.get(&action) else {
            warn!("❌ [动作不存在] action={:?}", action);
            return HandleError::ActionNotFound.into();
        };

        let context = contexts.take(&action);

        // 同步处理器在构造 Future 时就已执行
        let future = match catch_unwind(AssertUnwindSafe(|| handler(context, args))) {
            Ok(future) => future,
            Err(_) => {
                warn!("❌ [处理器 panic] action={:?}", action);
                return HandleError::Unknown.into();
            }
        };

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Reply::Envelope(response)) => {
                info!(
                    "✅ [RPC处理完成] action={:?}, success={}",
                    action,
                    response.is_success()
                );
                response
            }
            Ok(Reply::Empty) => {
                info!("✅ [RPC处理完成] action={:?}, 无返回值", action);
                Response::empty()
            }
            Ok(Reply::Fault(reason)) => {
                warn!("❌ [处理器故障] action={:?}, error={}", action, reason);
                HandleError::Unknown.into()
            }
            Err(_) => {
                warn!("❌ [处理器 panic] action={:?}", action);
                HandleError::Unknown.into()
            }
        }
    }

    /// 处理未经校验的原始请求（已从线上格式反序列化为 JSON）
    ///
    /// 缺失或非字符串的 `action` 按动作不存在处理；`args` 缺失或为 `null`
    /// 视为空参数；`args` 不是数组时视为调用故障。
    pub async fn dispatch_value(&self, raw: Value, contexts: ContextBundle) -> Response {
        let mut raw = raw;

        let action = match raw.get("action").and_then(Value::as_str) {
            Some(action) => action.to_string(),
            None => {
                warn!("❌ [无效请求] 缺少动作名");
                return HandleError::ActionNotFound.into();
            }
        };

        if !self.contains(&action) {
            warn!("❌ [动作不存在] action={:?}", action);
            return HandleError::ActionNotFound.into();
        }

        let args = match raw.get_mut("args").map(Value::take) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(args)) => args,
            Some(other) => {
                warn!("❌ [无效参数] action={:?}, args={}", action, other);
                return HandleError::Unknown.into();
            }
        };

        debug!("原始请求解析完成: action={:?}", action);
        self.dispatch(Request { action, args }, contexts).await
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.list_actions())
            .finish()
    }
}

/// 调度入口：`dispatch(request, handlers, contexts)`
pub async fn dispatch(request: Request, handlers: &ActionRegistry, contexts: ContextBundle) -> Response {
    handlers.dispatch(request, contexts).await
}
