/// RPC 客户端多路复用器
///
/// 每次调用的结果都打上动作名，推送到一条全局响应流；
/// 按动作、按成功/失败派生的子流在首次访问时创建并按动作名缓存。

use super::error::TransportError;
use super::message::{Request, Response, TaggedResponse};
use super::stream::EventStream;
use super::transport::Transport;
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// RPC 客户端
///
/// 克隆共享同一组流。
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,

    /// 全局响应流（按完成顺序）
    responses: EventStream<TaggedResponse>,

    /// 全局成功流
    data: EventStream<TaggedResponse>,

    /// 全局错误流
    error: EventStream<TaggedResponse>,

    /// 动作名 -> 动作访问器
    actions: Mutex<HashMap<String, Action>>,
}

impl Client {
    /// 创建客户端
    pub fn new<T: Transport>(transport: T) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    /// 基于共享的传输创建客户端
    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        let responses = EventStream::new();
        let data = responses.filter(TaggedResponse::is_success);
        let error = responses.filter(TaggedResponse::is_error);

        Self {
            inner: Arc::new(ClientInner {
                transport,
                responses,
                data,
                error,
                actions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// 获取动作访问器（首次访问时创建，之后复用）
    pub fn action(&self, name: &str) -> Action {
        let mut actions = self
            .inner
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        actions
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("创建动作访问器: {:?}", name);
                Action::new(name, self.inner.transport.clone(), &self.inner.responses)
            })
            .clone()
    }

    /// 调用动作
    ///
    /// 协议错误与处理器错误作为响应信封正常返回；只有传输失败才返回 `Err`。
    pub async fn call(&self, action: &str, args: Vec<Value>) -> Result<Response, TransportError> {
        self.action(action).call(args).await
    }

    /// 全部响应（带动作名，按完成顺序）
    pub fn responses(&self) -> EventStream<TaggedResponse> {
        self.inner.responses.clone()
    }

    /// 全部成功响应
    pub fn data(&self) -> EventStream<TaggedResponse> {
        self.inner.data.clone()
    }

    /// 全部错误响应
    pub fn error(&self) -> EventStream<TaggedResponse> {
        self.inner.error.clone()
    }

    /// 已访问过的动作名
    pub fn known_actions(&self) -> Vec<String> {
        let actions = self
            .inner
            .actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = actions.keys().cloned().collect();
        names.sort();
        names
    }
}

/// 动作访问器
///
/// 成功/错误派生流在首次访问 `data()`/`error()` 时创建；克隆共享同一组流。
#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

struct ActionInner {
    name: String,
    transport: Arc<dyn Transport>,
    responses: EventStream<TaggedResponse>,
    data: OnceCell<EventStream<Value>>,
    error: OnceCell<EventStream<Value>>,
}

impl Action {
    fn new(name: &str, transport: Arc<dyn Transport>, responses: &EventStream<TaggedResponse>) -> Self {
        Self {
            inner: Arc::new(ActionInner {
                name: name.to_string(),
                transport,
                responses: responses.clone(),
                data: OnceCell::new(),
                error: OnceCell::new(),
            }),
        }
    }

    /// 动作名
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 调用动作，结果同时推送到全局响应流
    pub async fn call(&self, args: Vec<Value>) -> Result<Response, TransportError> {
        let request = Request::new(self.inner.name.clone(), args);

        let response = match self.inner.transport.send(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("❌ [传输失败] action={:?}, error={}", self.inner.name, err);
                return Err(err);
            }
        };

        info!(
            "✅ [收到响应] action={:?}, success={}",
            self.inner.name,
            response.is_success()
        );
        self.inner
            .responses
            .push(TaggedResponse::new(self.inner.name.clone(), response.clone()));

        Ok(response)
    }

    /// 该动作的成功负载流
    pub fn data(&self) -> EventStream<Value> {
        self.inner
            .data
            .get_or_init(|| {
                let owner = self.inner.name.clone();
                self.inner
                    .responses
                    .filter_map(move |tagged: &TaggedResponse| match &tagged.response {
                        Response::Data(data) if tagged.action_name == owner => Some(data.clone()),
                        _ => None,
                    })
            })
            .clone()
    }

    /// 该动作的错误负载流
    pub fn error(&self) -> EventStream<Value> {
        self.inner
            .error
            .get_or_init(|| {
                let owner = self.inner.name.clone();
                self.inner
                    .responses
                    .filter_map(move |tagged: &TaggedResponse| match &tagged.response {
                        Response::Error(error) if tagged.action_name == owner => Some(error.clone()),
                        _ => None,
                    })
            })
            .clone()
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action").field("name", &self.inner.name).finish()
    }
}
