/// WebSocket 帧编解码
///
/// 在请求/响应外加一层 `id` 用于关联：
/// 请求帧 `{"id", "action", "args"}`，响应帧 `{"id", "data"}` 或 `{"id", "error"}`

use super::error::TransportError;
use super::message::{Request, Response};
use super::server::{ActionRegistry, ContextBundle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 请求帧（发送方使用）
#[derive(Debug, Serialize)]
struct RequestFrame<'a> {
    id: &'a str,
    #[serde(flatten)]
    request: &'a Request,
}

/// 响应帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    #[serde(flatten)]
    pub response: Response,
}

/// 生成请求 ID
pub fn next_request_id() -> String {
    format!("req-{}", Uuid::new_v4())
}

/// 编码请求帧
pub fn encode_request(id: &str, request: &Request) -> Result<String, TransportError> {
    Ok(serde_json::to_string(&RequestFrame { id, request })?)
}

/// 编码响应帧
pub fn encode_response(id: impl Into<String>, response: Response) -> Result<String, TransportError> {
    let frame = ResponseFrame {
        id: id.into(),
        response,
    };
    Ok(serde_json::to_string(&frame)?)
}

/// 解码响应帧
pub fn decode_response(text: &str) -> Result<ResponseFrame, TransportError> {
    Ok(serde_json::from_str(text)?)
}

/// 服务端处理一个请求帧，返回编码好的响应帧
///
/// 帧内容不可信：无法解析或缺少字符串 `id` 时无法回复，返回错误；
/// 其余情况一律交给调度器，总会得到一个响应信封。
pub async fn respond_to_frame(
    registry: &ActionRegistry,
    text: &str,
    contexts: ContextBundle,
) -> Result<String, TransportError> {
    let mut raw: Value = serde_json::from_str(text)?;

    let id = match raw.as_object_mut().and_then(|frame| frame.remove("id")) {
        Some(Value::String(id)) => id,
        _ => return Err(TransportError::malformed("请求帧缺少 id")),
    };

    let response = registry.dispatch_value(raw, contexts).await;
    encode_response(id, response)
}
