/// RPC 消息定义
///
/// 请求、响应信封以及客户端使用的带动作名响应

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::HandleError;

/// RPC 请求
///
/// `args` 缺省时视为空参数列表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// 动作名（精确匹配处理器）
    pub action: String,

    /// 位置参数
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    /// 创建请求
    pub fn new(action: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// 响应信封
///
/// 线上格式为 `{"data": ...}` 或 `{"error": ...}`，两者互斥
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Response {
    /// 成功
    Data(Value),
    /// 失败
    Error(Value),
}

impl Response {
    /// 创建成功响应
    pub fn data(data: impl Into<Value>) -> Self {
        Self::Data(data.into())
    }

    /// 创建错误响应
    pub fn error(error: impl Into<Value>) -> Self {
        Self::Error(error.into())
    }

    /// 无返回值的成功响应（`{"data": null}`）
    pub fn empty() -> Self {
        Self::Data(Value::Null)
    }

    /// 判断是否是成功响应
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    /// 判断是否是错误响应
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// 成功负载
    pub fn data_ref(&self) -> Option<&Value> {
        match self {
            Self::Data(data) => Some(data),
            Self::Error(_) => None,
        }
    }

    /// 错误负载
    pub fn error_ref(&self) -> Option<&Value> {
        match self {
            Self::Data(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// 是否为调度器合成的协议错误
    pub fn handle_error(&self) -> Option<HandleError> {
        self.error_ref()
            .and_then(Value::as_str)
            .and_then(HandleError::from_code)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 从 JSON 字符串反序列化
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl From<HandleError> for Response {
    fn from(err: HandleError) -> Self {
        Self::Error(Value::String(err.as_str().to_string()))
    }
}

/// 带动作名的响应，仅用于客户端流路由，不上线
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedResponse {
    pub action_name: String,

    #[serde(flatten)]
    pub response: Response,
}

impl TaggedResponse {
    pub fn new(action_name: impl Into<String>, response: Response) -> Self {
        Self {
            action_name: action_name.into(),
            response,
        }
    }

    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }

    pub fn is_error(&self) -> bool {
        self.response.is_error()
    }
}
