/// RPC 错误定义
///
/// 协议错误由调度器合成并放进响应信封；传输错误让客户端调用失败

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 协议错误码（调度器合成，用户代码不会产生）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum HandleError {
    /// 没有注册该名称的处理器
    ActionNotFound,
    /// 处理器调用出现未捕获的故障
    Unknown,
}

impl HandleError {
    /// 转换为字符串码
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActionNotFound => "action-not-found",
            Self::Unknown => "unknown",
        }
    }

    /// 从字符串码解析
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "action-not-found" => Some(Self::ActionNotFound),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 传输错误
///
/// 请求没有得到真正的应答；与协议错误分开，永远不会变成响应信封
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("连接已关闭")]
    ConnectionClosed,

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket 错误: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("无效消息: {0}")]
    Malformed(String),

    #[error("传输失败: {0}")]
    Remote(#[from] anyhow::Error),
}

impl TransportError {
    /// 无效消息错误
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_error_codes() {
        assert_eq!(HandleError::ActionNotFound.as_str(), "action-not-found");
        assert_eq!(HandleError::Unknown.to_string(), "unknown");
        assert_eq!(
            HandleError::from_code("action-not-found"),
            Some(HandleError::ActionNotFound)
        );
        assert_eq!(HandleError::from_code("Name too short"), None);
    }

    #[test]
    fn test_handle_error_serde_matches_code() {
        let value = serde_json::to_value(HandleError::ActionNotFound).unwrap();
        assert_eq!(value, serde_json::json!("action-not-found"));
    }

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::ConnectionClosed.to_string(), "连接已关闭");
        assert_eq!(
            TransportError::malformed("缺少 id").to_string(),
            "无效消息: 缺少 id"
        );
    }
}
