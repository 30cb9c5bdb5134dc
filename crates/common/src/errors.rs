/// 统一错误类型

use thiserror::Error;

use crate::rpc::TransportError;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum Error {
    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),

    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts() {
        let err: Error = TransportError::ConnectionClosed.into();
        assert_eq!(err.to_string(), "传输错误: 连接已关闭");
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("缺少端口".to_string());
        assert_eq!(err.to_string(), "配置错误: 缺少端口");
    }
}
