/// 配置管理

use actionrpc_common::{Error, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_ws_url: String,
    pub log_level: String,
    /// 连接失败后的重试间隔（秒）
    pub reconnect_interval: u64,
    pub connect_attempts: u32,
}

impl Config {
    /// 从环境变量加载配置（前缀 `ACTIONRPC_`）
    pub fn from_env() -> Result<Self> {
        Self::build(::config::Environment::with_prefix("ACTIONRPC").try_parsing(true))
    }

    fn build(source: ::config::Environment) -> Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("server_ws_url", "ws://localhost:3000/ws")
            .and_then(|b| b.set_default("log_level", "debug"))
            .and_then(|b| b.set_default("reconnect_interval", 5))
            .and_then(|b| b.set_default("connect_attempts", 3))
            .map_err(|e| Error::Config(e.to_string()))?
            .add_source(source)
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let cfg: Self = settings
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))?;

        if cfg.connect_attempts == 0 {
            return Err(Error::Config("connect_attempts 必须大于 0".to_string()));
        }

        Ok(cfg)
    }
}
