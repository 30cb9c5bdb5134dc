/// 配置管理

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server_port: u16,
    pub log_level: String,
}

impl Config {
    /// 从环境变量加载配置（前缀 `ACTIONRPC_`）
    pub fn from_env() -> anyhow::Result<Self> {
        let settings = ::config::Config::builder()
            .set_default("server_port", 3000)?
            .set_default("log_level", "debug")?
            .add_source(::config::Environment::with_prefix("ACTIONRPC").try_parsing(true))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
