/// ActionRPC - Client
///
/// 通过 WebSocket 连接服务端，订阅响应流并执行一组示例调用

mod config;

use actionrpc_common::{Client, Response, TaggedResponse, TransportError, WsTransport};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();
    let cfg = config::Config::from_env()?;

    // 初始化日志
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level)),
        )
        .init();

    info!("🚀 启动 ActionRPC Client...");
    info!("🎯 连接到 Server: {}", cfg.server_ws_url);

    run(&cfg).await?;
    Ok(())
}

async fn run(cfg: &config::Config) -> actionrpc_common::Result<()> {
    let transport = connect(cfg).await?;
    let client = Client::new(transport);

    // 全局响应流
    let _all = client.responses().listen(|tagged: &TaggedResponse| {
        info!("📨 [{}] {:?}", tagged.action_name, tagged.response);
    });

    // 按动作订阅
    let _added = client.action("addUser").data().listen(|user: &Value| {
        info!("👤 已新增用户: {}", user);
    });
    let _rejected = client.action("addUser").error().listen(|error: &Value| {
        warn!("⚠️ 新增用户被拒绝: {}", error);
    });

    for (name, age) in [("alice", json!(30)), ("b", json!(20)), ("carol", Value::Null)] {
        client.call("addUser", vec![json!(name), age]).await?;
    }

    let deleted = client.call("deleteUser", vec![json!(1)]).await?;
    if let Some(error) = deleted.error_ref() {
        info!("未登录时删除用户失败: {}", error);
    }

    let users = client.call("listUsers", vec![]).await?;
    if let Response::Data(users) = &users {
        info!("📋 当前用户: {}", users);
    }

    client.call("ping", vec![]).await?;

    let ghost = client.call("ghost", vec![]).await?;
    if let Some(code) = ghost.handle_error() {
        info!("未注册动作: {}", code);
    }

    info!("✅ 示例调用完成");
    Ok(())
}

/// 连接服务端，失败时按配置的间隔重试
async fn connect(cfg: &config::Config) -> Result<WsTransport, TransportError> {
    let mut attempt = 1;
    loop {
        match WsTransport::connect(&cfg.server_ws_url).await {
            Ok(transport) => {
                info!("✅ 已连接: {}", cfg.server_ws_url);
                return Ok(transport);
            }
            Err(e) if attempt < cfg.connect_attempts => {
                warn!("连接失败 (第 {} 次): {}，{} 秒后重试", attempt, e, cfg.reconnect_interval);
                tokio::time::sleep(Duration::from_secs(cfg.reconnect_interval)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
