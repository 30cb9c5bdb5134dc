/// ActionRPC - Server
///
/// 通过 HTTP 与 WebSocket 暴露动作注册表

mod actions;
mod api;
mod app_state;
mod config;
mod ws;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{actions::UserStore, app_state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载环境变量
    dotenvy::dotenv().ok();

    // 加载配置
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

    info!("🚀 启动 ActionRPC Server...");
    info!("✅ 配置加载成功");

    // 创建应用状态
    let app_state = AppState::new(UserStore::new());
    info!("✅ 已注册动作: {:?}", app_state.registry.list_actions());

    // 设置CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 构建应用路由
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws::handle_rpc_websocket))
        .merge(api::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动服务器
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server_port));
    info!("🎯 服务器监听在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> &'static str {
    "ActionRPC Server v1"
}

async fn health_handler() -> &'static str {
    "OK"
}
