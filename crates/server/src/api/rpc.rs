/// RPC 调用接口
///
/// `POST /rpc` 接收 `{"action", "args"}`，每个协议结果都以 200 返回响应信封

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use actionrpc_common::Response;
use serde_json::Value;
use tracing::debug;

use crate::actions::{contexts_for, Session};
use crate::app_state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rpc", post(call_action))
        .route("/actions", get(list_actions))
}

/// 调用动作
async fn call_action(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(raw): Json<Value>,
) -> Json<Response> {
    let session = Session::from_headers(&headers);
    debug!("HTTP RPC 请求: session={:?}", session.user);

    let response = state.registry.dispatch_value(raw, contexts_for(&session)).await;
    Json(response)
}

/// 已注册的动作列表
async fn list_actions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry.list_actions())
}
