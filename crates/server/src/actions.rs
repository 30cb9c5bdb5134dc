/// 服务端动作
///
/// 用户管理示例动作，以及按请求头构造的会话上下文

use actionrpc_common::{ActionRegistry, ContextBundle, Response};
use axum::http::{header, HeaderMap};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// 会话上下文（从 `Authorization: Bearer <token>` 派生，不做校验）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub user: Option<String>,
}

impl Session {
    /// 从请求头构造会话
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self { user }
    }
}

/// 为每个需要会话的动作放入上下文
pub fn contexts_for(session: &Session) -> ContextBundle {
    ContextBundle::new().with("deleteUser", session.clone())
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub age: Option<u64>,
}

/// 内存用户表
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<RwLock<BTreeMap<u64, User>>>,
    next_id: Arc<AtomicU64>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, name: String, age: Option<u64>) -> User {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User { id, name, age };
        self.users.write().await.insert(id, user.clone());
        user
    }

    pub async fn remove(&self, id: u64) -> Option<User> {
        self.users.write().await.remove(&id)
    }

    pub async fn list(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

/// 构建动作注册表
pub fn build_registry(store: UserStore) -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    let users = store.clone();
    registry.register_async("addUser", move |args: Vec<Value>| {
        let users = users.clone();
        async move {
            let name = args.first().and_then(Value::as_str).unwrap_or_default();
            if name.chars().count() < 2 {
                return Ok(Response::error("Name too short"));
            }
            let age = match args.get(1) {
                None | Some(Value::Null) => None,
                Some(value) => match value.as_u64() {
                    Some(age) => Some(age),
                    None => return Ok(Response::error("Invalid age")),
                },
            };

            let user = users.insert(name.to_string(), age).await;
            info!("👤 新增用户: id={}, name={}", user.id, user.name);
            serde_json::to_value(&user).map(Response::data)
        }
    });

    let users = store.clone();
    registry.register_async_with_context("deleteUser", move |session: Session, args: Vec<Value>| {
        let users = users.clone();
        async move {
            let Some(operator) = session.user else {
                return Response::error("Not signed in");
            };
            let Some(id) = args.first().and_then(Value::as_u64) else {
                return Response::error("Invalid user id");
            };

            match users.remove(id).await {
                Some(user) => {
                    info!("🗑️ 删除用户: id={}, by={}", user.id, operator);
                    Response::data(json!({ "id": user.id, "deletedBy": operator }))
                }
                None => Response::error("User not found"),
            }
        }
    });

    let users = store;
    registry.register_async("listUsers", move |_args: Vec<Value>| {
        let users = users.clone();
        async move { serde_json::to_value(users.list().await).map(Response::data) }
    });

    registry.register("ping", |_args: Vec<Value>| {
        info!("🏓 ping");
    });

    registry
}
