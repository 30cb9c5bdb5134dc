/// 应用全局状态

use actionrpc_common::ActionRegistry;
use std::sync::Arc;

use crate::actions::{build_registry, UserStore};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 动作注册表
    pub registry: Arc<ActionRegistry>,
}

impl AppState {
    pub fn new(users: UserStore) -> Self {
        Self {
            registry: Arc::new(build_registry(users)),
        }
    }

    /// 获取动作注册表
    pub fn registry(&self) -> Arc<ActionRegistry> {
        self.registry.clone()
    }
}
