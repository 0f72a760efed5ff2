//! 集成测试共享工具

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use api_rbac::app::AppContext;
use api_rbac::auth::{AuthSession, ManualClock, RegisterRequest};
use api_rbac::config::{AppConfig, DatabaseConfig};
use api_rbac::database::{init_database, run_migrations};
use api_rbac::store::{DatabaseStore, NewPermission, NewRole};

/// 测试配置：独立密钥、最低 bcrypt 代价
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.auth.access_secret = "test-access-secret".to_string();
    config.auth.refresh_secret = "test-refresh-secret".to_string();
    config.auth.bcrypt_cost = 4;
    config.database = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    };
    config
}

pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

/// 基于内存存储的上下文
pub fn memory_context() -> (AppContext, Arc<ManualClock>) {
    let clock = test_clock();
    let ctx = AppContext::in_memory(test_config(), clock.clone()).unwrap();
    (ctx, clock)
}

/// 基于 `sqlite::memory:` 并执行全部迁移的上下文
pub async fn database_context() -> (AppContext, Arc<ManualClock>) {
    let config = test_config();
    let db = init_database(&config.database).await.unwrap();
    run_migrations(&db).await.unwrap();

    let clock = test_clock();
    let store = Arc::new(DatabaseStore::new(db));
    let ctx = AppContext::with_stores(config, store, clock.clone()).unwrap();
    (ctx, clock)
}

pub async fn register(ctx: &AppContext, email: &str, username: &str) -> AuthSession {
    ctx.sessions
        .register(RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: "secret-pass".to_string(),
            name: None,
        })
        .await
        .unwrap()
}

/// 创建持有给定权限的角色并分配给用户，返回角色ID
pub async fn grant(ctx: &AppContext, user_id: i32, role_code: &str, keys: &[&str]) -> i32 {
    for key in keys {
        // 已存在的 key 会冲突，忽略即可
        let _ = ctx
            .rbac
            .create_permission(NewPermission {
                key: (*key).to_string(),
                description: None,
            })
            .await;
    }
    let role = ctx
        .rbac
        .create_role(NewRole {
            code: role_code.to_string(),
            name: role_code.to_string(),
            status: true,
        })
        .await
        .unwrap();
    let keys: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
    ctx.rbac.set_role_permissions(role.id, &keys).await.unwrap();

    let mut role_ids: Vec<i32> = ctx
        .rbac
        .user_roles(user_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    role_ids.push(role.id);
    ctx.rbac.set_user_roles(user_id, &role_ids).await.unwrap();
    role.id
}
