//! # 健康检查处理器

use axum::extract::State;
use axum::response::Response;
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::management::response;
use crate::management::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub cached_users: usize,
}

/// 健康检查：数据库可达性与缓存规模
pub async fn health_check(State(state): State<AppState>) -> Response {
    let database = match &state.db {
        Some(db) => match db.execute_unprepared("SELECT 1").await {
            Ok(_) => "up",
            Err(_) => "down",
        },
        None => "memory",
    };

    response::success(HealthStatus {
        status: if database == "down" { "degraded" } else { "ok" },
        database,
        cached_users: state.cache.len(),
    })
}
