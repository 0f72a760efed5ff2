//! # 权限管理处理器

use axum::extract::{Extension, Json, Path, Query, State};
use axum::response::Response;
use std::sync::Arc;

use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;
use crate::store::{NewPermission, PageQuery, PermissionChanges};

pub async fn list_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Query(query): Query<PageQuery>,
) -> Result<Response> {
    state.gate.require(&auth.user, "permissions:list").await?;
    let page = state.rbac.list_permissions(query).await?;
    Ok(response::success(page))
}

pub async fn get_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "permissions:read").await?;
    let permission = state.rbac.get_permission(id).await?;
    Ok(response::success(permission))
}

pub async fn create_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(permission): Json<NewPermission>,
) -> Result<Response> {
    state.gate.require(&auth.user, "permissions:create").await?;
    let permission = state.rbac.create_permission(permission).await?;
    Ok(response::created(permission))
}

pub async fn update_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
    Json(changes): Json<PermissionChanges>,
) -> Result<Response> {
    state.gate.require(&auth.user, "permissions:update").await?;
    let permission = state.rbac.update_permission(id, changes).await?;
    Ok(response::success_with_message(permission, "权限已更新"))
}

pub async fn delete_permission(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "permissions:delete").await?;
    state.rbac.delete_permission(id).await?;
    Ok(response::success_without_data("权限已删除"))
}
