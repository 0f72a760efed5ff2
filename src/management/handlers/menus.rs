//! # 菜单管理处理器
//!
//! 菜单 CRUD、菜单树与角色菜单分配

use axum::extract::{Extension, Json, Path, State};
use axum::response::Response;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::management::middleware::AuthContext;
use crate::management::response;
use crate::management::server::AppState;
use crate::store::{MenuChanges, NewMenu};

/// 角色菜单分配请求体
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMenusRequest {
    pub menu_ids: Vec<i32>,
}

pub async fn list_menus(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:list").await?;
    let menus = state.rbac.list_menus().await?;
    Ok(response::success(menus))
}

/// 全部菜单的路由树（附带可见角色）
pub async fn menu_tree(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:list").await?;
    let tree = state.rbac.menu_tree().await?;
    Ok(response::success(tree))
}

pub async fn get_menu(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:read").await?;
    let menu = state.rbac.get_menu(id).await?;
    Ok(response::success(menu))
}

pub async fn create_menu(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Json(menu): Json<NewMenu>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:create").await?;
    let menu = state.rbac.create_menu(menu).await?;
    Ok(response::created(menu))
}

pub async fn update_menu(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
    Json(changes): Json<MenuChanges>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:update").await?;
    let menu = state.rbac.update_menu(id, changes).await?;
    Ok(response::success_with_message(menu, "菜单已更新"))
}

pub async fn delete_menu(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:delete").await?;
    state.rbac.delete_menu(id).await?;
    Ok(response::success_without_data("菜单已删除"))
}

pub async fn get_role_menus(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(role_id): Path<i32>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:read").await?;
    let menus = state.rbac.role_menus(role_id).await?;
    Ok(response::success(menus))
}

pub async fn set_role_menus(
    State(state): State<AppState>,
    Extension(auth): Extension<Arc<AuthContext>>,
    Path(role_id): Path<i32>,
    Json(request): Json<SetMenusRequest>,
) -> Result<Response> {
    state.gate.require(&auth.user, "menus:update").await?;
    let menus = state.rbac.set_role_menus(role_id, &request.menu_ids).await?;
    Ok(response::success_with_message(menus, "角色菜单已更新"))
}
