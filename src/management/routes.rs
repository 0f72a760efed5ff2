//! # 路由配置
//!
//! 定义所有API路由和路由组织

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};

use crate::management::handlers::{auth, health, menus, permissions, roles, users};
use crate::management::middleware;
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    // 需要访问令牌的路由
    let protected = Router::new()
        .merge(session_routes())
        .merge(user_routes())
        .merge(role_routes())
        .merge(permission_routes())
        .merge(menu_routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::auth));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(public_auth_routes())
        .merge(protected)
        .with_state(state)
}

/// 无需认证的认证路由
fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/logout", post(auth::logout))
}

/// 当前用户相关路由
fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/logout-all", post(auth::logout_all))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/permissions", get(auth::my_permissions))
        .route("/auth/menus", get(auth::my_routes))
}

/// 用户管理路由（不提供删除）
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", get(users::get_user).put(users::update_user))
}

/// 角色管理路由
fn role_routes() -> Router<AppState> {
    Router::new()
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        .route(
            "/roles/{id}/permissions",
            get(roles::get_role_permissions).post(roles::set_role_permissions),
        )
        .route(
            "/users/{id}/roles",
            get(roles::get_user_roles).post(roles::set_user_roles),
        )
        .route("/users/{id}/permissions", get(roles::get_user_permissions))
}

/// 权限管理路由
fn permission_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/permissions",
            get(permissions::list_permissions).post(permissions::create_permission),
        )
        .route(
            "/permissions/{id}",
            get(permissions::get_permission)
                .put(permissions::update_permission)
                .delete(permissions::delete_permission),
        )
}

/// 菜单管理路由
fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/menus", get(menus::list_menus).post(menus::create_menu))
        .route("/menus/tree", get(menus::menu_tree))
        .route("/menus/routes", get(auth::my_routes))
        .route(
            "/menus/{id}",
            get(menus::get_menu)
                .put(menus::update_menu)
                .delete(menus::delete_menu),
        )
        .route(
            "/roles/{id}/menus",
            get(menus::get_role_menus).post(menus::set_role_menus),
        )
}
