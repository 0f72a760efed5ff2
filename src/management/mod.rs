//! # 管理 HTTP 接口
//!
//! 认证、角色、权限与菜单管理的 REST API

pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod server;

pub use server::{AppState, ManagementServer, create_router};
