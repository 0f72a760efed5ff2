//! # API RBAC Library
//!
//! 双令牌会话管理、权限缓存、授权闸门与菜单树构建

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod management;
pub mod rbac;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{RbacError, Result};
