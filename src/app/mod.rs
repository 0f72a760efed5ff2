//! # 应用装配
//!
//! 负责组装存储、会话、缓存与 RBAC 服务

pub mod context;

pub use context::AppContext;
