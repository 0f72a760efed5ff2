//! # 管理服务器中间件
//!
//! 请求ID与访问令牌认证

pub mod auth;
pub mod request_id;

pub use auth::{AuthContext, auth, extract_bearer_token};
pub use request_id::{RequestId, request_id_middleware};
