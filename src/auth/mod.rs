//! # 认证模块
//!
//! 双令牌会话管理、用户目录、权限缓存与授权闸门

pub mod clock;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod session;
pub mod types;
pub mod users;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{AuthorizationGate, Decision};
pub use jwt::TokenCodec;
pub use password::PasswordHasher;
pub use permissions::{PermissionCache, PermissionSet};
pub use session::SessionManager;
pub use types::{
    AccessClaims, AccessToken, AuthSession, AuthenticatedUser, LoginRequest, ProfileUpdate,
    PublicUser, RefreshClaims, RegisterRequest, TokenPair, UserUpdate,
};
pub use users::UserService;
