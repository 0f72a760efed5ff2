//! # 授权闸门
//!
//! 请求期权限检查：身份缺失为未认证；存储故障以内部错误上抛，绝不当作拒绝。

use std::sync::Arc;

use crate::auth::permissions::PermissionCache;
use crate::auth::types::AuthenticatedUser;
use crate::error::{RbacError, Result, UnauthorizedReason};
use crate::{
    ldebug,
    logging::{LogComponent, LogStage},
};

/// 授权判定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// 基于权限缓存的授权闸门
#[derive(Clone)]
pub struct AuthorizationGate {
    cache: Arc<PermissionCache>,
}

impl AuthorizationGate {
    #[must_use]
    pub const fn new(cache: Arc<PermissionCache>) -> Self {
        Self { cache }
    }

    /// 判断调用者是否持有权限 key
    pub async fn check(
        &self,
        identity: Option<&AuthenticatedUser>,
        permission_key: &str,
    ) -> Result<Decision> {
        let user = identity.ok_or(RbacError::Unauthorized(
            UnauthorizedReason::MissingIdentity,
        ))?;

        let keys = self.cache.get(user.id).await?;
        let decision = if keys.contains(permission_key) {
            Decision::Allowed
        } else {
            Decision::Denied
        };

        ldebug!(
            "system",
            LogStage::Authorization,
            LogComponent::Gate,
            "permission_check",
            "权限检查完成",
            user_id = user.id,
            permission = permission_key,
            decision = ?decision
        );
        Ok(decision)
    }

    /// 要求调用者持有权限 key，否则返回 `Forbidden`
    pub async fn require(&self, identity: &AuthenticatedUser, permission_key: &str) -> Result<()> {
        match self.check(Some(identity), permission_key).await? {
            Decision::Allowed => Ok(()),
            Decision::Denied => Err(RbacError::forbidden(permission_key)),
        }
    }
}
