//! # 会话管理
//!
//! 注册、登录、刷新、登出、修改密码等会话生命周期操作。
//!
//! 刷新令牌不轮换：同一个刷新令牌在记录存在且未过期期间可重复换取访问令牌。
//! 吊销只通过删除存储记录实现，签名仍有效的令牌一旦记录被删除即永久失效。

use chrono::Duration;
use std::sync::Arc;

use crate::auth::clock::Clock;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::PasswordHasher;
use crate::auth::types::{
    AccessToken, AuthSession, AuthenticatedUser, BEARER, LoginRequest, ProfileUpdate, PublicUser,
    RegisterRequest, TokenPair,
};
use crate::error::{RbacError, Result, UnauthorizedReason};
use crate::logging::{LogComponent, LogStage, sanitize_token};
use crate::store::{NewRefreshToken, NewUser, RefreshTokenStore, UserChanges, UserStore};
use crate::{ensure_validation, linfo, lwarn};
use entity::users;

/// 会话管理器
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

fn invalid_refresh() -> RbacError {
    RbacError::Unauthorized(UnauthorizedReason::InvalidOrExpiredRefreshToken)
}

fn invalid_credentials() -> RbacError {
    RbacError::Unauthorized(UnauthorizedReason::InvalidCredentials)
}

impl SessionManager {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            codec,
            hasher,
            clock,
        }
    }

    /// 注册新用户并直接签发令牌；用户与刷新令牌记录同成同败
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession> {
        ensure_validation!(!request.email.is_empty(), "email" => "email 不能为空");
        ensure_validation!(!request.username.is_empty(), "username" => "username 不能为空");
        ensure_validation!(!request.password.is_empty(), "password" => "password 不能为空");

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(crate::error::ConflictReason::EmailExists.into());
        }
        if self.users.find_by_username(&request.username).await?.is_some() {
            return Err(crate::error::ConflictReason::UsernameExists.into());
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let (user, refresh_token) = self
            .users
            .create_with_refresh_token(
                NewUser {
                    email: request.email,
                    username: request.username,
                    password_hash,
                    name: request.name,
                    created_at: self.clock.now().naive_utc(),
                },
                &|user_id| self.refresh_record(user_id),
            )
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "user_registered",
            "用户注册成功",
            user_id = user.id
        );

        self.session_for(user, refresh_token.token)
    }

    /// 登录：先按邮箱查找，没有该邮箱的用户时再按用户名查找
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession> {
        let identifier = request.email_or_username.as_str();
        if identifier.is_empty() || request.password.is_empty() {
            return Err(invalid_credentials());
        }

        let user = match self.users.find_by_email(identifier).await? {
            Some(user) => Some(user),
            None => self.users.find_by_username(identifier).await?,
        };

        let Some(user) = user else {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "login_unknown_user",
                "登录失败：用户不存在"
            );
            return Err(invalid_credentials());
        };

        if !self
            .hasher
            .verify(&request.password, &user.password_hash)
            .await?
        {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "login_bad_password",
                "登录失败：密码错误",
                user_id = user.id
            );
            return Err(invalid_credentials());
        }

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "login_success",
            "登录成功",
            user_id = user.id
        );
        self.issue_session(user).await
    }

    /// 用刷新令牌换取新的访问令牌（刷新令牌不轮换）
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
        let claims = self
            .codec
            .verify_refresh(refresh_token)
            .map_err(|_| invalid_refresh())?;

        let record = self
            .refresh_tokens
            .find_by_token(refresh_token)
            .await?
            .ok_or_else(invalid_refresh)?;

        let now = self.clock.now().naive_utc();
        if !record.is_valid_at(now) || record.user_id != claims.id {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "refresh_rejected",
                "刷新令牌记录已过期或不匹配",
                token = sanitize_token(refresh_token)
            );
            return Err(invalid_refresh());
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .ok_or_else(invalid_refresh)?;

        Ok(AccessToken {
            access_token: self.codec.sign_access(&user)?,
            token_type: BEARER.to_string(),
            expires_in: self.codec.access_ttl(),
        })
    }

    /// 登出单个会话；记录不存在也视为成功
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        match self.refresh_tokens.delete_by_token(refresh_token).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// 登出用户的全部会话，返回删除的记录数
    pub async fn logout_all(&self, user_id: i32) -> Result<u64> {
        let revoked = self.refresh_tokens.delete_all_by_user(user_id).await?;
        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "logout_all",
            "已吊销用户全部刷新令牌",
            user_id = user_id,
            revoked = revoked
        );
        Ok(revoked)
    }

    /// 修改密码并吊销该用户的全部刷新令牌
    pub async fn change_password(
        &self,
        user_id: i32,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        ensure_validation!(!new_password.is_empty(), "newPassword" => "newPassword 不能为空");

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| RbacError::not_found("user", user_id))?;

        if !self.hasher.verify(old_password, &user.password_hash).await? {
            return Err(RbacError::Unauthorized(
                UnauthorizedReason::InvalidOldPassword,
            ));
        }

        let password_hash = self.hasher.hash(new_password).await?;
        self.users
            .update_credential_hash(user_id, &password_hash, self.clock.now().naive_utc())
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Session,
            "password_changed",
            "密码已修改，全部刷新令牌已吊销",
            user_id = user_id
        );
        Ok(())
    }

    /// 当前用户信息
    pub async fn current_user(&self, user_id: i32) -> Result<PublicUser> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| RbacError::not_found("user", user_id))
    }

    /// 更新资料；新邮箱不能被其他用户占用
    pub async fn update_profile(&self, user_id: i32, update: ProfileUpdate) -> Result<PublicUser> {
        if let Some(email) = update.email.as_deref() {
            ensure_validation!(!email.is_empty(), "email" => "email 不能为空");
            if let Some(existing) = self.users.find_by_email(email).await? {
                if existing.id != user_id {
                    return Err(crate::error::ConflictReason::EmailExists.into());
                }
            }
        }

        let user = self
            .users
            .update_user(
                user_id,
                UserChanges {
                    name: update.name,
                    email: update.email,
                    ..UserChanges::default()
                },
                self.clock.now().naive_utc(),
            )
            .await?;
        Ok(user.into())
    }

    /// 清理已过期的刷新令牌记录
    pub async fn cleanup_expired_tokens(&self) -> Result<u64> {
        let removed = self
            .refresh_tokens
            .delete_expired(self.clock.now().naive_utc())
            .await?;
        if removed > 0 {
            linfo!(
                "system",
                LogStage::Authentication,
                LogComponent::Session,
                "cleanup_expired_tokens",
                "已清理过期刷新令牌",
                removed = removed
            );
        }
        Ok(removed)
    }

    /// 校验访问令牌并返回调用者身份
    pub fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser> {
        self.codec
            .verify_access(access_token)
            .map(AuthenticatedUser::from)
            .map_err(|e| RbacError::Unauthorized(UnauthorizedReason::AccessToken(e)))
    }

    /// 签发刷新令牌并生成待存储的记录
    fn refresh_record(&self, user_id: i32) -> Result<NewRefreshToken> {
        let now = self.clock.now();
        Ok(NewRefreshToken {
            token: self.codec.sign_refresh(user_id)?,
            user_id,
            expires_at: (now + Duration::seconds(self.codec.refresh_ttl())).naive_utc(),
            created_at: now.naive_utc(),
        })
    }

    async fn issue_session(&self, user: users::Model) -> Result<AuthSession> {
        let record = self.refresh_record(user.id)?;
        let refresh_token = record.token.clone();
        self.refresh_tokens.create(record).await?;
        self.session_for(user, refresh_token)
    }

    fn session_for(&self, user: users::Model, refresh_token: String) -> Result<AuthSession> {
        let access_token = self.codec.sign_access(&user)?;
        Ok(AuthSession {
            user: user.into(),
            tokens: TokenPair {
                access_token,
                refresh_token,
                token_type: BEARER.to_string(),
                expires_in: self.codec.access_ttl(),
                refresh_expires_in: self.codec.refresh_ttl(),
            },
        })
    }
}
