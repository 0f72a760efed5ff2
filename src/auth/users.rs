//! # 用户目录管理
//!
//! 面向管理员的用户列表、查询、创建与更新。对外只返回 `PublicUser`，
//! 管理员重设密码与用户自行改密一样会吊销该用户的全部刷新令牌。

use std::sync::Arc;

use crate::auth::clock::Clock;
use crate::auth::password::PasswordHasher;
use crate::auth::types::{PublicUser, RegisterRequest, UserUpdate};
use crate::error::{ConflictReason, RbacError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::store::{NewUser, Page, UserChanges, UserQuery, UserStore};
use crate::{ensure_validation, linfo};

pub struct UserService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl UserService {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    /// 按创建时间倒序分页，支持邮箱/用户名子串过滤
    pub async fn list_users(&self, query: UserQuery) -> Result<Page<PublicUser>> {
        Ok(self.users.list_users(query).await?.map(PublicUser::from))
    }

    pub async fn get_user(&self, user_id: i32) -> Result<PublicUser> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| RbacError::not_found("user", user_id))
    }

    /// 创建用户，不签发令牌
    pub async fn create_user(&self, request: RegisterRequest) -> Result<PublicUser> {
        ensure_validation!(!request.email.is_empty(), "email" => "email 不能为空");
        ensure_validation!(!request.username.is_empty(), "username" => "username 不能为空");
        ensure_validation!(!request.password.is_empty(), "password" => "password 不能为空");

        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(ConflictReason::EmailExists.into());
        }
        if self.users.find_by_username(&request.username).await?.is_some() {
            return Err(ConflictReason::UsernameExists.into());
        }

        let password_hash = self.hasher.hash(&request.password).await?;
        let user = self
            .users
            .create(NewUser {
                email: request.email,
                username: request.username,
                password_hash,
                name: request.name,
                created_at: self.clock.now().naive_utc(),
            })
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Users,
            "user_created",
            "管理员创建用户",
            user_id = user.id
        );
        Ok(user.into())
    }

    /// 更新用户；邮箱/用户名不能被其他用户占用
    pub async fn update_user(&self, user_id: i32, update: UserUpdate) -> Result<PublicUser> {
        ensure_validation!(!update.is_empty(), "body" => "至少需要提供一个字段");
        if let Some(email) = update.email.as_deref() {
            ensure_validation!(!email.is_empty(), "email" => "email 不能为空");
            if let Some(existing) = self.users.find_by_email(email).await? {
                if existing.id != user_id {
                    return Err(ConflictReason::EmailExists.into());
                }
            }
        }
        if let Some(username) = update.username.as_deref() {
            ensure_validation!(!username.is_empty(), "username" => "username 不能为空");
            if let Some(existing) = self.users.find_by_username(username).await? {
                if existing.id != user_id {
                    return Err(ConflictReason::UsernameExists.into());
                }
            }
        }

        let password_hash = match update.password.as_deref() {
            Some(password) => {
                ensure_validation!(!password.is_empty(), "password" => "password 不能为空");
                Some(self.hasher.hash(password).await?)
            }
            None => None,
        };
        let credential_changed = password_hash.is_some();

        let user = self
            .users
            .update_user(
                user_id,
                UserChanges {
                    name: update.name,
                    email: update.email,
                    username: update.username,
                    password_hash,
                },
                self.clock.now().naive_utc(),
            )
            .await?;

        linfo!(
            "system",
            LogStage::Authentication,
            LogComponent::Users,
            "user_updated",
            "管理员更新用户",
            user_id = user_id,
            credential_changed = credential_changed
        );
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::clock::SystemClock;
    use crate::store::{MemoryStore, NewRefreshToken, RefreshTokenStore};
    use chrono::{Duration, Utc};

    fn service() -> (UserService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = UserService::new(store.clone(), PasswordHasher::new(4), Arc::new(SystemClock));
        (service, store)
    }

    fn request(email: &str, username: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: "s3cret".to_string(),
            name: None,
        }
    }

    #[tokio::test]
    async fn test_create_user_hides_hash_and_checks_conflicts() {
        let (service, store) = service();
        let alice = service
            .create_user(request("alice@example.com", "alice"))
            .await
            .unwrap();
        let json = serde_json::to_value(&alice).unwrap();
        assert!(json.get("passwordHash").is_none());

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "s3cret");

        let err = service
            .create_user(request("alice@example.com", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Conflict(ConflictReason::EmailExists)));

        let err = service
            .create_user(request("other@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Conflict(ConflictReason::UsernameExists)));
    }

    #[tokio::test]
    async fn test_update_user_rules() {
        let (service, store) = service();
        let alice = service
            .create_user(request("alice@example.com", "alice"))
            .await
            .unwrap();
        service
            .create_user(request("bob@example.com", "bob"))
            .await
            .unwrap();

        let err = service
            .update_user(alice.id, UserUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_http_response_parts().0, axum::http::StatusCode::BAD_REQUEST);

        let err = service
            .update_user(
                alice.id,
                UserUpdate {
                    username: Some("bob".to_string()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Conflict(ConflictReason::UsernameExists)));

        let same = service
            .update_user(
                alice.id,
                UserUpdate {
                    email: Some("alice@example.com".to_string()),
                    name: Some("Alice".to_string()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name.as_deref(), Some("Alice"));

        assert!(
            service
                .update_user(
                    9999,
                    UserUpdate {
                        name: Some("ghost".to_string()),
                        ..UserUpdate::default()
                    },
                )
                .await
                .unwrap_err()
                .is_not_found()
        );

        let now = Utc::now().naive_utc();
        RefreshTokenStore::create(
            store.as_ref(),
            NewRefreshToken {
                token: "alice-session".to_string(),
                user_id: alice.id,
                expires_at: now + Duration::days(1),
                created_at: now,
            },
        )
        .await
        .unwrap();

        service
            .update_user(
                alice.id,
                UserUpdate {
                    password: Some("rotated".to_string()),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert!(bcrypt::verify("rotated", &stored.password_hash).unwrap());
        assert!(store.find_by_token("alice-session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users_pages_public_view() {
        let (service, _) = service();
        for n in 0..3 {
            service
                .create_user(request(&format!("u{n}@example.com"), &format!("user{n}")))
                .await
                .unwrap();
        }

        let page = service
            .list_users(UserQuery {
                limit: 2,
                username: Some("user".to_string()),
                ..UserQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.items[0].username, "user2");
    }
}
