//! # 存储契约
//!
//! 核心逻辑通过这些 trait 访问持久化层。`memory` 为进程内实现（嵌入与测试），
//! `database` 为 Sea-ORM 实现。所有时间戳均为 UTC 的 `NaiveDateTime`。

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use entity::{menus, permissions, refresh_tokens, roles, users};

pub mod database;
pub mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

/// 新用户
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: NaiveDateTime,
}

/// 用户变更（`None` 表示不修改）
///
/// `password_hash` 非空即视为更换凭据，存储实现须在同一事务内吊销该用户的全部刷新令牌。
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

/// 用户列表查询：分页 + 邮箱/用户名子串过滤
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    #[serde(default = "PageQuery::default_page")]
    pub page: u64,
    #[serde(default = "PageQuery::default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl UserQuery {
    /// 归一化后的分页参数
    #[must_use]
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
        .normalized()
    }

    /// 空白过滤条件视为未提供
    fn filter(value: Option<&String>) -> Option<&str> {
        value.map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn email_filter(&self) -> Option<&str> {
        Self::filter(self.email.as_ref())
    }

    #[must_use]
    pub fn username_filter(&self) -> Option<&str> {
        Self::filter(self.username.as_ref())
    }
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            page: PageQuery::default_page(),
            limit: PageQuery::default_limit(),
            email: None,
            username: None,
        }
    }
}

/// 新刷新令牌记录
#[derive(Debug, Clone)]
pub struct NewRefreshToken {
    pub token: String,
    pub user_id: i32,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// 新角色
#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub code: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub status: bool,
}

/// 角色变更
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<bool>,
}

/// 新权限
#[derive(Debug, Clone, Deserialize)]
pub struct NewPermission {
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 权限变更
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionChanges {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// 新菜单
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMenu {
    #[serde(default)]
    pub parent_id: Option<i32>,
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(rename = "type")]
    pub menu_type: i32,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, rename = "order")]
    pub sort_order: i32,
    #[serde(default)]
    pub hidden: bool,
}

/// 菜单变更
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuChanges {
    #[serde(default)]
    pub parent_id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default, rename = "type")]
    pub menu_type: Option<i32>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default, rename = "order")]
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

const fn default_true() -> bool {
    true
}

/// 分页参数，页码从 1 开始
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "PageQuery::default_page")]
    pub page: u64,
    #[serde(default = "PageQuery::default_limit")]
    pub limit: u64,
}

impl PageQuery {
    const fn default_page() -> u64 {
        1
    }

    const fn default_limit() -> u64 {
        10
    }

    /// 归一化：页码与每页条数至少为 1
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, 100),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: Self::default_page(),
            limit: Self::default_limit(),
        }
    }
}

/// 分页信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

/// 一页数据
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub pagination: Pagination,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, query: PageQuery) -> Self {
        Self {
            items,
            total,
            pagination: Pagination {
                page: query.page,
                limit: query.limit,
                total,
                total_pages: total.div_ceil(query.limit.max(1)),
            },
        }
    }

    /// 转换条目类型，分页信息不变
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            pagination: self.pagination,
        }
    }
}

/// 用户存储
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>>;

    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>>;

    /// 邮箱/用户名唯一冲突返回 `Conflict`
    async fn create(&self, user: NewUser) -> Result<users::Model>;

    /// 插入用户及其首个刷新令牌记录，二者同成同败
    ///
    /// `issue` 以新用户 id 生成令牌记录；它返回错误或令牌写入失败时用户不会落库。
    async fn create_with_refresh_token(
        &self,
        user: NewUser,
        issue: &(dyn Fn(i32) -> Result<NewRefreshToken> + Send + Sync),
    ) -> Result<(users::Model, refresh_tokens::Model)>;

    /// 按创建时间倒序分页
    async fn list_users(&self, query: UserQuery) -> Result<Page<users::Model>>;

    /// 用户不存在返回 `NotFound`；邮箱/用户名与其他用户冲突返回 `Conflict`。
    /// 更换凭据时一并删除该用户的全部刷新令牌，任一步失败则整体不生效。
    async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        updated_at: NaiveDateTime,
    ) -> Result<users::Model>;

    /// 替换凭据哈希并吊销该用户的全部刷新令牌；用户不存在返回 `NotFound`
    async fn update_credential_hash(
        &self,
        id: i32,
        password_hash: &str,
        updated_at: NaiveDateTime,
    ) -> Result<()> {
        let changes = UserChanges {
            password_hash: Some(password_hash.to_string()),
            ..UserChanges::default()
        };
        self.update_user(id, changes, updated_at).await.map(|_| ())
    }
}

/// 刷新令牌存储
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(&self, token: NewRefreshToken) -> Result<refresh_tokens::Model>;

    async fn find_by_token(&self, token: &str) -> Result<Option<refresh_tokens::Model>>;

    /// 记录不存在返回 `NotFound`
    async fn delete_by_token(&self, token: &str) -> Result<()>;

    async fn delete_all_by_user(&self, user_id: i32) -> Result<u64>;

    /// 删除 `expires_at < now` 的记录
    async fn delete_expired(&self, now: NaiveDateTime) -> Result<u64>;
}

/// 用户-角色-权限/菜单分配存储
#[async_trait]
pub trait RoleAssignmentStore: Send + Sync {
    async fn get_roles_for_user(&self, user_id: i32) -> Result<Vec<roles::Model>>;

    async fn get_permissions_for_role(&self, role_id: i32) -> Result<Vec<permissions::Model>>;

    async fn get_menus_for_role(&self, role_id: i32) -> Result<Vec<menus::Model>>;

    /// 整体替换；用户或任一角色不存在时返回 `NotFound` 且不做修改
    async fn replace_user_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()>;

    /// 整体替换；不存在的权限 key 被忽略，角色不存在返回 `NotFound`
    async fn replace_role_permissions(&self, role_id: i32, keys: &[String]) -> Result<()>;

    /// 整体替换；角色或任一菜单不存在时返回 `NotFound` 且不做修改
    async fn replace_role_menus(&self, role_id: i32, menu_ids: &[i32]) -> Result<()>;
}

/// 角色、权限、菜单目录存储
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_role(&self, role: NewRole, now: NaiveDateTime) -> Result<roles::Model>;

    /// 按 id 倒序分页
    async fn list_roles(&self, query: PageQuery) -> Result<Page<roles::Model>>;

    async fn find_role(&self, id: i32) -> Result<Option<roles::Model>>;

    async fn update_role(
        &self,
        id: i32,
        changes: RoleChanges,
        now: NaiveDateTime,
    ) -> Result<roles::Model>;

    async fn delete_role(&self, id: i32) -> Result<()>;

    async fn create_permission(
        &self,
        permission: NewPermission,
        now: NaiveDateTime,
    ) -> Result<permissions::Model>;

    /// 按 id 倒序分页
    async fn list_permissions(&self, query: PageQuery) -> Result<Page<permissions::Model>>;

    async fn find_permission(&self, id: i32) -> Result<Option<permissions::Model>>;

    async fn update_permission(
        &self,
        id: i32,
        changes: PermissionChanges,
    ) -> Result<permissions::Model>;

    async fn delete_permission(&self, id: i32) -> Result<()>;

    async fn create_menu(&self, menu: NewMenu, now: NaiveDateTime) -> Result<menus::Model>;

    /// 按 `sort_order` 升序
    async fn list_menus(&self) -> Result<Vec<menus::Model>>;

    async fn find_menu(&self, id: i32) -> Result<Option<menus::Model>>;

    async fn update_menu(
        &self,
        id: i32,
        changes: MenuChanges,
        now: NaiveDateTime,
    ) -> Result<menus::Model>;

    async fn delete_menu(&self, id: i32) -> Result<()>;

    /// 任一角色可见的菜单（去重，按 `sort_order` 升序）
    async fn list_menus_for_roles(&self, role_ids: &[i32]) -> Result<Vec<menus::Model>>;

    /// 菜单 id → 可见该菜单的角色编码
    async fn role_codes_by_menu(&self) -> Result<HashMap<i32, Vec<String>>>;
}
