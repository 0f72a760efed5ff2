//! # Sea-ORM 存储
//!
//! 替换类操作（先删后插）在单个事务内完成；唯一约束冲突映射为 `Conflict`。

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait, sea_query::JoinType,
};
use std::collections::{BTreeSet, HashMap};

use super::{
    CatalogStore, MenuChanges, NewMenu, NewPermission, NewRefreshToken, NewRole, NewUser, Page,
    PageQuery, PermissionChanges, RefreshTokenStore, RoleAssignmentStore, RoleChanges,
    UserChanges, UserQuery, UserStore,
};
use crate::error::{ConflictReason, RbacError, Result};
use entity::{
    menus, permissions, refresh_tokens, role_menus, role_permissions, roles, user_roles, users,
};

/// 唯一约束冲突时转换为给定的冲突原因，其余错误按数据库错误处理
fn map_unique(err: DbErr, conflict: impl FnOnce(&str) -> ConflictReason) -> RbacError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => conflict(&detail).into(),
        _ => err.into(),
    }
}

fn user_conflict(detail: &str) -> ConflictReason {
    if detail.contains("username") {
        ConflictReason::UsernameExists
    } else {
        ConflictReason::EmailExists
    }
}

fn new_user_model(user: NewUser) -> users::ActiveModel {
    users::ActiveModel {
        email: Set(user.email),
        username: Set(user.username),
        password_hash: Set(user.password_hash),
        name: Set(user.name),
        created_at: Set(user.created_at),
        updated_at: Set(user.created_at),
        ..Default::default()
    }
}

fn new_refresh_token_model(token: NewRefreshToken) -> refresh_tokens::ActiveModel {
    refresh_tokens::ActiveModel {
        token: Set(token.token),
        user_id: Set(token.user_id),
        expires_at: Set(token.expires_at),
        created_at: Set(token.created_at),
        ..Default::default()
    }
}

fn dedup(ids: &[i32]) -> Vec<i32> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// 基于 Sea-ORM 的存储
#[derive(Debug, Clone)]
pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl UserStore for DatabaseStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        Ok(users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        Ok(users::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn create(&self, user: NewUser) -> Result<users::Model> {
        new_user_model(user)
            .insert(&self.db)
            .await
            .map_err(|e| map_unique(e, user_conflict))
    }

    async fn create_with_refresh_token(
        &self,
        user: NewUser,
        issue: &(dyn Fn(i32) -> Result<NewRefreshToken> + Send + Sync),
    ) -> Result<(users::Model, refresh_tokens::Model)> {
        let txn = self.db.begin().await?;
        let model = new_user_model(user)
            .insert(&txn)
            .await
            .map_err(|e| map_unique(e, user_conflict))?;

        let token = issue(model.id)?;
        if token.user_id != model.id {
            return Err(RbacError::internal("refresh token issued for another user"));
        }
        let token = new_refresh_token_model(token).insert(&txn).await?;

        txn.commit().await?;
        Ok((model, token))
    }

    async fn list_users(&self, query: UserQuery) -> Result<Page<users::Model>> {
        let paging = query.paging();
        let mut select = users::Entity::find();
        if let Some(email) = query.email_filter() {
            select = select.filter(users::Column::Email.contains(email));
        }
        if let Some(username) = query.username_filter() {
            select = select.filter(users::Column::Username.contains(username));
        }

        let paginator = select
            .order_by_desc(users::Column::CreatedAt)
            .order_by_desc(users::Column::Id)
            .paginate(&self.db, paging.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(paging.page - 1).await?;
        Ok(Page::new(items, total, paging))
    }

    async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        updated_at: NaiveDateTime,
    ) -> Result<users::Model> {
        let txn = self.db.begin().await?;
        let user = users::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| RbacError::not_found("user", id))?;

        let revoke = changes.password_hash.is_some();
        let mut active = user.into_active_model();
        if let Some(name) = changes.name {
            active.name = Set(Some(name));
        }
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(password_hash) = changes.password_hash {
            active.password_hash = Set(password_hash);
        }
        active.updated_at = Set(updated_at);

        let updated = active
            .update(&txn)
            .await
            .map_err(|e| map_unique(e, user_conflict))?;
        if revoke {
            refresh_tokens::Entity::delete_many()
                .filter(refresh_tokens::Column::UserId.eq(id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(updated)
    }
}

#[async_trait]
impl RefreshTokenStore for DatabaseStore {
    async fn create(&self, token: NewRefreshToken) -> Result<refresh_tokens::Model> {
        Ok(new_refresh_token_model(token).insert(&self.db).await?)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<refresh_tokens::Model>> {
        Ok(refresh_tokens::Entity::find()
            .filter(refresh_tokens::Column::Token.eq(token))
            .one(&self.db)
            .await?)
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::Token.eq(token))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(RbacError::not_found("refresh_token", "<redacted>"));
        }
        Ok(())
    }

    async fn delete_all_by_user(&self, user_id: i32) -> Result<u64> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_expired(&self, now: NaiveDateTime) -> Result<u64> {
        let result = refresh_tokens::Entity::delete_many()
            .filter(refresh_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}

#[async_trait]
impl RoleAssignmentStore for DatabaseStore {
    async fn get_roles_for_user(&self, user_id: i32) -> Result<Vec<roles::Model>> {
        Ok(roles::Entity::find()
            .join(JoinType::InnerJoin, roles::Relation::UserRoles.def())
            .filter(user_roles::Column::UserId.eq(user_id))
            .order_by_asc(roles::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn get_permissions_for_role(&self, role_id: i32) -> Result<Vec<permissions::Model>> {
        Ok(permissions::Entity::find()
            .join(
                JoinType::InnerJoin,
                permissions::Relation::RolePermissions.def(),
            )
            .filter(role_permissions::Column::RoleId.eq(role_id))
            .order_by_asc(permissions::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn get_menus_for_role(&self, role_id: i32) -> Result<Vec<menus::Model>> {
        Ok(menus::Entity::find()
            .join(JoinType::InnerJoin, menus::Relation::RoleMenus.def())
            .filter(role_menus::Column::RoleId.eq(role_id))
            .order_by_asc(menus::Column::SortOrder)
            .order_by_asc(menus::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn replace_user_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        let role_ids = dedup(role_ids);
        let txn = self.db.begin().await?;

        if users::Entity::find_by_id(user_id).one(&txn).await?.is_none() {
            return Err(RbacError::not_found("user", user_id));
        }
        let existing: BTreeSet<i32> = roles::Entity::find()
            .filter(roles::Column::Id.is_in(role_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect();
        if let Some(missing) = role_ids.iter().find(|id| !existing.contains(id)) {
            return Err(RbacError::not_found("role", missing));
        }

        user_roles::Entity::delete_many()
            .filter(user_roles::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        if !role_ids.is_empty() {
            user_roles::Entity::insert_many(role_ids.iter().map(|rid| user_roles::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(*rid),
            }))
            .exec_without_returning(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn replace_role_permissions(&self, role_id: i32, keys: &[String]) -> Result<()> {
        let txn = self.db.begin().await?;

        if roles::Entity::find_by_id(role_id).one(&txn).await?.is_none() {
            return Err(RbacError::not_found("role", role_id));
        }
        let permission_ids: Vec<i32> = permissions::Entity::find()
            .filter(permissions::Column::Key.is_in(keys.iter().cloned()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();

        role_permissions::Entity::delete_many()
            .filter(role_permissions::Column::RoleId.eq(role_id))
            .exec(&txn)
            .await?;
        if !permission_ids.is_empty() {
            role_permissions::Entity::insert_many(permission_ids.iter().map(|pid| {
                role_permissions::ActiveModel {
                    role_id: Set(role_id),
                    permission_id: Set(*pid),
                }
            }))
            .exec_without_returning(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn replace_role_menus(&self, role_id: i32, menu_ids: &[i32]) -> Result<()> {
        let menu_ids = dedup(menu_ids);
        let txn = self.db.begin().await?;

        if roles::Entity::find_by_id(role_id).one(&txn).await?.is_none() {
            return Err(RbacError::not_found("role", role_id));
        }
        let existing: BTreeSet<i32> = menus::Entity::find()
            .filter(menus::Column::Id.is_in(menu_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|m| m.id)
            .collect();
        if let Some(missing) = menu_ids.iter().find(|id| !existing.contains(id)) {
            return Err(RbacError::not_found("menu", missing));
        }

        role_menus::Entity::delete_many()
            .filter(role_menus::Column::RoleId.eq(role_id))
            .exec(&txn)
            .await?;
        if !menu_ids.is_empty() {
            role_menus::Entity::insert_many(menu_ids.iter().map(|mid| role_menus::ActiveModel {
                role_id: Set(role_id),
                menu_id: Set(*mid),
            }))
            .exec_without_returning(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for DatabaseStore {
    async fn create_role(&self, role: NewRole, now: NaiveDateTime) -> Result<roles::Model> {
        let code = role.code.clone();
        roles::ActiveModel {
            code: Set(role.code),
            name: Set(role.name),
            status: Set(role.status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| map_unique(e, |_| ConflictReason::RoleCodeExists(code)))
    }

    async fn list_roles(&self, query: PageQuery) -> Result<Page<roles::Model>> {
        let query = query.normalized();
        let paginator = roles::Entity::find()
            .order_by_desc(roles::Column::Id)
            .paginate(&self.db, query.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(query.page - 1).await?;
        Ok(Page::new(items, total, query))
    }

    async fn find_role(&self, id: i32) -> Result<Option<roles::Model>> {
        Ok(roles::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn update_role(
        &self,
        id: i32,
        changes: RoleChanges,
        now: NaiveDateTime,
    ) -> Result<roles::Model> {
        let role = roles::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RbacError::not_found("role", id))?;

        let mut active = role.into_active_model();
        let code = changes.code.clone().unwrap_or_default();
        if let Some(new_code) = changes.code {
            active.code = Set(new_code);
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        active.updated_at = Set(now);

        active
            .update(&self.db)
            .await
            .map_err(|e| map_unique(e, |_| ConflictReason::RoleCodeExists(code)))
    }

    async fn delete_role(&self, id: i32) -> Result<()> {
        let txn = self.db.begin().await?;
        user_roles::Entity::delete_many()
            .filter(user_roles::Column::RoleId.eq(id))
            .exec(&txn)
            .await?;
        role_permissions::Entity::delete_many()
            .filter(role_permissions::Column::RoleId.eq(id))
            .exec(&txn)
            .await?;
        role_menus::Entity::delete_many()
            .filter(role_menus::Column::RoleId.eq(id))
            .exec(&txn)
            .await?;
        let result = roles::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(RbacError::not_found("role", id));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
        now: NaiveDateTime,
    ) -> Result<permissions::Model> {
        let key = permission.key.clone();
        permissions::ActiveModel {
            key: Set(permission.key),
            description: Set(permission.description),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await
        .map_err(|e| map_unique(e, |_| ConflictReason::PermissionKeyExists(key)))
    }

    async fn list_permissions(&self, query: PageQuery) -> Result<Page<permissions::Model>> {
        let query = query.normalized();
        let paginator = permissions::Entity::find()
            .order_by_desc(permissions::Column::Id)
            .paginate(&self.db, query.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(query.page - 1).await?;
        Ok(Page::new(items, total, query))
    }

    async fn find_permission(&self, id: i32) -> Result<Option<permissions::Model>> {
        Ok(permissions::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn update_permission(
        &self,
        id: i32,
        changes: PermissionChanges,
    ) -> Result<permissions::Model> {
        let permission = permissions::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RbacError::not_found("permission", id))?;

        let mut active = permission.into_active_model();
        let key = changes.key.clone().unwrap_or_default();
        if let Some(new_key) = changes.key {
            active.key = Set(new_key);
        }
        if let Some(description) = changes.description {
            active.description = Set(Some(description));
        }
        active
            .update(&self.db)
            .await
            .map_err(|e| map_unique(e, |_| ConflictReason::PermissionKeyExists(key)))
    }

    async fn delete_permission(&self, id: i32) -> Result<()> {
        let txn = self.db.begin().await?;
        role_permissions::Entity::delete_many()
            .filter(role_permissions::Column::PermissionId.eq(id))
            .exec(&txn)
            .await?;
        let result = permissions::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(RbacError::not_found("permission", id));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn create_menu(&self, menu: NewMenu, now: NaiveDateTime) -> Result<menus::Model> {
        Ok(menus::ActiveModel {
            parent_id: Set(menu.parent_id),
            name: Set(menu.name),
            path: Set(menu.path),
            component: Set(menu.component),
            menu_type: Set(menu.menu_type),
            icon: Set(menu.icon),
            sort_order: Set(menu.sort_order),
            hidden: Set(menu.hidden),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.db)
        .await?)
    }

    async fn list_menus(&self) -> Result<Vec<menus::Model>> {
        Ok(menus::Entity::find()
            .order_by_asc(menus::Column::SortOrder)
            .order_by_asc(menus::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn find_menu(&self, id: i32) -> Result<Option<menus::Model>> {
        Ok(menus::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn update_menu(
        &self,
        id: i32,
        changes: MenuChanges,
        now: NaiveDateTime,
    ) -> Result<menus::Model> {
        let menu = menus::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or_else(|| RbacError::not_found("menu", id))?;

        let mut active = menu.into_active_model();
        if let Some(parent_id) = changes.parent_id {
            active.parent_id = Set(Some(parent_id));
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(path) = changes.path {
            active.path = Set(Some(path));
        }
        if let Some(component) = changes.component {
            active.component = Set(Some(component));
        }
        if let Some(menu_type) = changes.menu_type {
            active.menu_type = Set(menu_type);
        }
        if let Some(icon) = changes.icon {
            active.icon = Set(Some(icon));
        }
        if let Some(sort_order) = changes.sort_order {
            active.sort_order = Set(sort_order);
        }
        if let Some(hidden) = changes.hidden {
            active.hidden = Set(hidden);
        }
        active.updated_at = Set(now);

        Ok(active.update(&self.db).await?)
    }

    async fn delete_menu(&self, id: i32) -> Result<()> {
        let txn = self.db.begin().await?;
        role_menus::Entity::delete_many()
            .filter(role_menus::Column::MenuId.eq(id))
            .exec(&txn)
            .await?;
        let result = menus::Entity::delete_by_id(id).exec(&txn).await?;
        if result.rows_affected == 0 {
            return Err(RbacError::not_found("menu", id));
        }
        txn.commit().await?;
        Ok(())
    }

    async fn list_menus_for_roles(&self, role_ids: &[i32]) -> Result<Vec<menus::Model>> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(menus::Entity::find()
            .join(JoinType::InnerJoin, menus::Relation::RoleMenus.def())
            .filter(role_menus::Column::RoleId.is_in(dedup(role_ids)))
            .distinct()
            .order_by_asc(menus::Column::SortOrder)
            .order_by_asc(menus::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn role_codes_by_menu(&self) -> Result<HashMap<i32, Vec<String>>> {
        let rows = role_menus::Entity::find()
            .find_also_related(roles::Entity)
            .order_by_asc(role_menus::Column::RoleId)
            .all(&self.db)
            .await?;

        let mut map: HashMap<i32, Vec<String>> = HashMap::new();
        for (link, role) in rows {
            if let Some(role) = role {
                map.entry(link.menu_id).or_default().push(role.code);
            }
        }
        Ok(map)
    }
}
