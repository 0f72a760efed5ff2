//! # 内存存储
//!
//! 单个异步读写锁保护全部状态，所有变更在写锁内一次完成，替换类操作天然原子。

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

use super::{
    CatalogStore, MenuChanges, NewMenu, NewPermission, NewRefreshToken, NewRole, NewUser, Page,
    PageQuery, PermissionChanges, RefreshTokenStore, RoleAssignmentStore, RoleChanges,
    UserChanges, UserQuery, UserStore,
};
use crate::error::{ConflictReason, RbacError, Result};
use entity::{menus, permissions, refresh_tokens, roles, users};

#[derive(Debug, Default)]
struct State {
    last_id: i32,
    users: BTreeMap<i32, users::Model>,
    refresh_tokens: BTreeMap<i32, refresh_tokens::Model>,
    roles: BTreeMap<i32, roles::Model>,
    permissions: BTreeMap<i32, permissions::Model>,
    menus: BTreeMap<i32, menus::Model>,
    user_roles: BTreeSet<(i32, i32)>,
    role_permissions: BTreeSet<(i32, i32)>,
    role_menus: BTreeSet<(i32, i32)>,
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn username_taken(&self, username: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    /// 校验唯一性并分配 id，不写入
    fn prepare_user(&mut self, user: NewUser) -> Result<users::Model> {
        if self.email_taken(&user.email, None) {
            return Err(ConflictReason::EmailExists.into());
        }
        if self.username_taken(&user.username, None) {
            return Err(ConflictReason::UsernameExists.into());
        }

        Ok(users::Model {
            id: self.next_id(),
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            name: user.name,
            created_at: user.created_at,
            updated_at: user.created_at,
        })
    }

    fn prepare_refresh_token(&mut self, token: NewRefreshToken) -> Result<refresh_tokens::Model> {
        if self.refresh_tokens.values().any(|t| t.token == token.token) {
            return Err(RbacError::internal("refresh token already stored"));
        }

        Ok(refresh_tokens::Model {
            id: self.next_id(),
            token: token.token,
            user_id: token.user_id,
            expires_at: token.expires_at,
            created_at: token.created_at,
        })
    }

    fn sorted_menus<'a>(menus: impl Iterator<Item = &'a menus::Model>) -> Vec<menus::Model> {
        let mut list: Vec<menus::Model> = menus.cloned().collect();
        list.sort_by_key(|m| (m.sort_order, m.id));
        list
    }

    fn page<T: Clone>(map: &BTreeMap<i32, T>, query: PageQuery) -> Page<T> {
        let query = query.normalized();
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let items = map.values().rev().skip(offset).take(limit).cloned().collect();
        Page::new(items, map.len() as u64, query)
    }
}

/// 进程内存储，实现全部存储契约
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<users::Model> {
        let mut state = self.state.write().await;
        let model = state.prepare_user(user)?;
        state.users.insert(model.id, model.clone());
        Ok(model)
    }

    async fn create_with_refresh_token(
        &self,
        user: NewUser,
        issue: &(dyn Fn(i32) -> Result<NewRefreshToken> + Send + Sync),
    ) -> Result<(users::Model, refresh_tokens::Model)> {
        let mut state = self.state.write().await;
        let model = state.prepare_user(user)?;
        let token = state.prepare_refresh_token(issue(model.id)?)?;
        if token.user_id != model.id {
            return Err(RbacError::internal("refresh token issued for another user"));
        }

        state.users.insert(model.id, model.clone());
        state.refresh_tokens.insert(token.id, token.clone());
        Ok((model, token))
    }

    async fn list_users(&self, query: UserQuery) -> Result<Page<users::Model>> {
        let state = self.state.read().await;
        let paging = query.paging();
        let mut matched: Vec<&users::Model> = state
            .users
            .values()
            .filter(|u| query.email_filter().is_none_or(|f| u.email.contains(f)))
            .filter(|u| query.username_filter().is_none_or(|f| u.username.contains(f)))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let offset = usize::try_from(paging.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(paging.limit).unwrap_or(usize::MAX);
        let items = matched
            .iter()
            .skip(offset)
            .take(limit)
            .map(|u| (*u).clone())
            .collect();
        Ok(Page::new(items, matched.len() as u64, paging))
    }

    async fn update_user(
        &self,
        id: i32,
        changes: UserChanges,
        updated_at: NaiveDateTime,
    ) -> Result<users::Model> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&id) {
            return Err(RbacError::not_found("user", id));
        }
        if let Some(email) = changes.email.as_deref() {
            if state.email_taken(email, Some(id)) {
                return Err(ConflictReason::EmailExists.into());
            }
        }
        if let Some(username) = changes.username.as_deref() {
            if state.username_taken(username, Some(id)) {
                return Err(ConflictReason::UsernameExists.into());
            }
        }

        if changes.password_hash.is_some() {
            state.refresh_tokens.retain(|_, t| t.user_id != id);
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| RbacError::not_found("user", id))?;
        if let Some(name) = changes.name {
            user.name = Some(name);
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = updated_at;
        Ok(user.clone())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn create(&self, token: NewRefreshToken) -> Result<refresh_tokens::Model> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&token.user_id) {
            return Err(RbacError::not_found("user", token.user_id));
        }

        let model = state.prepare_refresh_token(token)?;
        state.refresh_tokens.insert(model.id, model.clone());
        Ok(model)
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<refresh_tokens::Model>> {
        let state = self.state.read().await;
        Ok(state
            .refresh_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn delete_by_token(&self, token: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let id = state
            .refresh_tokens
            .values()
            .find(|t| t.token == token)
            .map(|t| t.id)
            .ok_or_else(|| RbacError::not_found("refresh_token", "<redacted>"))?;
        state.refresh_tokens.remove(&id);
        Ok(())
    }

    async fn delete_all_by_user(&self, user_id: i32) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.refresh_tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: NaiveDateTime) -> Result<u64> {
        let mut state = self.state.write().await;
        let before = state.refresh_tokens.len();
        state.refresh_tokens.retain(|_, t| t.expires_at >= now);
        Ok((before - state.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl RoleAssignmentStore for MemoryStore {
    async fn get_roles_for_user(&self, user_id: i32) -> Result<Vec<roles::Model>> {
        let state = self.state.read().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, rid)| state.roles.get(rid).cloned())
            .collect())
    }

    async fn get_permissions_for_role(&self, role_id: i32) -> Result<Vec<permissions::Model>> {
        let state = self.state.read().await;
        Ok(state
            .role_permissions
            .iter()
            .filter(|(rid, _)| *rid == role_id)
            .filter_map(|(_, pid)| state.permissions.get(pid).cloned())
            .collect())
    }

    async fn get_menus_for_role(&self, role_id: i32) -> Result<Vec<menus::Model>> {
        let state = self.state.read().await;
        Ok(State::sorted_menus(
            state
                .role_menus
                .iter()
                .filter(|(rid, _)| *rid == role_id)
                .filter_map(|(_, mid)| state.menus.get(mid)),
        ))
    }

    async fn replace_user_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(RbacError::not_found("user", user_id));
        }
        if let Some(missing) = role_ids.iter().find(|id| !state.roles.contains_key(id)) {
            return Err(RbacError::not_found("role", missing));
        }

        state.user_roles.retain(|(uid, _)| *uid != user_id);
        state
            .user_roles
            .extend(role_ids.iter().map(|rid| (user_id, *rid)));
        Ok(())
    }

    async fn replace_role_permissions(&self, role_id: i32, keys: &[String]) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::not_found("role", role_id));
        }

        let permission_ids: Vec<i32> = state
            .permissions
            .values()
            .filter(|p| keys.contains(&p.key))
            .map(|p| p.id)
            .collect();
        state.role_permissions.retain(|(rid, _)| *rid != role_id);
        state
            .role_permissions
            .extend(permission_ids.into_iter().map(|pid| (role_id, pid)));
        Ok(())
    }

    async fn replace_role_menus(&self, role_id: i32, menu_ids: &[i32]) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.roles.contains_key(&role_id) {
            return Err(RbacError::not_found("role", role_id));
        }
        if let Some(missing) = menu_ids.iter().find(|id| !state.menus.contains_key(id)) {
            return Err(RbacError::not_found("menu", missing));
        }

        state.role_menus.retain(|(rid, _)| *rid != role_id);
        state
            .role_menus
            .extend(menu_ids.iter().map(|mid| (role_id, *mid)));
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn create_role(&self, role: NewRole, now: NaiveDateTime) -> Result<roles::Model> {
        let mut state = self.state.write().await;
        if state.roles.values().any(|r| r.code == role.code) {
            return Err(ConflictReason::RoleCodeExists(role.code).into());
        }

        let id = state.next_id();
        let model = roles::Model {
            id,
            code: role.code,
            name: role.name,
            status: role.status,
            created_at: now,
            updated_at: now,
        };
        state.roles.insert(id, model.clone());
        Ok(model)
    }

    async fn list_roles(&self, query: PageQuery) -> Result<Page<roles::Model>> {
        Ok(State::page(&self.state.read().await.roles, query))
    }

    async fn find_role(&self, id: i32) -> Result<Option<roles::Model>> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn update_role(
        &self,
        id: i32,
        changes: RoleChanges,
        now: NaiveDateTime,
    ) -> Result<roles::Model> {
        let mut state = self.state.write().await;
        if let Some(code) = changes.code.as_deref() {
            if state.roles.values().any(|r| r.code == code && r.id != id) {
                return Err(ConflictReason::RoleCodeExists(code.to_string()).into());
            }
        }

        let role = state
            .roles
            .get_mut(&id)
            .ok_or_else(|| RbacError::not_found("role", id))?;
        if let Some(code) = changes.code {
            role.code = code;
        }
        if let Some(name) = changes.name {
            role.name = name;
        }
        if let Some(status) = changes.status {
            role.status = status;
        }
        role.updated_at = now;
        Ok(role.clone())
    }

    async fn delete_role(&self, id: i32) -> Result<()> {
        let mut state = self.state.write().await;
        if state.roles.remove(&id).is_none() {
            return Err(RbacError::not_found("role", id));
        }
        state.user_roles.retain(|(_, rid)| *rid != id);
        state.role_permissions.retain(|(rid, _)| *rid != id);
        state.role_menus.retain(|(rid, _)| *rid != id);
        Ok(())
    }

    async fn create_permission(
        &self,
        permission: NewPermission,
        now: NaiveDateTime,
    ) -> Result<permissions::Model> {
        let mut state = self.state.write().await;
        if state.permissions.values().any(|p| p.key == permission.key) {
            return Err(ConflictReason::PermissionKeyExists(permission.key).into());
        }

        let id = state.next_id();
        let model = permissions::Model {
            id,
            key: permission.key,
            description: permission.description,
            created_at: now,
        };
        state.permissions.insert(id, model.clone());
        Ok(model)
    }

    async fn list_permissions(&self, query: PageQuery) -> Result<Page<permissions::Model>> {
        Ok(State::page(&self.state.read().await.permissions, query))
    }

    async fn find_permission(&self, id: i32) -> Result<Option<permissions::Model>> {
        Ok(self.state.read().await.permissions.get(&id).cloned())
    }

    async fn update_permission(
        &self,
        id: i32,
        changes: PermissionChanges,
    ) -> Result<permissions::Model> {
        let mut state = self.state.write().await;
        if let Some(key) = changes.key.as_deref() {
            if state.permissions.values().any(|p| p.key == key && p.id != id) {
                return Err(ConflictReason::PermissionKeyExists(key.to_string()).into());
            }
        }

        let permission = state
            .permissions
            .get_mut(&id)
            .ok_or_else(|| RbacError::not_found("permission", id))?;
        if let Some(key) = changes.key {
            permission.key = key;
        }
        if let Some(description) = changes.description {
            permission.description = Some(description);
        }
        Ok(permission.clone())
    }

    async fn delete_permission(&self, id: i32) -> Result<()> {
        let mut state = self.state.write().await;
        if state.permissions.remove(&id).is_none() {
            return Err(RbacError::not_found("permission", id));
        }
        state.role_permissions.retain(|(_, pid)| *pid != id);
        Ok(())
    }

    async fn create_menu(&self, menu: NewMenu, now: NaiveDateTime) -> Result<menus::Model> {
        let mut state = self.state.write().await;
        let id = state.next_id();
        let model = menus::Model {
            id,
            parent_id: menu.parent_id,
            name: menu.name,
            path: menu.path,
            component: menu.component,
            menu_type: menu.menu_type,
            icon: menu.icon,
            sort_order: menu.sort_order,
            hidden: menu.hidden,
            created_at: now,
            updated_at: now,
        };
        state.menus.insert(id, model.clone());
        Ok(model)
    }

    async fn list_menus(&self) -> Result<Vec<menus::Model>> {
        Ok(State::sorted_menus(self.state.read().await.menus.values()))
    }

    async fn find_menu(&self, id: i32) -> Result<Option<menus::Model>> {
        Ok(self.state.read().await.menus.get(&id).cloned())
    }

    async fn update_menu(
        &self,
        id: i32,
        changes: MenuChanges,
        now: NaiveDateTime,
    ) -> Result<menus::Model> {
        let mut state = self.state.write().await;
        let menu = state
            .menus
            .get_mut(&id)
            .ok_or_else(|| RbacError::not_found("menu", id))?;
        if let Some(parent_id) = changes.parent_id {
            menu.parent_id = Some(parent_id);
        }
        if let Some(name) = changes.name {
            menu.name = name;
        }
        if let Some(path) = changes.path {
            menu.path = Some(path);
        }
        if let Some(component) = changes.component {
            menu.component = Some(component);
        }
        if let Some(menu_type) = changes.menu_type {
            menu.menu_type = menu_type;
        }
        if let Some(icon) = changes.icon {
            menu.icon = Some(icon);
        }
        if let Some(sort_order) = changes.sort_order {
            menu.sort_order = sort_order;
        }
        if let Some(hidden) = changes.hidden {
            menu.hidden = hidden;
        }
        menu.updated_at = now;
        Ok(menu.clone())
    }

    async fn delete_menu(&self, id: i32) -> Result<()> {
        let mut state = self.state.write().await;
        if state.menus.remove(&id).is_none() {
            return Err(RbacError::not_found("menu", id));
        }
        state.role_menus.retain(|(_, mid)| *mid != id);
        Ok(())
    }

    async fn list_menus_for_roles(&self, role_ids: &[i32]) -> Result<Vec<menus::Model>> {
        let state = self.state.read().await;
        let menu_ids: BTreeSet<i32> = state
            .role_menus
            .iter()
            .filter(|(rid, _)| role_ids.contains(rid))
            .map(|(_, mid)| *mid)
            .collect();
        Ok(State::sorted_menus(
            menu_ids.iter().filter_map(|mid| state.menus.get(mid)),
        ))
    }

    async fn role_codes_by_menu(&self) -> Result<HashMap<i32, Vec<String>>> {
        let state = self.state.read().await;
        let mut map: HashMap<i32, Vec<String>> = HashMap::new();
        for (rid, mid) in &state.role_menus {
            if let Some(role) = state.roles.get(rid) {
                map.entry(*mid).or_default().push(role.code.clone());
            }
        }
        Ok(map)
    }
}
