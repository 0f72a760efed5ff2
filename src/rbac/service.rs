//! # RBAC 服务
//!
//! 分配变更在存储替换成功后同步失效权限缓存：
//! 用户角色变更只影响该用户，角色的权限/菜单变更影响该角色的全部成员。

use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::clock::Clock;
use crate::auth::permissions::PermissionCache;
use crate::error::{RbacError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::rbac::menu_tree::{MenuNode, RouteNode, build_route_tree, build_tree};
use crate::store::{
    CatalogStore, MenuChanges, NewMenu, NewPermission, NewRole, Page, PageQuery,
    PermissionChanges, RoleAssignmentStore, RoleChanges,
};
use crate::{ensure_validation, linfo};
use entity::{menus, permissions, roles};

/// 角色、权限、菜单的分配与目录管理
pub struct RbacService {
    assignments: Arc<dyn RoleAssignmentStore>,
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<PermissionCache>,
    clock: Arc<dyn Clock>,
}

impl RbacService {
    #[must_use]
    pub fn new(
        assignments: Arc<dyn RoleAssignmentStore>,
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<PermissionCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            assignments,
            catalog,
            cache,
            clock,
        }
    }

    async fn require_role(&self, role_id: i32) -> Result<roles::Model> {
        self.catalog
            .find_role(role_id)
            .await?
            .ok_or_else(|| RbacError::not_found("role", role_id))
    }

    // ---- 分配 ----

    /// 整体替换用户的角色
    pub async fn set_user_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<Vec<roles::Model>> {
        self.assignments.replace_user_roles(user_id, role_ids).await?;
        self.cache.invalidate(user_id);

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Rbac,
            "set_user_roles",
            "用户角色已更新",
            user_id = user_id,
            role_count = role_ids.len()
        );
        self.assignments.get_roles_for_user(user_id).await
    }

    /// 整体替换角色的权限；不存在的 key 被忽略
    pub async fn set_role_permissions(
        &self,
        role_id: i32,
        keys: &[String],
    ) -> Result<Vec<permissions::Model>> {
        self.assignments
            .replace_role_permissions(role_id, keys)
            .await?;
        self.cache.invalidate_role(role_id);

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Rbac,
            "set_role_permissions",
            "角色权限已更新",
            role_id = role_id,
            key_count = keys.len()
        );
        self.assignments.get_permissions_for_role(role_id).await
    }

    /// 整体替换角色可见的菜单
    pub async fn set_role_menus(&self, role_id: i32, menu_ids: &[i32]) -> Result<Vec<menus::Model>> {
        self.assignments.replace_role_menus(role_id, menu_ids).await?;
        self.cache.invalidate_role(role_id);

        linfo!(
            "system",
            LogStage::Authorization,
            LogComponent::Rbac,
            "set_role_menus",
            "角色菜单已更新",
            role_id = role_id,
            menu_count = menu_ids.len()
        );
        self.assignments.get_menus_for_role(role_id).await
    }

    pub async fn user_roles(&self, user_id: i32) -> Result<Vec<roles::Model>> {
        self.assignments.get_roles_for_user(user_id).await
    }

    pub async fn role_permissions(&self, role_id: i32) -> Result<Vec<permissions::Model>> {
        self.require_role(role_id).await?;
        self.assignments.get_permissions_for_role(role_id).await
    }

    pub async fn role_menus(&self, role_id: i32) -> Result<Vec<menus::Model>> {
        self.require_role(role_id).await?;
        self.assignments.get_menus_for_role(role_id).await
    }

    /// 用户的有效权限 key（经缓存，排序后返回）
    pub async fn user_permissions(&self, user_id: i32) -> Result<Vec<String>> {
        let keys = self.cache.get(user_id).await?;
        let mut keys: Vec<String> = keys.iter().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    // ---- 角色 ----

    pub async fn create_role(&self, role: NewRole) -> Result<roles::Model> {
        ensure_validation!(!role.code.trim().is_empty(), "code" => "code 不能为空");
        ensure_validation!(!role.name.trim().is_empty(), "name" => "name 不能为空");
        self.catalog
            .create_role(role, self.clock.now().naive_utc())
            .await
    }

    pub async fn list_roles(&self, query: PageQuery) -> Result<Page<roles::Model>> {
        self.catalog.list_roles(query).await
    }

    pub async fn get_role(&self, role_id: i32) -> Result<roles::Model> {
        self.require_role(role_id).await
    }

    pub async fn update_role(&self, role_id: i32, changes: RoleChanges) -> Result<roles::Model> {
        if let Some(code) = changes.code.as_deref() {
            ensure_validation!(!code.trim().is_empty(), "code" => "code 不能为空");
        }
        self.catalog
            .update_role(role_id, changes, self.clock.now().naive_utc())
            .await
    }

    /// 删除角色并失效其成员的缓存
    pub async fn delete_role(&self, role_id: i32) -> Result<()> {
        self.catalog.delete_role(role_id).await?;
        self.cache.invalidate_role(role_id);
        Ok(())
    }

    // ---- 权限 ----

    pub async fn create_permission(&self, permission: NewPermission) -> Result<permissions::Model> {
        ensure_validation!(!permission.key.trim().is_empty(), "key" => "key 不能为空");
        self.catalog
            .create_permission(permission, self.clock.now().naive_utc())
            .await
    }

    pub async fn list_permissions(&self, query: PageQuery) -> Result<Page<permissions::Model>> {
        self.catalog.list_permissions(query).await
    }

    pub async fn get_permission(&self, permission_id: i32) -> Result<permissions::Model> {
        self.catalog
            .find_permission(permission_id)
            .await?
            .ok_or_else(|| RbacError::not_found("permission", permission_id))
    }

    /// 更新权限；key 变更后缓存中的旧 key 全部作废
    pub async fn update_permission(
        &self,
        permission_id: i32,
        changes: PermissionChanges,
    ) -> Result<permissions::Model> {
        if let Some(key) = changes.key.as_deref() {
            ensure_validation!(!key.trim().is_empty(), "key" => "key 不能为空");
        }

        let renamed = changes.key.is_some();
        let permission = self.catalog.update_permission(permission_id, changes).await?;
        if renamed {
            self.cache.invalidate_all();
            linfo!(
                "system",
                LogStage::Authorization,
                LogComponent::Rbac,
                "rename_permission",
                "权限 key 已变更，权限缓存已清空",
                permission_id = permission_id,
                key = %permission.key
            );
        }
        Ok(permission)
    }

    /// 删除权限；持有者无法高效反查，清空整个缓存
    pub async fn delete_permission(&self, permission_id: i32) -> Result<()> {
        self.catalog.delete_permission(permission_id).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    // ---- 菜单 ----

    pub async fn create_menu(&self, menu: NewMenu) -> Result<menus::Model> {
        ensure_validation!(!menu.name.trim().is_empty(), "name" => "name 不能为空");
        self.catalog
            .create_menu(menu, self.clock.now().naive_utc())
            .await
    }

    pub async fn list_menus(&self) -> Result<Vec<menus::Model>> {
        self.catalog.list_menus().await
    }

    pub async fn get_menu(&self, menu_id: i32) -> Result<menus::Model> {
        self.catalog
            .find_menu(menu_id)
            .await?
            .ok_or_else(|| RbacError::not_found("menu", menu_id))
    }

    pub async fn update_menu(&self, menu_id: i32, changes: MenuChanges) -> Result<menus::Model> {
        self.catalog
            .update_menu(menu_id, changes, self.clock.now().naive_utc())
            .await
    }

    pub async fn delete_menu(&self, menu_id: i32) -> Result<()> {
        self.catalog.delete_menu(menu_id).await
    }

    /// 全部菜单的结构树
    pub async fn menu_forest(&self) -> Result<Vec<MenuNode>> {
        Ok(build_tree(&self.catalog.list_menus().await?))
    }

    /// 全部菜单的路由树，标注可见角色
    pub async fn menu_tree(&self) -> Result<Vec<RouteNode>> {
        let menus = self.catalog.list_menus().await?;
        let role_codes = self.catalog.role_codes_by_menu().await?;
        Ok(build_route_tree(&menus, Some(&role_codes)))
    }

    /// 用户经其角色可见的路由树
    pub async fn user_route_tree(&self, user_id: i32) -> Result<Vec<RouteNode>> {
        let roles = self.assignments.get_roles_for_user(user_id).await?;
        let role_ids: Vec<i32> = roles.iter().map(|r| r.id).collect();
        let menus = self.catalog.list_menus_for_roles(&role_ids).await?;

        let all_codes = self.catalog.role_codes_by_menu().await?;
        let role_codes: HashMap<i32, Vec<String>> = menus
            .iter()
            .map(|m| (m.id, all_codes.get(&m.id).cloned().unwrap_or_default()))
            .collect();
        Ok(build_route_tree(&menus, Some(&role_codes)))
    }
}
