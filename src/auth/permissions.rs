//! # 权限缓存
//!
//! 按用户缓存其有效权限 key 集合（所有已分配角色的权限并集），并维护
//! `role_id → {user_id}` 反向索引，使角色级别的变更只驱逐受影响的用户。
//!
//! 加载与失效并发时：加载前读取失效纪元，写入后再次比对，纪元变化则丢弃刚写入的条目，
//! 因此不会留下过期数据。

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::store::RoleAssignmentStore;
use crate::{
    ldebug,
    logging::{LogComponent, LogStage},
};

/// 用户的有效权限集合
pub type PermissionSet = Arc<HashSet<String>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    keys: PermissionSet,
    role_ids: Vec<i32>,
}

/// 用户权限缓存
pub struct PermissionCache {
    store: Arc<dyn RoleAssignmentStore>,
    entries: DashMap<i32, CacheEntry>,
    role_members: DashMap<i32, HashSet<i32>>,
    epoch: AtomicU64,
}

impl PermissionCache {
    #[must_use]
    pub fn new(store: Arc<dyn RoleAssignmentStore>) -> Self {
        Self {
            store,
            entries: DashMap::new(),
            role_members: DashMap::new(),
            epoch: AtomicU64::new(0),
        }
    }

    /// 获取用户权限集合，未命中时从存储加载
    pub async fn get(&self, user_id: i32) -> Result<PermissionSet> {
        if let Some(entry) = self.entries.get(&user_id) {
            return Ok(Arc::clone(&entry.keys));
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let roles = self.store.get_roles_for_user(user_id).await?;

        let mut keys = HashSet::new();
        for role in &roles {
            for permission in self.store.get_permissions_for_role(role.id).await? {
                keys.insert(permission.key);
            }
        }
        let keys: PermissionSet = Arc::new(keys);
        let role_ids: Vec<i32> = roles.iter().map(|r| r.id).collect();

        for role_id in &role_ids {
            self.role_members.entry(*role_id).or_default().insert(user_id);
        }
        self.entries.insert(
            user_id,
            CacheEntry {
                keys: Arc::clone(&keys),
                role_ids,
            },
        );

        if self.epoch.load(Ordering::SeqCst) != epoch {
            // 加载期间发生了失效，本次结果可能已过期
            self.evict(user_id);
        }

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::PermissionCache,
            "permissions_loaded",
            "用户权限已加载",
            user_id = user_id,
            permission_count = keys.len()
        );
        Ok(keys)
    }

    /// 驱逐单个用户；不存在时无操作
    pub fn invalidate(&self, user_id: i32) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.evict(user_id);
    }

    /// 驱逐持有该角色的所有已缓存用户
    pub fn invalidate_role(&self, role_id: i32) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let members = self
            .role_members
            .remove(&role_id)
            .map(|(_, members)| members)
            .unwrap_or_default();

        for user_id in &members {
            self.evict(*user_id);
        }

        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::PermissionCache,
            "role_invalidated",
            "角色成员权限缓存已失效",
            role_id = role_id,
            evicted = members.len()
        );
    }

    /// 清空全部缓存
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
        self.role_members.clear();
    }

    /// 已缓存的用户数
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 用户是否已缓存
    #[must_use]
    pub fn is_cached(&self, user_id: i32) -> bool {
        self.entries.contains_key(&user_id)
    }

    fn evict(&self, user_id: i32) {
        let Some((_, entry)) = self.entries.remove(&user_id) else {
            return;
        };
        for role_id in entry.role_ids {
            if let Some(mut members) = self.role_members.get_mut(&role_id) {
                members.remove(&user_id);
            }
            self.role_members
                .remove_if(&role_id, |_, members| members.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CatalogStore, MemoryStore, NewPermission, NewRole, NewUser, UserStore};
    use async_trait::async_trait;
    use chrono::Utc;
    use entity::{menus, permissions, roles};
    use tokio::sync::Notify;

    /// 读取角色权限时停住，直到测试放行
    struct PausingStore {
        inner: Arc<MemoryStore>,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl RoleAssignmentStore for PausingStore {
        async fn get_roles_for_user(&self, user_id: i32) -> Result<Vec<roles::Model>> {
            self.inner.get_roles_for_user(user_id).await
        }

        async fn get_permissions_for_role(&self, role_id: i32) -> Result<Vec<permissions::Model>> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.get_permissions_for_role(role_id).await
        }

        async fn get_menus_for_role(&self, role_id: i32) -> Result<Vec<menus::Model>> {
            self.inner.get_menus_for_role(role_id).await
        }

        async fn replace_user_roles(&self, user_id: i32, role_ids: &[i32]) -> Result<()> {
            self.inner.replace_user_roles(user_id, role_ids).await
        }

        async fn replace_role_permissions(&self, role_id: i32, keys: &[String]) -> Result<()> {
            self.inner.replace_role_permissions(role_id, keys).await
        }

        async fn replace_role_menus(&self, role_id: i32, menu_ids: &[i32]) -> Result<()> {
            self.inner.replace_role_menus(role_id, menu_ids).await
        }
    }

    async fn seeded() -> (Arc<MemoryStore>, i32, i32, i32) {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now().naive_utc();
        let alice = UserStore::create(
            store.as_ref(),
            NewUser {
                email: "alice@example.com".to_string(),
                username: "alice".to_string(),
                password_hash: "x".to_string(),
                name: None,
                created_at: now,
            },
        )
        .await
        .unwrap();
        let bob = UserStore::create(
            store.as_ref(),
            NewUser {
                email: "bob@example.com".to_string(),
                username: "bob".to_string(),
                password_hash: "x".to_string(),
                name: None,
                created_at: now,
            },
        )
        .await
        .unwrap();
        let role = store
            .create_role(
                NewRole {
                    code: "editor".to_string(),
                    name: "Editor".to_string(),
                    status: true,
                },
                now,
            )
            .await
            .unwrap();
        for key in ["posts:read", "posts:write"] {
            store
                .create_permission(
                    NewPermission {
                        key: key.to_string(),
                        description: None,
                    },
                    now,
                )
                .await
                .unwrap();
        }
        store
            .replace_role_permissions(role.id, &["posts:read".to_string()])
            .await
            .unwrap();
        store.replace_user_roles(alice.id, &[role.id]).await.unwrap();
        store.replace_user_roles(bob.id, &[role.id]).await.unwrap();
        (store, alice.id, bob.id, role.id)
    }

    #[tokio::test]
    async fn test_get_loads_union_and_caches() {
        let (store, alice, _, _) = seeded().await;
        let cache = PermissionCache::new(store);

        let keys = cache.get(alice).await.unwrap();
        assert!(keys.contains("posts:read"));
        assert!(!keys.contains("posts:write"));
        assert!(cache.is_cached(alice));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_cached_set_is_stale_until_invalidated() {
        let (store, alice, _, role) = seeded().await;
        let cache = PermissionCache::new(store.clone());
        cache.get(alice).await.unwrap();

        store
            .replace_role_permissions(role, &["posts:read".to_string(), "posts:write".to_string()])
            .await
            .unwrap();
        assert!(!cache.get(alice).await.unwrap().contains("posts:write"));

        cache.invalidate(alice);
        assert!(cache.get(alice).await.unwrap().contains("posts:write"));
    }

    #[tokio::test]
    async fn test_invalidate_role_evicts_members_only() {
        let (store, alice, bob, role) = seeded().await;
        let cache = PermissionCache::new(store);
        cache.get(alice).await.unwrap();
        cache.get(bob).await.unwrap();
        cache.get(999).await.unwrap();

        cache.invalidate_role(role);

        assert!(!cache.is_cached(alice));
        assert!(!cache.is_cached(bob));
        assert!(cache.is_cached(999));
    }

    #[tokio::test]
    async fn test_invalidate_absent_is_noop() {
        let (store, _, _, _) = seeded().await;
        let cache = PermissionCache::new(store);
        cache.invalidate(12345);
        cache.invalidate_role(12345);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_all_clears() {
        let (store, alice, bob, _) = seeded().await;
        let cache = PermissionCache::new(store);
        cache.get(alice).await.unwrap();
        cache.get(bob).await.unwrap();

        cache.invalidate_all();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidation_during_load_discards_result() {
        let (store, alice, _, role) = seeded().await;
        let pausing = Arc::new(PausingStore {
            inner: store.clone(),
            entered: Notify::new(),
            release: Notify::new(),
        });
        let cache = Arc::new(PermissionCache::new(pausing.clone()));

        let loader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.get(alice).await }
        });
        pausing.entered.notified().await;

        // 加载停在读取角色权限处，此时角色权限被改写并失效
        store
            .replace_role_permissions(role, &["posts:write".to_string()])
            .await
            .unwrap();
        cache.invalidate_role(role);
        pausing.release.notify_one();

        loader.await.unwrap().unwrap();
        assert!(!cache.is_cached(alice));

        pausing.release.notify_one();
        let keys = cache.get(alice).await.unwrap();
        assert!(keys.contains("posts:write"));
        assert!(!keys.contains("posts:read"));
        assert!(cache.is_cached(alice));
    }
}
