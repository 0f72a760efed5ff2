//! 应用上下文（DI 容器）
//!
//! 统一持有跨模块共享的服务实例，便于在测试中注入替身实现。
//! 权限缓存由上下文显式构造并持有，不存在进程级全局缓存。

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::auth::{
    AuthorizationGate, Clock, PasswordHasher, PermissionCache, SessionManager, SystemClock,
    TokenCodec, UserService,
};
use crate::config::AppConfig;
use crate::database::{init_database, run_migrations};
use crate::error::Result;
use crate::linfo;
use crate::logging::{LogComponent, LogStage};
use crate::rbac::RbacService;
use crate::store::{
    CatalogStore, DatabaseStore, MemoryStore, RefreshTokenStore, RoleAssignmentStore, UserStore,
};

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub clock: Arc<dyn Clock>,
    pub sessions: Arc<SessionManager>,
    pub users: Arc<UserService>,
    pub cache: Arc<PermissionCache>,
    pub gate: AuthorizationGate,
    pub rbac: Arc<RbacService>,
    pub db: Option<Arc<DatabaseConnection>>,
}

impl AppContext {
    /// 以同一个存储实现装配全部服务
    pub fn with_stores<S>(config: AppConfig, store: Arc<S>, clock: Arc<dyn Clock>) -> Result<Self>
    where
        S: UserStore + RefreshTokenStore + RoleAssignmentStore + CatalogStore + 'static,
    {
        let codec = Arc::new(TokenCodec::new(&config.auth, clock.clone())?);
        let hasher = PasswordHasher::new(config.auth.bcrypt_cost);

        let users: Arc<dyn UserStore> = store.clone();
        let refresh_tokens: Arc<dyn RefreshTokenStore> = store.clone();
        let assignments: Arc<dyn RoleAssignmentStore> = store.clone();
        let catalog: Arc<dyn CatalogStore> = store;

        let cache = Arc::new(PermissionCache::new(assignments.clone()));
        let gate = AuthorizationGate::new(cache.clone());
        let sessions = Arc::new(SessionManager::new(
            users.clone(),
            refresh_tokens,
            codec,
            hasher,
            clock.clone(),
        ));
        let user_directory = Arc::new(UserService::new(users, hasher, clock.clone()));
        let rbac = Arc::new(RbacService::new(
            assignments,
            catalog,
            cache.clone(),
            clock.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            clock,
            sessions,
            users: user_directory,
            cache,
            gate,
            rbac,
            db: None,
        })
    }

    /// 连接数据库、执行迁移并装配服务
    pub async fn from_database(config: AppConfig) -> Result<Self> {
        let db = init_database(&config.database).await?;
        run_migrations(&db).await?;

        let store = Arc::new(DatabaseStore::new(db.clone()));
        let mut context = Self::with_stores(config, store, Arc::new(SystemClock))?;
        context.db = Some(Arc::new(db));

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "context_ready",
            "应用上下文初始化完成"
        );
        Ok(context)
    }

    /// 基于内存存储装配，供测试和本地调试使用
    pub fn in_memory(config: AppConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_stores(config, Arc::new(MemoryStore::new()), clock)
    }

    /// 关闭时丢弃全部缓存的权限集
    pub fn shutdown(&self) {
        self.cache.invalidate_all();
        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::Main,
            "context_shutdown",
            "权限缓存已清空"
        );
    }
}
