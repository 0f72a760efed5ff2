//! # 管理服务器
//!
//! Axum HTTP服务器，提供认证与 RBAC 管理API

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::app::context::AppContext;
use crate::config::ServerConfig;
use crate::error::{RbacError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, linfo, lwarn};

/// 过期刷新令牌清理周期
const TOKEN_CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    #[must_use]
    pub const fn context_arc(&self) -> &Arc<AppContext> {
        &self.context
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: ServerConfig,
    state: AppState,
    router: Router,
}

impl ManagementServer {
    /// 创建新的管理服务器
    #[must_use]
    pub fn new(context: Arc<AppContext>) -> Self {
        let config = context.config.server.clone();
        let state = AppState::new(context);
        let router = create_router(state.clone(), &config);
        Self {
            config,
            state,
            router,
        }
    }

    /// 启动服务器，收到 Ctrl-C 后优雅退出
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.listen_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| RbacError::config_with_source(format!("无法监听地址 {addr}"), e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "server_start",
            format!("管理服务器启动于 {addr}")
        );

        let cleanup = spawn_token_cleanup(self.state.clone());

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        cleanup.abort();
        self.state.shutdown();

        served.map_err(|e| RbacError::internal_with_source("管理服务器异常退出", e))
    }
}

/// 组装完整路由：API 前缀、请求ID、追踪与 CORS
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = super::routes::create_routes(state);

    // axum 不允许嵌套在根路径
    let prefix = config.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api_routes
    } else {
        Router::new().nest(prefix, api_routes)
    };

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.cors_origins)),
    )
    .layer(axum::middleware::from_fn(
        super::middleware::request_id_middleware,
    ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.iter().any(|origin| origin == "*") {
        return cors.allow_origin(Any);
    }

    match origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        Ok(origins) => cors.allow_origin(origins),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "cors_config_fail",
                format!("CORS 源配置无效: {e}，回退为允许任意来源")
            );
            cors.allow_origin(Any)
        }
    }
}

/// 周期性清理已过期的刷新令牌记录
fn spawn_token_cleanup(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = state.sessions.cleanup_expired_tokens().await {
                lerror!(
                    "system",
                    LogStage::Db,
                    LogComponent::Session,
                    "token_cleanup_fail",
                    format!("清理过期刷新令牌失败: {e}")
                );
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lerror!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_fail",
            format!("无法监听关闭信号: {e}")
        );
        return;
    }
    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_signal",
        "收到关闭信号，开始优雅退出"
    );
}
