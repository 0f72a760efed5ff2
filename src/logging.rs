//! # 日志配置模块
//!
//! 统一的结构化日志宏与订阅器初始化。每条日志携带 `request_id`、阶段、组件与操作名。

use std::env;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    Startup,
    Shutdown,
    Configuration,
    Authentication,
    Authorization,
    Cache,
    Db,
    RequestStart,
    Response,
    Internal,
    Error,
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    Main,
    ServerSetup,
    Config,
    Database,
    Auth,
    TokenCodec,
    Session,
    PermissionCache,
    Gate,
    Rbac,
    Users,
    MenuTree,
    Api,
}

/// 结构化 info 日志
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $op:expr, $msg:expr $(, $($fields:tt)*)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = ?$stage,
            component = ?$component,
            operation = $op,
            $($($fields)*,)?
            "{}",
            $msg
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $op:expr, $msg:expr $(, $($fields:tt)*)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = ?$stage,
            component = ?$component,
            operation = $op,
            $($($fields)*,)?
            "{}",
            $msg
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $op:expr, $msg:expr $(, $($fields:tt)*)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = ?$stage,
            component = ?$component,
            operation = $op,
            $($($fields)*,)?
            "{}",
            $msg
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $op:expr, $msg:expr $(, $($fields:tt)*)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = ?$stage,
            component = ?$component,
            operation = $op,
            $($($fields)*,)?
            "{}",
            $msg
        )
    };
}

/// 令牌脱敏：只保留首尾少量字符
#[must_use]
pub fn sanitize_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// 初始化日志系统
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    // 默认关闭 SQL 语句级别的详细日志
    let default_filter = format!("{level},api_rbac=debug,sqlx::query=off,sea_orm::query=warn,sqlx=warn");

    // 重复初始化（例如测试中）时忽略错误
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if env::var("RUST_LOG").is_ok_and(|v| v.contains("sqlx::query=info") || v.contains("sqlx::query=debug")) {
        tracing::info!("🔍 SQLx database query logging enabled");
    }
}
