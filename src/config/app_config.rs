//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

use super::DatabaseConfig;
use crate::ensure_config;
use crate::error::Result;

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 管理 API 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,
    /// 认证配置
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// API 路由前缀
    pub api_prefix: String,
    /// 允许的跨域来源，`*` 表示任意
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 9090,
            api_prefix: "/api".to_string(),
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// 监听地址字符串
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// 认证配置：双令牌密钥、有效期与密码哈希代价
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// 访问令牌签名密钥
    pub access_secret: String,
    /// 刷新令牌签名密钥，必须与访问令牌密钥不同
    pub refresh_secret: String,
    /// 访问令牌有效期（秒）
    pub access_expires_in: i64,
    /// 刷新令牌有效期（秒）
    pub refresh_expires_in: i64,
    /// bcrypt 代价因子
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_expires_in: 900,
            refresh_expires_in: 604_800,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl AppConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        ensure_config!(self.server.port != 0, "无效的服务器端口: {}", self.server.port);
        ensure_config!(
            self.server.api_prefix.starts_with('/'),
            "API 前缀必须以 / 开头: {}",
            self.server.api_prefix
        );

        ensure_config!(!self.database.url.is_empty(), "数据库URL不能为空");
        ensure_config!(self.database.max_connections > 0, "数据库最大连接数必须大于0");

        ensure_config!(!self.auth.access_secret.is_empty(), "访问令牌密钥不能为空");
        ensure_config!(!self.auth.refresh_secret.is_empty(), "刷新令牌密钥不能为空");
        ensure_config!(
            self.auth.access_secret != self.auth.refresh_secret,
            "访问令牌与刷新令牌必须使用不同的密钥"
        );
        ensure_config!(self.auth.access_expires_in > 0, "访问令牌有效期必须大于0");
        ensure_config!(
            self.auth.refresh_expires_in > self.auth.access_expires_in,
            "刷新令牌有效期必须长于访问令牌有效期"
        );
        ensure_config!(
            (4..=31).contains(&self.auth.bcrypt_cost),
            "bcrypt 代价因子必须在 4..=31 之间: {}",
            self.auth.bcrypt_cost
        );

        Ok(())
    }
}
