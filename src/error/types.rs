//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

use super::ErrorCategory;
use super::auth::{ConflictReason, TokenError, UnauthorizedReason};

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum RbacError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 请求参数校验错误
    #[error("参数验证失败: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// 唯一性冲突（注册、更新资料、创建角色/权限）
    #[error("资源冲突: {0}")]
    Conflict(ConflictReason),

    /// 认证失败：凭据错误、令牌无效/过期/已撤销、旧密码错误
    #[error("认证失败: {0}")]
    Unauthorized(UnauthorizedReason),

    /// 已认证但缺少所需权限
    #[error("权限不足: 需要 {required}")]
    Forbidden { required: String },

    /// 引用的实体不存在
    #[error("资源未找到: {resource_type} {identifier}")]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附带上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<RbacError>,
    },
}

impl RbacError {
    /// 去掉上下文包装后的原始错误
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self.root() {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "RESOURCE_CONFLICT"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            Self::Database { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            Self::Internal { .. } | Self::Context { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// 错误归类（客户端 / 服务端）
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        if self.to_http_response_parts().0.is_server_error() {
            ErrorCategory::Server
        } else {
            ErrorCategory::Client
        }
    }

    /// 是否为无法判定结果的内部错误（存储不可达、编解码失败等）
    #[must_use]
    pub fn is_internal(&self) -> bool {
        self.category() == ErrorCategory::Server
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建参数校验错误
    pub fn validation<T: Into<String>>(message: T, field: Option<&str>) -> Self {
        Self::Validation {
            message: message.into(),
            field: field.map(ToString::to_string),
        }
    }

    /// 创建未认证错误
    #[must_use]
    pub const fn unauthorized(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized(reason)
    }

    /// 创建权限不足错误
    pub fn forbidden<T: Into<String>>(required: T) -> Self {
        Self::Forbidden {
            required: required.into(),
        }
    }

    /// 创建资源未找到错误
    pub fn not_found<T: Into<String>, I: ToString>(resource_type: T, identifier: I) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.to_string(),
        }
    }

    /// 创建数据库错误
    pub fn database<T: Into<String>>(message: T) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的数据库错误
    pub fn database_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 是否为指定资源的未找到错误
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound { .. })
    }
}

impl From<ConflictReason> for RbacError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}

impl From<UnauthorizedReason> for RbacError {
    fn from(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized(reason)
    }
}

impl From<TokenError> for RbacError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidRefreshToken => {
                Self::Unauthorized(UnauthorizedReason::InvalidOrExpiredRefreshToken)
            }
            other => Self::Unauthorized(UnauthorizedReason::AccessToken(other)),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for RbacError {
    fn from(err: std::io::Error) -> Self {
        Self::internal_with_source("IO操作失败", err)
    }
}

impl From<toml::de::Error> for RbacError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}

impl From<serde_json::Error> for RbacError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal_with_source("JSON处理失败", err)
    }
}

impl From<sea_orm::error::DbErr> for RbacError {
    fn from(err: sea_orm::error::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

// Bcrypt错误转换
impl From<bcrypt::BcryptError> for RbacError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::internal_with_source("密码处理失败", err)
    }
}

// JWT签发错误转换（校验失败走 TokenError）
impl From<jsonwebtoken::errors::Error> for RbacError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::internal_with_source("JWT处理失败", err)
    }
}

impl From<tokio::task::JoinError> for RbacError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::internal_with_source("后台任务执行失败", err)
    }
}
