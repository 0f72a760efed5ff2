//! # 错误处理测试

use crate::error::{
    ConflictReason, Context, ErrorCategory, RbacError, TokenError, UnauthorizedReason,
};
use axum::http::StatusCode;
use std::error::Error;

#[test]
fn test_config_error_creation() {
    let err = RbacError::config("测试配置错误");
    assert!(matches!(err, RbacError::Config { .. }));
    assert_eq!(err.to_string(), "配置错误: 测试配置错误");
}

#[test]
fn test_config_error_with_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "文件不存在");
    let err = RbacError::config_with_source("配置文件加载失败", io_err);

    assert!(err.to_string().contains("配置文件加载失败"));
    assert!(err.source().is_some());
}

#[test]
fn test_status_mapping_follows_taxonomy() {
    let cases = [
        (RbacError::Conflict(ConflictReason::EmailExists), StatusCode::CONFLICT),
        (
            RbacError::Unauthorized(UnauthorizedReason::InvalidCredentials),
            StatusCode::UNAUTHORIZED,
        ),
        (RbacError::forbidden("roles:update"), StatusCode::FORBIDDEN),
        (RbacError::not_found("role", 7), StatusCode::NOT_FOUND),
        (RbacError::database("连接断开"), StatusCode::INTERNAL_SERVER_ERROR),
        (RbacError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR),
        (
            RbacError::validation("email 不能为空", Some("email")),
            StatusCode::BAD_REQUEST,
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_http_response_parts().0, expected, "{err}");
    }
}

#[test]
fn test_token_error_conversion() {
    let err: RbacError = TokenError::Expired.into();
    assert!(matches!(
        err,
        RbacError::Unauthorized(UnauthorizedReason::AccessToken(TokenError::Expired))
    ));

    let err: RbacError = TokenError::InvalidRefreshToken.into();
    assert!(matches!(
        err,
        RbacError::Unauthorized(UnauthorizedReason::InvalidOrExpiredRefreshToken)
    ));
}

#[test]
fn test_context_keeps_root_category() {
    let result: Result<(), RbacError> = Err(RbacError::not_found("user", 42));
    let err = result.context("加载用户失败").unwrap_err();

    assert!(matches!(err, RbacError::Context { .. }));
    assert!(err.is_not_found());
    assert_eq!(err.category(), ErrorCategory::Client);
    assert!(err.to_string().starts_with("加载用户失败"));
}

#[test]
fn test_database_error_is_internal() {
    let err: RbacError = sea_orm::DbErr::Custom("timeout".to_string()).into();
    assert!(err.is_internal());
    assert_eq!(err.to_http_response_parts().1, "DATABASE_ERROR");
}

#[test]
fn test_validation_macro_sets_field() {
    let err = crate::validation_error!("email" => "email 不能为空");
    match err {
        RbacError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("email")),
        other => panic!("unexpected error: {other:?}"),
    }
}
