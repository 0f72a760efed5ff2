//! # API 响应结构
//!
//! 定义了标准的 JSON API 响应格式，包括成功与失败响应。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RbacError;
use crate::lerror;
use crate::logging::{LogComponent, LogStage};

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// # API响应枚举
///
/// 统一所有API出口，方便转换为 `axum::response::Response`
#[derive(Debug)]
pub enum ApiResponse<T: Serialize> {
    Success(T),
    SuccessWithMessage(T, String),
    Created(T),
    SuccessWithoutData(String),
    AppError(RbacError),
}

fn envelope<T: Serialize>(status: StatusCode, data: Option<T>, message: String) -> Response {
    (
        status,
        Json(SuccessResponse {
            success: true,
            data,
            message: Some(message),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Success(data) => envelope(StatusCode::OK, Some(data), "操作成功".to_string()),
            Self::SuccessWithMessage(data, message) => {
                envelope(StatusCode::OK, Some(data), message)
            }
            Self::Created(data) => envelope(StatusCode::CREATED, Some(data), "创建成功".to_string()),
            Self::SuccessWithoutData(message) => envelope::<()>(StatusCode::OK, None, message),
            Self::AppError(error) => error.into_response(),
        }
    }
}

impl IntoResponse for RbacError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();

        // 服务端错误只记录日志，不向调用方暴露内部细节
        let message = if self.is_internal() {
            lerror!(
                "system",
                LogStage::Error,
                LogComponent::Api,
                "internal_error",
                format!("请求处理失败: {self:?}"),
                code = code
            );
            "服务器内部错误".to_string()
        } else {
            self.to_string()
        };

        let error_response = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message,
            },
            timestamp: Utc::now(),
        };
        (status, Json(error_response)).into_response()
    }
}

/// # 便捷函数：成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    ApiResponse::Success(data).into_response()
}

/// # 便捷函数：带消息的成功响应
pub fn success_with_message<T: Serialize>(data: T, message: &str) -> Response {
    ApiResponse::SuccessWithMessage(data, message.to_string()).into_response()
}

/// # 便捷函数：创建成功（201）
pub fn created<T: Serialize>(data: T) -> Response {
    ApiResponse::Created(data).into_response()
}

/// # 便捷函数：无数据体的成功响应
pub fn success_without_data(message: &str) -> Response {
    ApiResponse::<()>::SuccessWithoutData(message.to_string()).into_response()
}

/// # 便捷函数：应用错误响应
pub fn app_error(error: RbacError) -> Response {
    ApiResponse::<()>::AppError(error).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnauthorizedReason;

    #[test]
    fn created_uses_201() {
        let response = created(serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn errors_map_to_status() {
        let response = app_error(RbacError::unauthorized(UnauthorizedReason::MissingIdentity));
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app_error(RbacError::forbidden("roles:create"));
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app_error(RbacError::internal("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
