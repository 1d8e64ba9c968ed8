use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;
use crate::utils::{error_codes, error_to_api_response};

/// 处理请求时可能出现的错误，统一转换成 JSON 响应
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("权限不足")]
    Forbidden,

    #[error("resource not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded, retry in {}s", retry_after_secs(.0))]
    RateLimited(Duration),

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal server error: {0}")]
    Internal(String),
}

/// Retry-After 以整秒表示，向上取整
fn retry_after_secs(retry_after: &Duration) -> u64 {
    retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED),
            AppError::Forbidden => (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED),
            AppError::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
            AppError::Conflict(_) => (StatusCode::CONFLICT, error_codes::CONFLICT),
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, error_codes::RATE_LIMIT),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
            AppError::Cache(e) => match e {
                CacheError::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
                CacheError::InvalidKey(_) => {
                    (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
                }
                CacheError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
            },
            AppError::Store(e) => match e {
                StoreError::NotFound => (StatusCode::NOT_FOUND, error_codes::NOT_FOUND),
                StoreError::DuplicateEmail | StoreError::DuplicateUsername => {
                    (StatusCode::BAD_REQUEST, error_codes::USER_EXISTS)
                }
                StoreError::AlreadyFollowing | StoreError::NotFollowing | StoreError::Conflict => {
                    (StatusCode::CONFLICT, error_codes::CONFLICT)
                }
                StoreError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, error_codes::TIMEOUT),
                StoreError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
                }
            },
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // 服务端错误的细节只写日志，不返回给客户端
        let message = if status.is_server_error() && status != StatusCode::GATEWAY_TIMEOUT {
            tracing::error!(error = %self, "request failed");
            "内部服务器错误".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, error_to_api_response::<()>(code, message)).into_response();

        if let AppError::RateLimited(retry_after) = &self {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after_secs(retry_after)),
            );
        }

        response
    }
}
