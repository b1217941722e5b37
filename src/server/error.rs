// API 错误类型
//
// 领域错误（FsError）与 HTTP 层错误统一在这里映射为状态码和 JSON 错误体

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::filesystem::{FsError, FsErrorCode};

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP 层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 文件系统错误
    #[error(transparent)]
    Fs(#[from] FsError),
    /// 请求参数缺失或无效
    #[error("{0}")]
    BadRequest(String),
    /// multipart 解析失败（含请求体超限）
    #[error("Invalid multipart request: {0}")]
    Multipart(#[from] MultipartError),
}

/// 错误响应
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
    code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// 文件系统错误码对应的 HTTP 状态码
pub fn status_for(code: FsErrorCode) -> StatusCode {
    match code {
        FsErrorCode::PathTraversal => StatusCode::BAD_REQUEST,
        FsErrorCode::InvalidPath => StatusCode::BAD_REQUEST,
        FsErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
        FsErrorCode::IsADirectory => StatusCode::BAD_REQUEST,
        FsErrorCode::NotFound => StatusCode::NOT_FOUND,
        FsErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
        FsErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        FsErrorCode::WriteFailed => StatusCode::INTERNAL_SERVER_ERROR,
        FsErrorCode::ReadFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::Fs(e) => (
                status_for(e.code),
                ErrorResponse {
                    error: e.message,
                    kind: e.code.kind(),
                    code: e.code.code(),
                    path: e.path,
                },
            ),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    kind: "bad_request",
                    code: 40000,
                    path: None,
                },
            ),
            ApiError::Multipart(e) => {
                let status = e.status();
                let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    FsErrorCode::PayloadTooLarge.kind()
                } else {
                    "invalid_multipart"
                };
                (
                    status,
                    ErrorResponse {
                        error: e.body_text(),
                        kind,
                        code: status.as_u16() as i32 * 100,
                        path: None,
                    },
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();

        if status.is_server_error() {
            tracing::error!("请求失败: {} ({})", body.error, status);
        } else {
            tracing::warn!("请求被拒绝: {} ({})", body.error, status);
        }

        (status, Json(body)).into_response()
    }
}
