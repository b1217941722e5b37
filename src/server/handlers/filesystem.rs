// 文件浏览 API 处理器

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::filesystem::{DirectoryEntry, UploadTarget};
use crate::server::error::{ApiError, ApiResult};
use crate::server::state::AppState;

/// 列目录查询参数
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// 相对根目录的路径，缺省为根目录
    #[serde(default)]
    pub path: String,
}

/// 下载查询参数
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// 相对路径（包含文件名）
    pub filename: Option<String>,
}

/// 上传响应
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub file: UploadTarget,
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    service: String,
}

/// GET /
/// 存活检查
pub async fn liveness() -> &'static str {
    "file browser server"
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}

/// GET /files?path=docs/2024
/// 列出目录内容
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<DirectoryEntry>>> {
    let entries = state.fs_service.list_directory(&query.path).await?;
    Ok(Json(entries))
}

/// GET /files/download?filename=docs/05032024-report.pdf
/// 流式下载文件，客户端断开时流被丢弃，文件句柄随之释放
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Response> {
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Filename is required".to_string()))?;

    let download = state.fs_service.download_file(&filename).await?;
    info!("开始下载: {} ({} 字节)", filename, download.size);

    let headers = [
        (header::CONTENT_TYPE, download.content_type.to_string()),
        (header::CONTENT_LENGTH, download.size.to_string()),
        (header::CONTENT_DISPOSITION, content_disposition(&download.name)),
    ];
    let body = Body::from_stream(ReaderStream::new(download.file));

    Ok((headers, body).into_response())
}

/// POST /upload
/// multipart 字段：`file`（文件内容）、`path`（目标目录，可在 file 之前或之后）
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut directory = String::new();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("path") => directory = field.text().await?,
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::BadRequest("Uploaded file has no name".to_string()))?;
                let data = field.bytes().await?;
                upload = Some((file_name, data));
            }
            other => tracing::debug!("忽略未知的表单字段: {:?}", other),
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;

    let target = state
        .fs_service
        .upload_file(&directory, &file_name, &data)
        .await?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        file: target,
    }))
}

/// 构造 Content-Disposition，非 ASCII 文件名使用 RFC 5987 编码
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(name)
    )
}
