// 路由构建

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// multipart 边界、字段头等额外开销预留
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// 构建完整应用路由
pub fn build_router(state: AppState) -> Router {
    let body_limit = usize::try_from(
        state
            .fs_service
            .max_upload_size()
            .saturating_add(MULTIPART_OVERHEAD),
    )
    .unwrap_or(usize::MAX);

    // 配置中间件层
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(cors_layer(&state.config.server.cors_origins));

    Router::new()
        .route("/", get(handlers::liveness))
        .route("/health", get(handlers::health_check))
        .route("/files", get(handlers::list_files))
        .route("/files/download", get(handlers::download_file))
        .route("/upload", post(handlers::upload_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(middleware)
}

/// CORS 配置：未配置或包含 `*` 时允许所有来源
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("忽略无效的 CORS 来源: {}", origin);
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-FILE-BROWSER-BOUNDARY";

    fn test_app() -> (TempDir, Router) {
        test_app_with(|_| {})
    }

    fn test_app_with(adjust: impl FnOnce(&mut AppConfig)) -> (TempDir, Router) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.root_dir = temp_dir.path().to_path_buf();
        adjust(&mut config);
        let state = AppState::new(config).unwrap();
        (temp_dir, build_router(state))
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    /// 按顺序拼接 multipart 表单，`(字段名, 文件名, 内容)`
    fn multipart_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_liveness() {
        let (_temp_dir, app) = test_app();

        let response = app.oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"file browser server");
    }

    #[tokio::test]
    async fn test_list_files() {
        let (temp_dir, app) = test_app();
        std::fs::write(temp_dir.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir_all(temp_dir.path().join("sub/inner")).unwrap();

        let response = app.clone().oneshot(get("/files")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!([
                { "name": "a.txt", "isDirectory": false },
                { "name": "sub", "isDirectory": true },
            ])
        );

        let response = app.oneshot(get("/files?path=sub")).await.unwrap();
        assert_eq!(
            body_json(response).await,
            serde_json::json!([{ "name": "inner", "isDirectory": true }])
        );
    }

    #[tokio::test]
    async fn test_list_error_statuses() {
        let (_temp_dir, app) = test_app();

        let response = app
            .clone()
            .oneshot(get("/files?path=../../etc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["kind"], "path_traversal");

        let response = app.oneshot(get("/files?path=missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_download_requires_filename() {
        let (_temp_dir, app) = test_app();

        let response = app.clone().oneshot(get("/files/download")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/files/download?filename=")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_not_found() {
        let (_temp_dir, app) = test_app();

        let response = app
            .oneshot(get("/files/download?filename=nope.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_streams_file_with_headers() {
        let (temp_dir, app) = test_app();
        std::fs::create_dir(temp_dir.path().join("docs")).unwrap();
        std::fs::write(temp_dir.path().join("docs/report.pdf"), b"%PDF-1.4 data").unwrap();

        let response = app
            .oneshot(get("/files/download?filename=docs/report.pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "13");
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"report.pdf\""));
        assert_eq!(body_bytes(response).await, b"%PDF-1.4 data");
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let (temp_dir, app) = test_app();
        let content = b"quarterly numbers";

        // path 字段在 file 之后，与浏览器表单的提交顺序一致
        let request = multipart_request(&[
            ("file", Some("report.pdf"), content),
            ("path", None, b"docs"),
        ]);
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        // 日期前缀由处理函数决定，只校验格式
        let stored_name = body["file"]["fileName"].as_str().unwrap().to_string();
        assert_eq!(body["message"], "File uploaded successfully");
        assert!(stored_name.ends_with("-report.pdf"), "name: {stored_name}");
        assert_eq!(stored_name.len(), "DDMMYYYY-report.pdf".len());
        assert!(stored_name[..8].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(body["file"]["originalName"], "report.pdf");
        assert_eq!(body["file"]["size"], content.len());
        assert!(temp_dir.path().join("docs").join(&stored_name).is_file());

        let stored_path = body["file"]["path"].as_str().unwrap().to_string();
        let response = app
            .oneshot(get(&format!("/files/download?filename={}", stored_path)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, content);
    }

    #[tokio::test]
    async fn test_upload_rejects_path_in_file_name() {
        let (temp_dir, app) = test_app();

        let request = multipart_request(&[
            ("path", None, b""),
            ("file", Some("../evil.sh"), b"#!/bin/sh"),
        ]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], "invalid_path");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_file_part() {
        let (_temp_dir, app) = test_app();

        let request = multipart_request(&[("path", None, b"docs")]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_upload_too_large() {
        let (temp_dir, app) = test_app_with(|c| c.storage.max_upload_size = 8);

        let request = multipart_request(&[("file", Some("big.bin"), b"0123456789")]);
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_cors_layer_accepts_origin_lists() {
        // 仅验证构造不会 panic
        let _ = cors_layer(&[]);
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:3000".to_string(), "bad\norigin".to_string()]);
    }
}
