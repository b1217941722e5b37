// 文件系统模块数据类型定义

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

// 重新导出配置模块中的 StorageConfig
pub use crate::config::StorageConfig;

/// 文件系统错误码
/// 错误码范围：50001 - 50099
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsErrorCode {
    /// 路径穿越攻击
    PathTraversal = 50001,
    /// 路径格式无效
    InvalidPath = 50002,
    /// 文件或目录不存在
    NotFound = 50003,
    /// 不是目录
    NotADirectory = 50004,
    /// 是目录（期望文件）
    IsADirectory = 50005,
    /// 权限不足
    PermissionDenied = 50006,
    /// 写入失败
    WriteFailed = 50007,
    /// 读取失败
    ReadFailed = 50008,
    /// 上传内容超过上限
    PayloadTooLarge = 50009,
}

impl FsErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// 机器可识别的错误类型名
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathTraversal => "path_traversal",
            Self::InvalidPath => "invalid_path",
            Self::NotFound => "not_found",
            Self::NotADirectory => "not_a_directory",
            Self::IsADirectory => "is_a_directory",
            Self::PermissionDenied => "permission_denied",
            Self::WriteFailed => "write_failed",
            Self::ReadFailed => "read_failed",
            Self::PayloadTooLarge => "payload_too_large",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::PathTraversal => "Path escapes the browsable root",
            Self::InvalidPath => "Invalid path",
            Self::NotFound => "File not found",
            Self::NotADirectory => "Path is not a directory",
            Self::IsADirectory => "Path is a directory",
            Self::PermissionDenied => "Permission denied",
            Self::WriteFailed => "Failed to write file",
            Self::ReadFailed => "Failed to read directory",
            Self::PayloadTooLarge => "Uploaded file is too large",
        }
    }
}

/// 文件系统错误
#[derive(Debug)]
pub struct FsError {
    pub code: FsErrorCode,
    pub message: String,
    pub path: Option<String>,
}

impl FsError {
    pub fn new(code: FsErrorCode) -> Self {
        Self {
            message: code.message().to_string(),
            code,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 根据 IO 错误类型归类
    ///
    /// 不存在、权限不足有独立错误码，其余归入 `fallback`
    pub fn from_io(err: &io::Error, fallback: FsErrorCode, path: &str) -> Self {
        let code = match err.kind() {
            io::ErrorKind::NotFound => FsErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => FsErrorCode::PermissionDenied,
            _ => fallback,
        };
        let error = Self::new(code).with_path(path);
        if code == fallback {
            let message = format!("{}: {}", code.message(), err);
            error.with_message(message)
        } else {
            error
        }
    }
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref path) = self.path {
            write!(f, "{}: {}", self.message, path)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for FsError {}

/// 目录条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// 文件名
    pub name: String,
    /// 是否为目录（按条目自身类型判断，不跟随符号链接）
    #[serde(rename = "isDirectory")]
    pub is_directory: bool,
}

/// 上传结果（已保存文件的描述）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// 客户端提交的原始文件名
    pub original_name: String,
    /// 实际保存的文件名（带日期前缀）
    pub file_name: String,
    /// 目标目录（相对路径）
    pub directory: String,
    /// 保存文件的相对路径，可直接用于下载
    pub path: String,
    /// 文件大小（字节）
    pub size: u64,
    /// 按扩展名推断的内容类型
    pub mime_type: String,
}

/// 待下载文件
#[derive(Debug)]
pub struct DownloadFile {
    /// 已打开的文件句柄
    pub file: tokio::fs::File,
    /// 文件名（最后一段）
    pub name: String,
    /// 文件大小
    pub size: u64,
    /// 内容类型
    pub content_type: &'static str,
}

/// 按扩展名推断内容类型
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.to_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        // 图片
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        // 视频
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        // 音频
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        // 文档
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "txt" | "log" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        // 压缩包
        "zip" => "application/zip",
        "rar" => "application/vnd.rar",
        "7z" => "application/x-7z-compressed",
        "tar" => "application/x-tar",
        "gz" => "application/gzip",
        // Web
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}
