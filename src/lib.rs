// File Browser Server Library
// 远程目录浏览、上传、下载服务核心库

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// 受限文件系统访问模块
pub mod filesystem;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use filesystem::{
    DirectoryEntry, DownloadFile, FilesystemService, FsError, FsErrorCode, PathGuard,
    ResolvedPath, UploadTarget,
};
pub use server::AppState;
