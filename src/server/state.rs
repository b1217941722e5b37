// 应用状态

use crate::config::{AppConfig, PathValidator};
use crate::filesystem::FilesystemService;
use anyhow::Context;
use std::sync::Arc;

/// 应用全局状态
///
/// 启动后只读，请求之间没有共享的可变状态
#[derive(Clone)]
pub struct AppState {
    /// 文件系统服务
    pub fs_service: Arc<FilesystemService>,
    /// 应用配置
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// 创建新的应用状态
    ///
    /// 准备根目录（不存在时创建）并构造文件系统服务
    pub fn new(mut config: AppConfig) -> anyhow::Result<Self> {
        config.storage.validate()?;
        config.storage.root_dir = PathValidator::prepare_root(&config.storage.root_dir)
            .context("浏览根目录不可用")?;

        let fs_service =
            FilesystemService::new(&config.storage).context("传输目录配置无效")?;
        PathValidator::ensure_directory_exists(fs_service.transfer_root())?;

        tracing::info!(
            "浏览根目录: {:?}, 上传/下载目录: {:?}",
            fs_service.root(),
            fs_service.transfer_root()
        );

        Ok(Self {
            fs_service: Arc::new(fs_service),
            config: Arc::new(config),
        })
    }
}
