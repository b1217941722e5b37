// 文件系统服务
//
// 提供目录列表、文件上传、文件下载三个核心操作

use std::io;

use chrono::{Local, NaiveDate};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::guard::{PathGuard, ResolvedPath};
use super::types::*;

/// 上传暂存文件前缀，写入完成前文件以该名字存在
const STAGING_PREFIX: &str = ".upload-";
/// 上传暂存文件后缀
const STAGING_SUFFIX: &str = ".part";

/// 文件系统服务
///
/// 根目录在构造时注入，之后只读，可在多个请求间共享
#[derive(Debug)]
pub struct FilesystemService {
    /// 浏览用守卫（根目录）
    guard: PathGuard,
    /// 上传/下载用守卫（根目录或其下的传输子目录）
    transfer_guard: PathGuard,
    show_hidden: bool,
    follow_symlinks: bool,
    max_upload_size: u64,
}

impl FilesystemService {
    /// 创建新的文件系统服务
    ///
    /// `config.root_dir` 应当已经过 `PathValidator::prepare_root` 处理
    pub fn new(config: &StorageConfig) -> Result<Self, FsError> {
        let guard = PathGuard::new(config.root_dir.clone());

        let transfer_guard = match config.transfer_dir.as_deref() {
            Some(dir) if !dir.trim().is_empty() => {
                let resolved = guard.resolve(dir)?;
                PathGuard::new(resolved.as_path().to_path_buf())
            }
            _ => guard.clone(),
        };

        Ok(Self {
            guard,
            transfer_guard,
            show_hidden: config.show_hidden,
            follow_symlinks: config.follow_symlinks,
            max_upload_size: config.max_upload_size,
        })
    }

    /// 浏览根目录
    pub fn root(&self) -> &std::path::Path {
        self.guard.root()
    }

    /// 上传/下载根目录
    pub fn transfer_root(&self) -> &std::path::Path {
        self.transfer_guard.root()
    }

    pub fn max_upload_size(&self) -> u64 {
        self.max_upload_size
    }

    /// 列出目录内容，按名称升序（区分大小写）
    pub async fn list_directory(&self, relative: &str) -> Result<Vec<DirectoryEntry>, FsError> {
        let dir = self.guard.resolve(relative)?;
        self.check_contained(&self.guard, &dir).await?;

        let metadata = fs::metadata(dir.as_path())
            .await
            .map_err(|e| FsError::from_io(&e, FsErrorCode::ReadFailed, dir.relative()))?;

        if !metadata.is_dir() {
            return Err(FsError::new(FsErrorCode::NotADirectory).with_path(dir.relative()));
        }

        let mut read_dir = fs::read_dir(dir.as_path()).await.map_err(|e| {
            tracing::error!("读取目录失败: {:?}, 错误: {}", dir.as_path(), e);
            FsError::from_io(&e, FsErrorCode::ReadFailed, dir.relative())
        })?;

        let mut entries = Vec::new();
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("遍历目录失败: {:?}, 错误: {}", dir.as_path(), e);
                    return Err(FsError::from_io(&e, FsErrorCode::ReadFailed, dir.relative()));
                }
            };

            let name = entry.file_name().to_string_lossy().into_owned();

            // 过滤上传暂存文件和隐藏文件
            if Self::is_staging_file(&name) {
                continue;
            }
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }

            // file_type 不跟随符号链接
            let is_directory = match entry.file_type().await {
                Ok(file_type) => file_type.is_dir(),
                Err(e) => {
                    tracing::warn!("无法读取条目类型，已跳过: {:?}, 错误: {}", entry.path(), e);
                    continue;
                }
            };

            entries.push(DirectoryEntry { name, is_directory });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));

        tracing::debug!("列出目录 /{}: {} 个条目", dir.relative(), entries.len());
        Ok(entries)
    }

    /// 上传文件到指定目录，文件名加当天日期前缀
    pub async fn upload_file(
        &self,
        relative: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<UploadTarget, FsError> {
        self.upload_file_on(Local::now().date_naive(), relative, file_name, content)
            .await
    }

    /// 以指定日期上传文件
    ///
    /// 同一天重复上传同名文件会覆盖已有文件
    pub async fn upload_file_on(
        &self,
        date: NaiveDate,
        relative: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<UploadTarget, FsError> {
        // 写入前先校验文件名
        PathGuard::validate_file_name(file_name)?;

        let size = content.len() as u64;
        if size > self.max_upload_size {
            return Err(FsError::new(FsErrorCode::PayloadTooLarge)
                .with_message(format!(
                    "Uploaded file is too large: {} bytes (limit {} bytes)",
                    size, self.max_upload_size
                ))
                .with_path(file_name));
        }

        let dir = self.transfer_guard.resolve(relative)?;
        self.prepare_upload_dir(&dir).await?;

        let stored_name = stored_file_name(date, file_name);
        let target = dir.join_name(&stored_name);

        if let Ok(existing) = fs::symlink_metadata(target.as_path()).await {
            if existing.is_dir() {
                return Err(FsError::new(FsErrorCode::IsADirectory).with_path(target.relative()));
            }
        }

        self.write_atomically(&dir, &target, content).await?;

        tracing::info!(
            "上传完成: {} -> /{} ({} 字节)",
            file_name,
            target.relative(),
            size
        );

        Ok(UploadTarget {
            original_name: file_name.to_string(),
            mime_type: content_type_for(target.as_path()).to_string(),
            file_name: stored_name,
            directory: dir.relative().to_string(),
            path: target.relative().to_string(),
            size,
        })
    }

    /// 打开待下载文件
    pub async fn download_file(&self, relative: &str) -> Result<DownloadFile, FsError> {
        let path = self.transfer_guard.resolve(relative)?;
        self.check_contained(&self.transfer_guard, &path).await?;

        let metadata = fs::metadata(path.as_path())
            .await
            .map_err(|e| FsError::from_io(&e, FsErrorCode::ReadFailed, path.relative()))?;

        if metadata.is_dir() {
            return Err(FsError::new(FsErrorCode::IsADirectory).with_path(path.relative()));
        }

        let file = fs::File::open(path.as_path())
            .await
            .map_err(|e| FsError::from_io(&e, FsErrorCode::ReadFailed, path.relative()))?;

        let name = path
            .as_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(DownloadFile {
            file,
            content_type: content_type_for(path.as_path()),
            name,
            size: metadata.len(),
        })
    }

    /// 创建上传目录（含缺失的上级目录）
    async fn prepare_upload_dir(&self, dir: &ResolvedPath) -> Result<(), FsError> {
        // 创建任何目录之前先确认最近的已存在祖先在根目录内
        self.check_contained(&self.transfer_guard, dir).await?;

        if let Ok(metadata) = fs::metadata(dir.as_path()).await {
            if !metadata.is_dir() {
                return Err(FsError::new(FsErrorCode::NotADirectory).with_path(dir.relative()));
            }
        }

        fs::create_dir_all(dir.as_path()).await.map_err(|e| {
            tracing::error!("创建上传目录失败: {:?}, 错误: {}", dir.as_path(), e);
            FsError::from_io(&e, FsErrorCode::WriteFailed, dir.relative())
        })?;

        // 创建期间目录树可能被替换，写入前再检查一次
        self.check_contained(&self.transfer_guard, dir).await
    }

    /// 先写暂存文件再重命名，最终文件名下不会出现写了一半的内容
    async fn write_atomically(
        &self,
        dir: &ResolvedPath,
        target: &ResolvedPath,
        content: &[u8],
    ) -> Result<(), FsError> {
        let staging = dir
            .as_path()
            .join(format!("{}{}{}", STAGING_PREFIX, Uuid::new_v4(), STAGING_SUFFIX));

        let result = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(content).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&staging, target.as_path()).await
        }
        .await;

        if let Err(e) = result {
            tracing::error!("写入文件失败: {:?}, 错误: {}", target.as_path(), e);
            if let Err(cleanup) = fs::remove_file(&staging).await {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    tracing::warn!("清理暂存文件失败: {:?}, 错误: {}", staging, cleanup);
                }
            }
            return Err(FsError::from_io(&e, FsErrorCode::WriteFailed, target.relative()));
        }

        Ok(())
    }

    async fn check_contained(&self, guard: &PathGuard, path: &ResolvedPath) -> Result<(), FsError> {
        if self.follow_symlinks {
            return Ok(());
        }
        guard.ensure_contained(path).await
    }

    fn is_staging_file(name: &str) -> bool {
        name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX)
    }
}

/// 生成保存文件名：`DDMMYYYY-原文件名`
pub fn stored_file_name(date: NaiveDate, original: &str) -> String {
    format!("{}-{}", date.format("%d%m%Y"), original)
}
