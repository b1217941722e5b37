// 根目录验证模块

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// 浏览根目录验证器
pub struct PathValidator;

impl PathValidator {
    /// 验证路径是否可作为浏览根目录
    ///
    /// 依次检查：存在、是目录、可写（上传需要写入）
    pub fn validate(path: &Path) -> Result<()> {
        if !path.exists() {
            anyhow::bail!("路径不存在\n详情: 路径 {:?} 不存在", path);
        }

        if !path.is_dir() {
            anyhow::bail!("路径不是目录\n详情: 路径 {:?} 不是一个目录，请指定目录路径", path);
        }

        if !Self::check_writable(path) {
            anyhow::bail!("路径不可写\n详情: 路径 {:?} 没有写入权限，上传将无法保存", path);
        }

        Ok(())
    }

    /// 通过创建临时文件检测写入权限
    fn check_writable(path: &Path) -> bool {
        let test_file = path.join(format!(".write_test_{}", uuid::Uuid::new_v4()));

        match fs::File::create(&test_file) {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
                true
            }
            Err(_) => false,
        }
    }

    /// 目录不存在时自动创建
    pub fn ensure_directory_exists(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).with_context(|| format!("无法创建目录: {:?}", path))?;
            tracing::info!("自动创建根目录: {:?}", path);
        }
        Ok(())
    }

    /// 准备浏览根目录：创建、验证并返回规范化后的绝对路径
    pub fn prepare_root(path: &Path) -> Result<PathBuf> {
        if !path.is_absolute() {
            anyhow::bail!("根目录必须是绝对路径: {:?}", path);
        }
        Self::ensure_directory_exists(path)?;
        Self::validate(path)?;
        dunce::canonicalize(path).with_context(|| format!("无法规范化根目录: {:?}", path))
    }
}
