// 配置管理模块

pub mod path_validator;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use path_validator::PathValidator;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";
/// 覆盖配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "FILE_BROWSER_CONFIG";
/// 覆盖浏览根目录的环境变量
pub const ROOT_DIR_ENV: &str = "FILE_BROWSER_ROOT";

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 存储配置（浏览根目录、上传限制）
    pub storage: StorageConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// CORS允许的源（空表示允许所有）
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec![],
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 浏览根目录（绝对路径），所有客户端路径都相对于它
    pub root_dir: PathBuf,
    /// 上传/下载使用的子目录（相对根目录），为空表示直接使用根目录
    #[serde(default)]
    pub transfer_dir: Option<String>,
    /// 是否显示隐藏文件
    #[serde(default = "default_show_hidden")]
    pub show_hidden: bool,
    /// 是否允许跟随指向根目录外的符号链接
    #[serde(default)]
    pub follow_symlinks: bool,
    /// 单个上传文件的最大字节数
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_show_hidden() -> bool {
    true
}

fn default_max_upload_size() -> u64 {
    100 * 1024 * 1024 // 100MB
}

impl Default for StorageConfig {
    fn default() -> Self {
        // 本地环境：使用当前工作目录 + data
        let root_dir = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("data");

        Self {
            root_dir,
            transfer_dir: None,
            show_hidden: default_show_hidden(),
            follow_symlinks: false,
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl StorageConfig {
    /// 验证根目录配置
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_absolute() {
            anyhow::bail!(
                "根目录必须是绝对路径，当前配置: {:?}",
                self.root_dir
            );
        }
        if self.max_upload_size == 0 {
            anyhow::bail!("max_upload_size 必须大于 0");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 配置文件路径（环境变量优先）
    pub fn config_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;

        config
            .storage
            .validate()
            .context("配置文件中的根目录验证失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.storage
            .validate()
            .context("保存配置失败：根目录配置无效")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("✓ 配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    ///
    /// 仅在配置文件不存在时写入默认配置；文件存在但无法解析或校验失败时返回错误，
    /// 不覆盖用户的配置
    pub async fn load_or_default(path: &str) -> Result<Self> {
        match fs::metadata(path).await {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("配置文件不存在，使用默认配置: {}", path);
                let default_config = Self::default();

                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {:#}", e);
                }

                Ok(default_config)
            }
            _ => {
                let config = Self::load_from_file(path)
                    .await
                    .with_context(|| format!("配置文件无效: {}", path))?;
                tracing::info!("配置文件加载成功: {}", path);
                Ok(config)
            }
        }
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var(ROOT_DIR_ENV) {
            if !root.trim().is_empty() {
                tracing::info!("使用环境变量 {} 指定的根目录: {}", ROOT_DIR_ENV, root);
                self.storage.root_dir = PathBuf::from(root);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert!(config.storage.root_dir.is_absolute());
        assert!(config.storage.transfer_dir.is_none());
        assert!(config.storage.show_hidden);
        assert!(!config.storage.follow_symlinks);
        assert_eq!(config.storage.max_upload_size, 100 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config").join("app.toml");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.storage.transfer_dir = Some("DATA-EKSTERNAL".to_string());
        config.save_to_file(path).await.unwrap();

        let loaded = AppConfig::load_from_file(path).await.unwrap();
        assert_eq!(loaded.server.port, config.server.port);
        assert_eq!(loaded.storage.root_dir, config.storage.root_dir);
        assert_eq!(loaded.storage.transfer_dir.as_deref(), Some("DATA-EKSTERNAL"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let content = r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [storage]
            root_dir = "/media/disk"
        "#;

        let config: AppConfig = toml::from_str(content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.cors_origins.is_empty());
        assert!(config.storage.show_hidden);
        assert_eq!(config.storage.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.log.level, "info");
    }

    #[tokio::test]
    async fn test_relative_root_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("app.toml");
        std::fs::write(
            &path,
            "[server]\nhost = \"127.0.0.1\"\nport = 5000\n\n[storage]\nroot_dir = \"relative/data\"\n",
        )
        .unwrap();

        let result = AppConfig::load_from_file(path.to_str().unwrap()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_or_default_writes_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        let path = path.to_str().unwrap();

        let config = AppConfig::load_or_default(path).await.unwrap();
        assert_eq!(config.server.port, 5000);
        assert!(std::path::Path::new(path).exists());

        // 再次加载读取刚写入的文件
        let reloaded = AppConfig::load_or_default(path).await.unwrap();
        assert_eq!(reloaded.storage.root_dir, config.storage.root_dir);
    }

    #[tokio::test]
    async fn test_load_or_default_keeps_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let content = "[server]\nhost = \"127.0.0.1\"\nport = 8081\n\n[storage]\nroot_dir = \"media/disk\"\n";

        let invalid_root = temp_dir.path().join("relative.toml");
        std::fs::write(&invalid_root, content).unwrap();
        let result = AppConfig::load_or_default(invalid_root.to_str().unwrap()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&invalid_root).unwrap(), content);

        let unparsable = temp_dir.path().join("broken.toml");
        std::fs::write(&unparsable, "[server\nport = ").unwrap();
        let result = AppConfig::load_or_default(unparsable.to_str().unwrap()).await;
        assert!(result.is_err());
        assert_eq!(std::fs::read_to_string(&unparsable).unwrap(), "[server\nport = ");
    }
}
