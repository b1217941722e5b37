use file_browser_server::{config::LogConfig, logging, server, AppConfig, AppState};
use tracing::info;

/// 加载日志配置
///
/// 日志系统初始化之前读取，失败时返回默认配置
async fn load_log_config(config_path: &str) -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(config_path).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

/// 等待 Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("监听关闭信号失败: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到 Ctrl+C，开始优雅关闭...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = AppConfig::config_path();

    // 初始化日志系统（必须保持 _log_guard 存活）
    let log_config = load_log_config(&config_path).await;
    let _log_guard = logging::init_logging(&log_config);

    info!("{} v{} 启动中...", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load_or_default(&config_path).await?;
    config.apply_env_overrides();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config)?;
    info!("应用状态初始化完成");

    let app = server::build_router(app_state);

    info!("服务器启动在: http://{}", addr);
    info!("目录列表: http://{}/files?path=", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("应用已安全退出");
    Ok(())
}
