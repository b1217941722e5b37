// API处理器模块

pub mod filesystem;

pub use filesystem::{download_file, health_check, list_files, liveness, upload_file};
