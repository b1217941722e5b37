// 受限文件系统访问模块
//
// 所有客户端路径都相对于配置的根目录解析，不允许逃逸到根目录之外

mod guard;
mod service;
mod types;

pub use guard::{PathGuard, ResolvedPath};
pub use service::{stored_file_name, FilesystemService};
pub use types::*;
