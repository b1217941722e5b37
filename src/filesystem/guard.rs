// 路径安全守卫
//
// 把客户端提交的相对路径解析为根目录内的绝对路径，防止路径穿越攻击

use std::path::{Component, Path, PathBuf};

use super::types::{FsError, FsErrorCode};

/// 已校验的路径
///
/// 只能由 `PathGuard::resolve` 构造，`absolute` 一定是根目录本身或其子孙
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    absolute: PathBuf,
    relative: String,
}

impl ResolvedPath {
    /// 绝对路径
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// 规范化后的相对路径（`/` 分隔，根目录为空串）
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// 追加一个已校验过的文件名
    pub(crate) fn join_name(&self, name: &str) -> ResolvedPath {
        let relative = if self.relative.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.relative, name)
        };
        ResolvedPath {
            absolute: self.absolute.join(name),
            relative,
        }
    }
}

/// 路径安全守卫
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// 创建新的路径守卫
    ///
    /// `root` 应当是已规范化的绝对路径（见 `config::PathValidator`）
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析相对路径
    ///
    /// 纯字符串运算，不访问文件系统：
    /// - 空串、`.`、多余分隔符被忽略
    /// - `..` 回退一级，回退到根目录之上即判定为穿越
    /// - 含 NUL 或非普通路径段（如 `C:`）判定为无效路径
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FsError> {
        if relative.contains('\0') {
            return Err(FsError::new(FsErrorCode::InvalidPath)
                .with_message("Path contains a NUL byte")
                .with_path(relative.replace('\0', "\\0")));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in relative.split(['/', '\\']) {
            match segment {
                "" | "." => continue,
                ".." => {
                    if segments.pop().is_none() {
                        return Err(FsError::new(FsErrorCode::PathTraversal).with_path(relative));
                    }
                }
                name => {
                    if !Self::is_plain_segment(name) {
                        return Err(FsError::new(FsErrorCode::InvalidPath).with_path(relative));
                    }
                    segments.push(name);
                }
            }
        }

        let mut absolute = self.root.clone();
        for segment in &segments {
            absolute.push(segment);
        }

        Ok(ResolvedPath {
            absolute,
            relative: segments.join("/"),
        })
    }

    /// 校验上传文件名：必须是单个普通文件名
    pub fn validate_file_name(name: &str) -> Result<(), FsError> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\', '\0'])
            || !Self::is_plain_segment(name);

        if invalid {
            return Err(FsError::new(FsErrorCode::InvalidPath)
                .with_message("File name must not contain path separators")
                .with_path(name.replace('\0', "\\0")));
        }
        Ok(())
    }

    /// 检查路径的真实位置是否仍在根目录内
    ///
    /// 根目录内指向外部的符号链接会在这里被拒绝。路径不存在时按最近的已存在祖先判断，
    /// 因此不会经由外部链接创建目录，也不会泄露根目录外文件是否存在
    pub async fn ensure_contained(&self, path: &ResolvedPath) -> Result<(), FsError> {
        let target = path.as_path().to_path_buf();
        let root = self.root.clone();

        let contained = tokio::task::spawn_blocking(move || Self::is_contained(&root, &target))
            .await
            .map_err(|e| {
                tracing::error!("路径检查任务异常: {:?}, 错误: {}", path.as_path(), e);
                FsError::new(FsErrorCode::ReadFailed)
                    .with_message(format!("Failed to check path: {}", e))
                    .with_path(path.relative())
            })?;

        if contained {
            Ok(())
        } else {
            tracing::warn!("拒绝访问根目录外的链接目标: {:?}", path.as_path());
            Err(FsError::new(FsErrorCode::PathTraversal).with_path(path.relative()))
        }
    }

    /// 从 `target` 向上找到第一个可解析的祖先，检查其规范路径是否在根目录下
    ///
    /// 存在但无法解析的符号链接（悬空、循环）一律视为越界
    fn is_contained(root: &Path, target: &Path) -> bool {
        let canonical_root = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        let mut current = Some(target);
        while let Some(candidate) = current {
            if let Ok(canonical) = dunce::canonicalize(candidate) {
                return canonical.starts_with(&canonical_root);
            }
            let is_symlink = std::fs::symlink_metadata(candidate)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_symlink {
                return false;
            }
            // 根目录本身尚不存在，其下的路径不可能指向外部
            if candidate == root {
                return true;
            }
            current = candidate.parent();
        }
        false
    }

    /// 单个路径段是否为普通文件名（排除盘符、根等）
    fn is_plain_segment(segment: &str) -> bool {
        let mut components = Path::new(segment).components();
        matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) && !segment.contains(':')
    }
}
