//! Autosave Port - 手动保存入口
//!
//! 手动保存绕过防抖立即写入，并清除尚未触发的自动保存

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::novel::NovelId;

/// 保存结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(NovelId),
    /// 文档没有标题，不保存
    SkippedUntitled,
}

#[async_trait]
pub trait AutosavePort: Send + Sync {
    /// 立即保存当前文档
    async fn save_now(&self) -> Result<SaveOutcome, RepositoryError>;
}
