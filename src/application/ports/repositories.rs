//! Repository Ports - 出站端口
//!
//! 定义文档持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite / 内存）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::domain::novel::{Novel, NovelId};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 文档列表项
#[derive(Debug, Clone, Serialize)]
pub struct NovelListing {
    pub id: NovelId,
    pub title: String,
    pub updated_at: DateTime<Utc>,
}

/// Novel Repository Port
#[async_trait]
pub trait NovelRepositoryPort: Send + Sync {
    /// 保存（插入或覆盖）文档
    async fn save(&self, novel: &Novel) -> Result<NovelId, RepositoryError>;

    /// 根据 ID 加载文档
    async fn load(&self, id: NovelId) -> Result<Option<Novel>, RepositoryError>;

    /// 列出所有文档（最近更新在前）
    async fn list(&self) -> Result<Vec<NovelListing>, RepositoryError>;

    /// 删除文档
    async fn delete(&self, id: NovelId) -> Result<(), RepositoryError>;
}
