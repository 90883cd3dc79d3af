//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{ErrorClass, RepositoryError};
use crate::domain::novel::{ChapterId, NovelError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 状态无效
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),

    /// 单章生成失败（已保留部分内容）
    #[error("Chapter {chapter} generation failed ({}): {message}", .class.as_str())]
    GenerationFailed {
        chapter: ChapterId,
        class: ErrorClass,
        message: String,
    },

    /// 批量生成在某章中止
    #[error("Auto-generation stopped at chapter {chapter} ({title}): {message}")]
    BatchHalted {
        chapter: ChapterId,
        title: String,
        message: String,
    },

    /// 内部错误
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// 创建状态无效错误
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::not_found("Novel", id),
            other => Self::RepositoryError(other.to_string()),
        }
    }
}

impl From<NovelError> for ApplicationError {
    fn from(err: NovelError) -> Self {
        match err {
            NovelError::ChapterNotFound(id) => Self::not_found("Chapter", id),
            NovelError::InvalidOutline(message) => Self::ExternalServiceError(message),
            other => Self::InvalidState(other.to_string()),
        }
    }
}
