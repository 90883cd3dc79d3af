//! Novel Context - Errors

use thiserror::Error;

use super::{ChapterId, NovelStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NovelError {
    #[error("Chapter not found: {0}")]
    ChapterNotFound(ChapterId),

    #[error("Chapter {0} is already being generated")]
    ChapterGenerating(ChapterId),

    #[error("Chapter {0} is already done")]
    ChapterDone(ChapterId),

    #[error("Chapter {0} is not being generated")]
    ChapterNotGenerating(ChapterId),

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: NovelStatus, to: NovelStatus },

    #[error("Invalid outline: {0}")]
    InvalidOutline(String),
}
