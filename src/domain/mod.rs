//! Domain Layer - 领域层
//!
//! - Novel Context: 文档、章节与变更
//! - 上下文窗口与字数估算（纯函数）

pub mod context_window;
pub mod novel;
pub mod word_count;

pub use context_window::{build_context, ContextWindow, RollingContext, DEFAULT_CONTEXT_BUDGET};
pub use word_count::{count_words, progress_percent};
