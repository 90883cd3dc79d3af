//! Novel Context - 小说限界上下文
//!
//! 职责:
//! - 文档聚合（章节、设置、用量、状态）
//! - 章节实体
//! - 文档变更与 reducer

mod aggregate;
mod entities;
mod errors;
mod mutations;
mod settings;
mod value_objects;

pub use aggregate::Novel;
pub use entities::Chapter;
pub use errors::NovelError;
pub use mutations::{NovelMutation, OutlineEntry};
pub use settings::{LengthMode, NovelSettings, MIN_CHAPTER_WORDS};
pub use value_objects::{ChapterId, NovelId, NovelStatus, TokenUsage, Volume};
