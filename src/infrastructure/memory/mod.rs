//! Memory Layer - In-Memory State Management
//!
//! 当前文档的状态容器，以及不落盘的文档仓储

mod novel_repo;
mod novel_store;

pub use novel_repo::InMemoryNovelRepository;
pub use novel_store::InMemoryNovelStore;
