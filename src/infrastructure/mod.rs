//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现

pub mod adapters;
pub mod events;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;

pub use adapters::{OpenAiClientConfig, OpenAiCompatClient, ScriptedTextGenerator};
pub use events::EventPublisher;
pub use memory::{InMemoryNovelRepository, InMemoryNovelStore};
pub use persistence::{DatabaseConfig, SqliteNovelRepository};
pub use worker::{AutosaveConfig, AutosaveHandle, AutosaveWorker};
