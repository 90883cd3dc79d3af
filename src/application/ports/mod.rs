//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod autosave;
mod events;
mod novel_store;
mod repositories;
mod text_generator;

pub use autosave::{AutosavePort, SaveOutcome};
pub use events::{ChapterPhase, GenerationEvent, GenerationEventPort, LengthStatus};
pub use novel_store::NovelStorePort;
pub use repositories::{NovelListing, NovelRepositoryPort, RepositoryError};
pub use text_generator::{
    classify_message, Completion, ErrorClass, FragmentStream, GenerationError,
    GenerationRequest, StreamChunk, TextGeneratorPort,
};
