//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（TextGenerator、NovelStore、Repository、Events 等）
//! - generation: 生成编排流水线
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod generation;
pub mod ports;
pub mod queries;

// Re-exports
pub use commands::{
    // Novel commands
    CreateNovel,
    DeleteNovel,
    EditChapter,
    LoadNovel,
    SaveNovel,
    SelectChapter,
    SetTitle,
    UpdateSettings,
    // Generation commands
    AnalyzeConsistency,
    AutoGenerate,
    GenerateChapter,
    PlanOutline,
    RepairConsistency,
    StopGeneration,
    // Handlers
    handlers::{
        AnalyzeConsistencyHandler, AutoGenerateHandler, CreateNovelHandler, DeleteNovelHandler,
        EditChapterHandler, GenerateChapterHandler, LoadNovelHandler, PlanOutlineHandler,
        RepairConsistencyHandler, SaveNovelHandler, SelectChapterHandler, SetTitleHandler,
        StopGenerationHandler, UpdateSettingsHandler,
    },
};

pub use error::ApplicationError;

pub use generation::{GenerationConfig, OperationKind, OperationSlot, RetryPolicy};

pub use ports::{
    AutosavePort, GenerationEvent, GenerationEventPort, GenerationError, NovelRepositoryPort,
    NovelStorePort, RepositoryError, SaveOutcome, TextGeneratorPort,
};

pub use queries::{
    GetCurrentNovel,
    ListNovels,
    // Handlers
    handlers::{CurrentNovelResponse, GetCurrentNovelHandler, ListNovelsHandler},
};
