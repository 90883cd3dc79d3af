//! Application State
//!
//! 包含所有 Command/Query Handlers 的应用状态

use std::sync::Arc;

use crate::application::generation::{
    BatchSequencer, ChapterGenerator, ConsistencyChecker, OutlinePlanner,
};
use crate::application::{
    // Command handlers
    AnalyzeConsistencyHandler, AutoGenerateHandler, CreateNovelHandler, DeleteNovelHandler,
    EditChapterHandler, GenerateChapterHandler, LoadNovelHandler, PlanOutlineHandler,
    RepairConsistencyHandler, SaveNovelHandler, SelectChapterHandler, SetTitleHandler,
    StopGenerationHandler, UpdateSettingsHandler,
    // Query handlers
    GetCurrentNovelHandler, ListNovelsHandler,
    // Ports
    AutosavePort, GenerationConfig, GenerationEventPort, NovelRepositoryPort, NovelStorePort,
    OperationSlot, TextGeneratorPort,
};
use crate::infrastructure::events::EventPublisher;

/// 应用状态
pub struct AppState {
    // ========== Ports ==========
    pub store: Arc<dyn NovelStorePort>,
    pub novel_repo: Arc<dyn NovelRepositoryPort>,
    pub event_publisher: Arc<EventPublisher>,
    pub slot: Arc<OperationSlot>,

    // ========== Command Handlers ==========
    pub create_novel_handler: CreateNovelHandler,
    pub load_novel_handler: LoadNovelHandler,
    pub delete_novel_handler: DeleteNovelHandler,
    pub save_novel_handler: SaveNovelHandler,
    pub update_settings_handler: UpdateSettingsHandler,
    pub set_title_handler: SetTitleHandler,
    pub select_chapter_handler: SelectChapterHandler,
    pub edit_chapter_handler: EditChapterHandler,
    pub plan_outline_handler: PlanOutlineHandler,
    pub generate_chapter_handler: GenerateChapterHandler,
    pub auto_generate_handler: AutoGenerateHandler,
    pub stop_generation_handler: StopGenerationHandler,
    pub analyze_consistency_handler: AnalyzeConsistencyHandler,
    pub repair_consistency_handler: RepairConsistencyHandler,

    // ========== Query Handlers ==========
    pub get_current_novel_handler: GetCurrentNovelHandler,
    pub list_novels_handler: ListNovelsHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        store: Arc<dyn NovelStorePort>,
        novel_repo: Arc<dyn NovelRepositoryPort>,
        generator: Arc<dyn TextGeneratorPort>,
        autosave: Arc<dyn AutosavePort>,
        event_publisher: Arc<EventPublisher>,
        config: GenerationConfig,
    ) -> Self {
        let slot = OperationSlot::new().arc();
        let events: Arc<dyn GenerationEventPort> = event_publisher.clone();

        let chapters = ChapterGenerator::new(
            generator.clone(),
            store.clone(),
            events.clone(),
            config.clone(),
        );
        let checker = ConsistencyChecker::new(
            generator.clone(),
            store.clone(),
            events.clone(),
            chapters.clone(),
        );
        let planner = OutlinePlanner::new(generator, store.clone(), events.clone(), config);
        let batch = BatchSequencer::new(chapters.clone(), store.clone(), events.clone());

        Self {
            // Ports
            store: store.clone(),
            novel_repo: novel_repo.clone(),
            event_publisher,
            slot: slot.clone(),

            // Command handlers
            create_novel_handler: CreateNovelHandler::new(store.clone(), slot.clone()),
            load_novel_handler: LoadNovelHandler::new(
                store.clone(),
                novel_repo.clone(),
                slot.clone(),
            ),
            delete_novel_handler: DeleteNovelHandler::new(
                store.clone(),
                novel_repo.clone(),
                slot.clone(),
            ),
            save_novel_handler: SaveNovelHandler::new(autosave),
            update_settings_handler: UpdateSettingsHandler::new(store.clone()),
            set_title_handler: SetTitleHandler::new(store.clone()),
            select_chapter_handler: SelectChapterHandler::new(store.clone()),
            edit_chapter_handler: EditChapterHandler::new(store.clone()),
            plan_outline_handler: PlanOutlineHandler::new(planner, slot.clone()),
            generate_chapter_handler: GenerateChapterHandler::new(
                chapters,
                store.clone(),
                events.clone(),
                slot.clone(),
            ),
            auto_generate_handler: AutoGenerateHandler::new(batch, slot.clone()),
            stop_generation_handler: StopGenerationHandler::new(slot.clone()),
            analyze_consistency_handler: AnalyzeConsistencyHandler::new(
                checker.clone(),
                slot.clone(),
            ),
            repair_consistency_handler: RepairConsistencyHandler::new(
                checker,
                store.clone(),
                events,
                slot.clone(),
            ),

            // Query handlers
            get_current_novel_handler: GetCurrentNovelHandler::new(store, slot),
            list_novels_handler: ListNovelsHandler::new(novel_repo),
        }
    }
}
