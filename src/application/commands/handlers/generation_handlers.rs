//! Generation Command Handlers
//!
//! 每个处理器先向操作槽申请令牌（同时取消正在运行的操作），
//! 再把令牌交给对应的生成组件

use std::sync::Arc;

use crate::application::commands::{
    AnalyzeConsistency, AutoGenerate, GenerateChapter, PlanOutline, RepairConsistency,
    StopGeneration,
};
use crate::application::error::ApplicationError;
use crate::application::generation::{
    BatchReport, BatchSequencer, ChapterGenerationOptions, ChapterGenerator, ChapterOutcome,
    ConsistencyChecker, OperationKind, OperationSlot, OutlineOutcome, OutlinePlanner,
};
use crate::application::ports::{GenerationEvent, GenerationEventPort, NovelStorePort};

/// 单章失败时通知 UI
fn publish_chapter_failure(
    store: &dyn NovelStorePort,
    events: &dyn GenerationEventPort,
    result: &Result<ChapterOutcome, ApplicationError>,
) {
    if let Err(ApplicationError::GenerationFailed {
        chapter,
        class,
        message,
    }) = result
    {
        events.publish(GenerationEvent::ChapterFailed {
            novel_id: store.snapshot().id(),
            chapter_id: *chapter,
            class: *class,
            error: message.clone(),
        });
    }
}

// ============================================================================
// PlanOutline
// ============================================================================

/// PlanOutline Handler
pub struct PlanOutlineHandler {
    planner: OutlinePlanner,
    slot: Arc<OperationSlot>,
}

impl PlanOutlineHandler {
    pub fn new(planner: OutlinePlanner, slot: Arc<OperationSlot>) -> Self {
        Self { planner, slot }
    }

    pub async fn handle(&self, command: PlanOutline) -> Result<OutlineOutcome, ApplicationError> {
        let premise = command.premise.trim();
        if premise.is_empty() {
            return Err(ApplicationError::validation("Premise must not be empty"));
        }

        let guard = self.slot.begin(OperationKind::Outline).await;
        self.planner
            .plan(premise.to_string(), guard.token().clone())
            .await
    }
}

// ============================================================================
// GenerateChapter
// ============================================================================

/// GenerateChapter Handler - 单章生成 / 强制重写
pub struct GenerateChapterHandler {
    chapters: ChapterGenerator,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
    slot: Arc<OperationSlot>,
}

impl GenerateChapterHandler {
    pub fn new(
        chapters: ChapterGenerator,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
        slot: Arc<OperationSlot>,
    ) -> Self {
        Self {
            chapters,
            store,
            events,
            slot,
        }
    }

    pub async fn handle(
        &self,
        command: GenerateChapter,
    ) -> Result<ChapterOutcome, ApplicationError> {
        let guard = self.slot.begin(OperationKind::Chapter).await;

        let options = if command.force_rewrite {
            ChapterGenerationOptions::force()
        } else {
            ChapterGenerationOptions::default()
        };

        tracing::info!(
            chapter_id = %command.chapter_id,
            force_rewrite = command.force_rewrite,
            "Chapter generation requested"
        );

        let result = self
            .chapters
            .generate(command.chapter_id, options, guard.token().clone())
            .await;
        publish_chapter_failure(self.store.as_ref(), self.events.as_ref(), &result);
        result
    }
}

// ============================================================================
// AutoGenerate
// ============================================================================

/// AutoGenerate Handler - 顺序生成所有未完成章节
pub struct AutoGenerateHandler {
    batch: BatchSequencer,
    slot: Arc<OperationSlot>,
}

impl AutoGenerateHandler {
    pub fn new(batch: BatchSequencer, slot: Arc<OperationSlot>) -> Self {
        Self { batch, slot }
    }

    pub async fn handle(&self, _command: AutoGenerate) -> Result<BatchReport, ApplicationError> {
        let guard = self.slot.begin(OperationKind::AutoGenerate).await;
        self.batch.run(guard.token().clone()).await
    }
}

// ============================================================================
// StopGeneration
// ============================================================================

/// StopGeneration Handler
pub struct StopGenerationHandler {
    slot: Arc<OperationSlot>,
}

impl StopGenerationHandler {
    pub fn new(slot: Arc<OperationSlot>) -> Self {
        Self { slot }
    }

    /// 返回是否有操作被取消
    pub fn handle(&self, _command: StopGeneration) -> bool {
        self.slot.stop()
    }
}

// ============================================================================
// Consistency
// ============================================================================

/// AnalyzeConsistency Handler
pub struct AnalyzeConsistencyHandler {
    checker: ConsistencyChecker,
    slot: Arc<OperationSlot>,
}

impl AnalyzeConsistencyHandler {
    pub fn new(checker: ConsistencyChecker, slot: Arc<OperationSlot>) -> Self {
        Self { checker, slot }
    }

    pub async fn handle(
        &self,
        command: AnalyzeConsistency,
    ) -> Result<Option<String>, ApplicationError> {
        let guard = self.slot.begin(OperationKind::Consistency).await;
        self.checker
            .analyze(command.chapter_id, guard.token().clone())
            .await
    }
}

/// RepairConsistency Handler - 按分析结果重写章节
pub struct RepairConsistencyHandler {
    checker: ConsistencyChecker,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
    slot: Arc<OperationSlot>,
}

impl RepairConsistencyHandler {
    pub fn new(
        checker: ConsistencyChecker,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
        slot: Arc<OperationSlot>,
    ) -> Self {
        Self {
            checker,
            store,
            events,
            slot,
        }
    }

    pub async fn handle(
        &self,
        command: RepairConsistency,
    ) -> Result<ChapterOutcome, ApplicationError> {
        let guard = self.slot.begin(OperationKind::Chapter).await;
        let result = self
            .checker
            .repair(command.chapter_id, guard.token().clone())
            .await;
        publish_chapter_failure(self.store.as_ref(), self.events.as_ref(), &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::application::generation::test_support::Harness;
    use crate::application::ports::{ErrorClass, GenerationError};
    use crate::domain::novel::ChapterId;
    use crate::infrastructure::adapters::ScriptedStep;

    fn chapter_handler(harness: &Harness, slot: Arc<OperationSlot>) -> GenerateChapterHandler {
        GenerateChapterHandler::new(
            harness.chapter_generator(),
            harness.store.clone(),
            harness.events.clone(),
            slot,
        )
    }

    fn failures(harness: &Harness) -> Vec<(ChapterId, ErrorClass)> {
        harness
            .events
            .all()
            .into_iter()
            .filter_map(|event| match event {
                GenerationEvent::ChapterFailed {
                    chapter_id, class, ..
                } => Some((chapter_id, class)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_chapter_failure_is_published_once() {
        let harness = Harness::with_chapters(2);
        harness.generator.push_stream(vec![
            ScriptedStep::text("Half a scene."),
            ScriptedStep::Fail(GenerationError::NetworkError("connection reset".into())),
        ]);

        let handler = chapter_handler(&harness, OperationSlot::new().arc());
        let err = handler
            .handle(GenerateChapter {
                chapter_id: ChapterId::new(1),
                force_rewrite: false,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::GenerationFailed { .. }));
        assert_eq!(
            failures(&harness),
            vec![(ChapterId::new(1), ErrorClass::TransientNetwork)]
        );
        assert_eq!(harness.content(ChapterId::new(1)), "Half a scene.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_running_chapter() {
        let harness = Harness::with_chapters(1);
        harness.generator.push_stream(vec![
            ScriptedStep::text("Opening line."),
            ScriptedStep::Delay(Duration::from_secs(60)),
            ScriptedStep::text(" never written"),
        ]);

        let slot = OperationSlot::new().arc();
        let handler = Arc::new(chapter_handler(&harness, slot.clone()));
        let stop = StopGenerationHandler::new(slot.clone());
        assert!(!stop.handle(StopGeneration));

        let running = handler.clone();
        let task = tokio::spawn(async move {
            running
                .handle(GenerateChapter {
                    chapter_id: ChapterId::new(1),
                    force_rewrite: false,
                })
                .await
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(slot.active_kind(), Some(OperationKind::Chapter));
        assert!(stop.handle(StopGeneration));

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, ChapterOutcome::Cancelled);

        let chapter = harness.chapter(ChapterId::new(1));
        assert_eq!(chapter.content(), "Opening line.");
        assert!(!chapter.is_generating());
        assert!(!chapter.is_done());
        assert!(failures(&harness).is_empty());
        assert_eq!(slot.active_kind(), None);
    }

    #[tokio::test]
    async fn test_empty_premise_rejected() {
        let harness = Harness::empty();
        let handler = PlanOutlineHandler::new(harness.outline_planner(), OperationSlot::new().arc());
        let err = handler
            .handle(PlanOutline {
                premise: "   ".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
        assert!(harness.generator.completion_requests().is_empty());
    }

    #[tokio::test]
    async fn test_repair_without_analysis_is_rejected() {
        let harness = Harness::with_chapters(1);
        harness.complete_chapter(ChapterId::new(1), "Some text.");

        let handler = RepairConsistencyHandler::new(
            harness.consistency_checker(),
            harness.store.clone(),
            harness.events.clone(),
            OperationSlot::new().arc(),
        );
        let err = handler
            .handle(RepairConsistency {
                chapter_id: ChapterId::new(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::ValidationError(_)));
        assert!(failures(&harness).is_empty());
    }
}
