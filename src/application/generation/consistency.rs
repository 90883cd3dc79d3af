//! 一致性分析与修复

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::chapter::{ChapterGenerationOptions, ChapterGenerator, ChapterOutcome};
use super::prompts;
use crate::application::error::ApplicationError;
use crate::application::ports::{
    GenerationError, GenerationEvent, GenerationEventPort, NovelStorePort, TextGeneratorPort,
};
use crate::domain::build_context;
use crate::domain::novel::{ChapterId, NovelMutation};

/// 一致性检查器
#[derive(Clone)]
pub struct ConsistencyChecker {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
    chapters: ChapterGenerator,
}

impl ConsistencyChecker {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
        chapters: ChapterGenerator,
    ) -> Self {
        Self {
            generator,
            store,
            events,
            chapters,
        }
    }

    /// 分析章节与人物设定、前序梗概是否矛盾
    ///
    /// 结果保存在章节上；取消时返回 None
    pub async fn analyze(
        &self,
        id: ChapterId,
        cancel: CancellationToken,
    ) -> Result<Option<String>, ApplicationError> {
        let novel = self.store.snapshot();
        let chapter = novel
            .chapter(id)
            .ok_or_else(|| ApplicationError::not_found("Chapter", id))?;
        if chapter.is_generating() {
            return Err(ApplicationError::invalid_state(format!(
                "Chapter {id} is generating"
            )));
        }
        if chapter.content().trim().is_empty() {
            return Err(ApplicationError::validation(format!(
                "Chapter {id} has no content to analyze"
            )));
        }

        let context = build_context(
            novel.chapters(),
            id,
            self.chapters.config().context_budget_chars,
        );
        let request = self
            .chapters
            .config()
            .tune(prompts::consistency(&novel, chapter, &context));

        let reply = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            reply = self.generator.complete(request) => reply,
        };
        let completion = match reply {
            Ok(completion) => completion,
            Err(GenerationError::Cancelled) => return Ok(None),
            Err(e) => {
                tracing::error!(chapter = %id, error = %e, "Consistency analysis failed");
                return Err(ApplicationError::ExternalServiceError(e.to_string()));
            }
        };

        if let Some(usage) = completion.usage {
            self.store.apply(NovelMutation::RecordUsage(usage))?;
        }
        let analysis = completion.text.trim().to_string();
        self.store.apply(NovelMutation::SetConsistencyAnalysis {
            chapter: id,
            analysis: Some(analysis.clone()),
        })?;

        tracing::info!(chapter = %id, chars = analysis.chars().count(), "Consistency analyzed");
        self.events.publish(GenerationEvent::ConsistencyAnalyzed {
            novel_id: novel.id(),
            chapter_id: id,
        });
        Ok(Some(analysis))
    }

    /// 以分析结果为指导强制重写章节，成功后清除分析
    pub async fn repair(
        &self,
        id: ChapterId,
        cancel: CancellationToken,
    ) -> Result<ChapterOutcome, ApplicationError> {
        let analysis = self
            .store
            .snapshot()
            .chapter(id)
            .ok_or_else(|| ApplicationError::not_found("Chapter", id))?
            .consistency_analysis()
            .map(str::to_string)
            .ok_or_else(|| {
                ApplicationError::validation(format!("Chapter {id} has no consistency analysis"))
            })?;

        let options = ChapterGenerationOptions {
            force_rewrite: true,
            guidance: Some(analysis),
            context: None,
        };
        let outcome = self.chapters.generate(id, options, cancel).await?;

        if matches!(outcome, ChapterOutcome::Completed(_)) {
            self.store.apply(NovelMutation::SetConsistencyAnalysis {
                chapter: id,
                analysis: None,
            })?;
        }
        Ok(outcome)
    }
}
