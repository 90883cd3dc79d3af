//! 单章生成
//!
//! 阶段: Idle -> StreamingInitial -> Extending(n) -> Summarizing -> Done
//! 取消进入 Aborted，不可恢复的错误进入 Failed。
//! 两种情况都清除生成标记并保留已写入的内容

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::extension::{ExtensionLoop, ExtensionOutcome};
use super::stream::{ChapterBuffer, StreamConsumer, StreamOutcome};
use super::{prompts, GenerationConfig};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    ChapterPhase, GenerationError, GenerationEvent, GenerationEventPort, LengthStatus,
    NovelStorePort, TextGeneratorPort,
};
use crate::domain::novel::{Chapter, ChapterId, Novel, NovelError, NovelMutation};
use crate::domain::{build_context, ContextWindow};

/// 单章生成选项
#[derive(Debug, Clone, Default)]
pub struct ChapterGenerationOptions {
    /// 已完成或生成中的章节也重新生成（先清空内容）
    pub force_rewrite: bool,
    /// 附加写作指导（一致性修复）
    pub guidance: Option<String>,
    /// 由批量流程提供的上下文；为空时按前序章节构建
    pub context: Option<ContextWindow>,
}

impl ChapterGenerationOptions {
    pub fn force() -> Self {
        Self {
            force_rewrite: true,
            ..Default::default()
        }
    }
}

/// 单章完成报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReport {
    pub chapter: ChapterId,
    pub word_count: usize,
    pub target_words: u32,
    pub iterations: u32,
    pub length: LengthStatus,
    /// 摘要是否更新（失败时保留旧摘要）
    pub summary_updated: bool,
}

/// 单章生成结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterOutcome {
    Completed(ChapterReport),
    /// 被取消，内容保留、未标记完成
    Cancelled,
}

enum Session {
    Finished(ChapterReport),
    Cancelled,
}

/// 单章生成器
#[derive(Clone)]
pub struct ChapterGenerator {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
    consumer: StreamConsumer,
    extension: ExtensionLoop,
    config: GenerationConfig,
}

impl ChapterGenerator {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
        config: GenerationConfig,
    ) -> Self {
        let consumer = StreamConsumer::new(generator.clone(), store.clone(), events.clone());
        let extension = ExtensionLoop::new(consumer.clone(), config.max_extension_iterations);
        Self {
            generator,
            store,
            events,
            consumer,
            extension,
            config,
        }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// 生成一章
    ///
    /// 返回的 `GenerationFailed` 携带错误分类，供批量流程决定重试
    pub async fn generate(
        &self,
        id: ChapterId,
        options: ChapterGenerationOptions,
        cancel: CancellationToken,
    ) -> Result<ChapterOutcome, ApplicationError> {
        let novel = self.store.snapshot();
        let chapter = novel
            .chapter(id)
            .ok_or_else(|| ApplicationError::not_found("Chapter", id))?;

        if !options.force_rewrite {
            if chapter.is_generating() {
                return Err(ApplicationError::invalid_state(format!(
                    "Chapter {id} is already generating"
                )));
            }
            if chapter.is_done() {
                return Err(ApplicationError::invalid_state(format!(
                    "Chapter {id} is already done"
                )));
            }
        }
        if cancel.is_cancelled() {
            return Ok(ChapterOutcome::Cancelled);
        }

        // 新会话总是从空白开始：强制重写清除完成标记，
        // 中断会话遗留的部分内容也一并清除
        if chapter.is_generating() {
            self.store.apply(NovelMutation::StopChapter(id))?;
        }
        self.store.apply(NovelMutation::ResetChapter(id))?;
        self.store.apply(NovelMutation::BeginChapter(id))?;

        let context = options.context.clone().unwrap_or_else(|| {
            build_context(novel.chapters(), id, self.config.context_budget_chars)
        });
        let target_words = novel.chapter_word_target(self.config.min_chapter_words);

        tracing::info!(
            chapter = %id,
            target_words,
            force = options.force_rewrite,
            "Chapter generation started"
        );

        let mut buffer = ChapterBuffer::new(novel.id(), id, target_words);
        let result = self
            .run_session(&novel, chapter, &context, &options, &mut buffer, &cancel)
            .await;

        match result {
            Ok(Session::Finished(report)) => Ok(ChapterOutcome::Completed(report)),
            Ok(Session::Cancelled) => {
                self.store.apply(NovelMutation::StopChapter(id))?;
                self.publish_phase(&buffer, ChapterPhase::Aborted);
                tracing::info!(chapter = %id, words = buffer.word_count(), "Chapter generation aborted");
                Ok(ChapterOutcome::Cancelled)
            }
            Err(err) => {
                if let Err(stop_err) = self.store.apply(NovelMutation::StopChapter(id)) {
                    tracing::warn!(chapter = %id, error = %stop_err, "Failed to clear generating flag");
                }
                self.publish_phase(&buffer, ChapterPhase::Failed);
                let class = err.class();
                tracing::error!(
                    chapter = %id,
                    class = class.as_str(),
                    words = buffer.word_count(),
                    error = %err,
                    "Chapter generation failed"
                );
                Err(ApplicationError::GenerationFailed {
                    chapter: id,
                    class,
                    message: err.to_string(),
                })
            }
        }
    }

    async fn run_session(
        &self,
        novel: &Novel,
        chapter: &Chapter,
        context: &ContextWindow,
        options: &ChapterGenerationOptions,
        buffer: &mut ChapterBuffer,
        cancel: &CancellationToken,
    ) -> Result<Session, GenerationError> {
        self.publish_phase(buffer, ChapterPhase::StreamingInitial);
        let request = self.config.tune(prompts::chapter(
            novel,
            chapter,
            context,
            buffer.target_words(),
            options.guidance.as_deref(),
        ));
        if self.consumer.consume(request, buffer, None, cancel).await? == StreamOutcome::Cancelled {
            return Ok(Session::Cancelled);
        }

        let extension: ExtensionOutcome = self
            .extension
            .run(
                buffer,
                |current| {
                    self.config.tune(prompts::continuation(
                        novel,
                        chapter,
                        context,
                        current.text(),
                        current.word_count(),
                        current.target_words(),
                    ))
                },
                cancel,
            )
            .await?;
        if extension.cancelled {
            return Ok(Session::Cancelled);
        }

        self.publish_phase(buffer, ChapterPhase::Summarizing);
        let request = self.config.tune(prompts::summary(
            novel,
            chapter,
            buffer.text(),
            self.config.summary_max_chars,
        ));
        let summary = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(Session::Cancelled),
            completion = self.generator.complete(request) => completion,
        };
        let summary = match summary {
            Ok(completion) => {
                if let Some(usage) = completion.usage {
                    self.store
                        .apply(NovelMutation::RecordUsage(usage))
                        .map_err(internal)?;
                }
                Some(completion.text.trim().to_string()).filter(|s| !s.is_empty())
            }
            Err(GenerationError::Cancelled) => return Ok(Session::Cancelled),
            Err(e) => {
                tracing::warn!(
                    chapter = %buffer.chapter(),
                    error = %e,
                    "Summary failed, keeping previous summary"
                );
                None
            }
        };
        let summary_updated = summary.is_some();

        self.store
            .apply(NovelMutation::FinishChapter {
                chapter: buffer.chapter(),
                summary,
            })
            .map_err(internal)?;

        if extension.status == LengthStatus::UnderTarget {
            tracing::warn!(
                chapter = %buffer.chapter(),
                words = buffer.word_count(),
                target = buffer.target_words(),
                iterations = extension.iterations,
                "Chapter finished under target length"
            );
        }
        tracing::info!(
            chapter = %buffer.chapter(),
            words = buffer.word_count(),
            iterations = extension.iterations,
            "Chapter generation completed"
        );

        self.publish_phase(buffer, ChapterPhase::Done);
        self.events.publish(GenerationEvent::ChapterCompleted {
            novel_id: buffer.novel_id(),
            chapter_id: buffer.chapter(),
            word_count: buffer.word_count(),
            target_words: buffer.target_words(),
            iterations: extension.iterations,
            length: extension.status,
        });

        Ok(Session::Finished(ChapterReport {
            chapter: buffer.chapter(),
            word_count: buffer.word_count(),
            target_words: buffer.target_words(),
            iterations: extension.iterations,
            length: extension.status,
            summary_updated,
        }))
    }

    fn publish_phase(&self, buffer: &ChapterBuffer, phase: ChapterPhase) {
        self.events.publish(GenerationEvent::ChapterPhaseChanged {
            novel_id: buffer.novel_id(),
            chapter_id: buffer.chapter(),
            phase,
        });
    }
}

fn internal(err: NovelError) -> GenerationError {
    GenerationError::Internal(err.to_string())
}
