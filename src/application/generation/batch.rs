//! 批量生成
//!
//! 按 id 顺序生成所有未完成章节:
//! - 已完成章节只并入滚动上下文
//! - 相邻两次生成之间固定间隔
//! - 内容安全拒绝：追加跳过标记，视为完成并继续
//! - 限流 / 网络故障：退避后用同一上下文重试
//! - 其他错误或重试用尽：中止，后续章节不动

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::chapter::{ChapterGenerationOptions, ChapterGenerator, ChapterOutcome};
use super::retry::{sleep_or_cancel, RetryDecision};
use crate::application::error::ApplicationError;
use crate::application::ports::{ErrorClass, GenerationEvent, GenerationEventPort, NovelStorePort};
use crate::domain::novel::{ChapterId, NovelId, NovelMutation};
use crate::domain::RollingContext;

/// 内容安全跳过标记
pub const SKIPPED_CHAPTER_MARKER: &str =
    "[Chapter skipped: the provider's safety filter rejected this chapter. Edit the outline or rewrite it manually.]";

/// 批量生成报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// 本次生成完成的章节
    pub generated: usize,
    /// 因内容安全跳过的章节
    pub skipped: usize,
    /// 开始前已完成的章节
    pub already_done: usize,
    pub cancelled: bool,
}

enum Step {
    Generated,
    Skipped,
    Cancelled,
}

/// 批量生成器
#[derive(Clone)]
pub struct BatchSequencer {
    chapters: ChapterGenerator,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
}

impl BatchSequencer {
    pub fn new(
        chapters: ChapterGenerator,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
    ) -> Self {
        Self {
            chapters,
            store,
            events,
        }
    }

    /// 运行批量生成
    pub async fn run(&self, cancel: CancellationToken) -> Result<BatchReport, ApplicationError> {
        let novel = self.store.snapshot();
        let novel_id = novel.id();
        let ids = novel.chapter_ids();
        let total = ids.len();
        let config = self.chapters.config().clone();

        let mut rolling = RollingContext::new(config.context_budget_chars);
        let mut report = BatchReport::default();
        let mut attempted_any = false;

        tracing::info!(novel_id = %novel_id, chapters = total, "Auto-generation started");

        for id in ids {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            // 每章都读最新状态，前序章节的最终结果决定上下文
            let current = self.store.snapshot();
            let Some(chapter) = current.chapter(id) else {
                continue;
            };
            if chapter.is_done() {
                rolling.fold(chapter);
                report.already_done += 1;
                continue;
            }

            if attempted_any && !sleep_or_cancel(config.inter_chapter_delay, &cancel).await {
                report.cancelled = true;
                break;
            }
            attempted_any = true;

            match self.generate_with_retry(novel_id, id, &rolling, &cancel).await? {
                Step::Generated => report.generated += 1,
                Step::Skipped => report.skipped += 1,
                Step::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }

            let after = self.store.snapshot();
            if let Some(chapter) = after.chapter(id) {
                rolling.fold(chapter);
            }
            self.events.publish(GenerationEvent::BatchStep {
                novel_id,
                chapter_id: id,
                done: after.done_count(),
                total,
            });
        }

        tracing::info!(
            novel_id = %novel_id,
            generated = report.generated,
            skipped = report.skipped,
            cancelled = report.cancelled,
            "Auto-generation finished"
        );
        self.events.publish(GenerationEvent::BatchFinished {
            novel_id,
            generated: report.generated,
            skipped: report.skipped,
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    async fn generate_with_retry(
        &self,
        novel_id: NovelId,
        id: ChapterId,
        rolling: &RollingContext,
        cancel: &CancellationToken,
    ) -> Result<Step, ApplicationError> {
        let policy = self.chapters.config().retry;
        let context = rolling.window();
        let mut retries = 0;

        loop {
            let options = ChapterGenerationOptions {
                context: Some(context.clone()),
                ..Default::default()
            };
            let err = match self.chapters.generate(id, options, cancel.clone()).await {
                Ok(ChapterOutcome::Completed(_)) => return Ok(Step::Generated),
                Ok(ChapterOutcome::Cancelled) => return Ok(Step::Cancelled),
                Err(err) => err,
            };

            let Some(class) = failure_class(&err) else {
                return Err(self.halt(novel_id, id, err));
            };

            match policy.decide(class, retries) {
                RetryDecision::Retry { delay } => {
                    retries += 1;
                    tracing::warn!(
                        chapter = %id,
                        attempt = retries,
                        delay_secs = delay.as_secs(),
                        class = class.as_str(),
                        "Retrying chapter after backoff"
                    );
                    self.events.publish(GenerationEvent::RetryScheduled {
                        novel_id,
                        chapter_id: id,
                        attempt: retries,
                        delay_secs: delay.as_secs(),
                        class,
                    });
                    if !sleep_or_cancel(delay, cancel).await {
                        return Ok(Step::Cancelled);
                    }
                }
                RetryDecision::Skip => {
                    self.skip(novel_id, id, &err)?;
                    return Ok(Step::Skipped);
                }
                RetryDecision::Halt => return Err(self.halt(novel_id, id, err)),
            }
        }
    }

    fn skip(
        &self,
        novel_id: NovelId,
        id: ChapterId,
        err: &ApplicationError,
    ) -> Result<(), ApplicationError> {
        let has_content = self
            .store
            .snapshot()
            .chapter(id)
            .is_some_and(|c| !c.content().is_empty());
        let note = if has_content {
            format!("\n\n{SKIPPED_CHAPTER_MARKER}")
        } else {
            SKIPPED_CHAPTER_MARKER.to_string()
        };

        self.store.apply(NovelMutation::SkipChapter { chapter: id, note })?;
        tracing::warn!(chapter = %id, error = %err, "Chapter skipped by content policy");
        self.events.publish(GenerationEvent::ChapterSkipped {
            novel_id,
            chapter_id: id,
            reason: err.to_string(),
        });
        Ok(())
    }

    fn halt(&self, novel_id: NovelId, id: ChapterId, err: ApplicationError) -> ApplicationError {
        if let Err(stop_err) = self.store.apply(NovelMutation::StopChapter(id)) {
            tracing::warn!(chapter = %id, error = %stop_err, "Failed to clear generating flag");
        }
        let title = self
            .store
            .snapshot()
            .chapter(id)
            .map(|c| c.title().to_string())
            .unwrap_or_default();
        let message = match &err {
            ApplicationError::GenerationFailed { message, .. } => message.clone(),
            other => other.to_string(),
        };

        tracing::error!(chapter = %id, title = %title, error = %message, "Auto-generation halted");
        self.events.publish(GenerationEvent::BatchHalted {
            novel_id,
            chapter_id: id,
            title: title.clone(),
            error: message.clone(),
        });
        ApplicationError::BatchHalted {
            chapter: id,
            title,
            message,
        }
    }
}

fn failure_class(err: &ApplicationError) -> Option<ErrorClass> {
    match err {
        ApplicationError::GenerationFailed { class, .. } => Some(*class),
        _ => None,
    }
}
