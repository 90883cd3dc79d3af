//! 流式消费
//!
//! 打开后端流，把每个片段同时写入会话缓冲和文档，并发布进度事件。
//! 不做重试；取消不是错误

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    GenerationError, GenerationEvent, GenerationEventPort, GenerationRequest, NovelStorePort,
    StreamChunk, TextGeneratorPort,
};
use crate::domain::novel::{ChapterId, NovelId, NovelMutation};
use crate::domain::{count_words, progress_percent};

/// 单章生成会话的文本缓冲
///
/// 与文档中该章节的内容保持一致（同一片段先写文档再进缓冲）
#[derive(Debug, Clone)]
pub struct ChapterBuffer {
    novel_id: NovelId,
    chapter: ChapterId,
    target_words: u32,
    text: String,
    word_count: usize,
}

impl ChapterBuffer {
    pub fn new(novel_id: NovelId, chapter: ChapterId, target_words: u32) -> Self {
        Self {
            novel_id,
            chapter,
            target_words,
            text: String::new(),
            word_count: 0,
        }
    }

    pub fn novel_id(&self) -> NovelId {
        self.novel_id
    }

    pub fn chapter(&self) -> ChapterId {
        self.chapter
    }

    pub fn target_words(&self) -> u32 {
        self.target_words
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn progress(&self) -> u8 {
        progress_percent(self.word_count, self.target_words)
    }

    pub fn reached_target(&self) -> bool {
        self.word_count >= self.target_words as usize
    }

    fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
        self.word_count = count_words(&self.text);
    }
}

/// 流结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// 后端流正常结束
    Completed { fragments: usize },
    /// 被取消，已写入内容保留
    Cancelled,
}

/// 流式消费器
#[derive(Clone)]
pub struct StreamConsumer {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
}

impl StreamConsumer {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
    ) -> Self {
        Self {
            generator,
            store,
            events,
        }
    }

    pub(super) fn events(&self) -> &Arc<dyn GenerationEventPort> {
        &self.events
    }

    /// 消费一次流式生成
    ///
    /// `prefix` 只在第一个非空片段之前写入一次，且缓冲为空时不写
    pub async fn consume(
        &self,
        request: GenerationRequest,
        buffer: &mut ChapterBuffer,
        prefix: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, GenerationError> {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Cancelled);
        }

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
            opened = self.generator.generate(request, cancel.clone()) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(GenerationError::Cancelled) => return Ok(StreamOutcome::Cancelled),
            Err(e) => return Err(e),
        };

        let mut pending_prefix = prefix.filter(|p| !p.is_empty() && !buffer.text().is_empty());
        let mut fragments = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(StreamOutcome::Cancelled),
                next = stream.next() => next,
            };

            match next {
                None => break,
                Some(Ok(StreamChunk::Text(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    let delta = match pending_prefix.take() {
                        Some(prefix) => format!("{prefix}{text}"),
                        None => text,
                    };
                    self.append(buffer, delta)?;
                    fragments += 1;
                }
                Some(Ok(StreamChunk::Usage(usage))) => {
                    self.store
                        .apply(NovelMutation::RecordUsage(usage))
                        .map_err(|e| GenerationError::Internal(e.to_string()))?;
                }
                Some(Err(GenerationError::Cancelled)) => return Ok(StreamOutcome::Cancelled),
                Some(Err(e)) => {
                    tracing::warn!(
                        chapter = %buffer.chapter(),
                        fragments,
                        error = %e,
                        "Stream failed"
                    );
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            chapter = %buffer.chapter(),
            fragments,
            words = buffer.word_count(),
            "Stream finished"
        );
        Ok(StreamOutcome::Completed { fragments })
    }

    fn append(&self, buffer: &mut ChapterBuffer, delta: String) -> Result<(), GenerationError> {
        self.store
            .apply(NovelMutation::AppendContent {
                chapter: buffer.chapter(),
                delta: delta.clone(),
            })
            .map_err(|e| GenerationError::Internal(e.to_string()))?;
        buffer.push(&delta);

        self.events.publish(GenerationEvent::ChapterDelta {
            novel_id: buffer.novel_id(),
            chapter_id: buffer.chapter(),
            delta,
            word_count: buffer.word_count(),
            progress: buffer.progress(),
        });
        Ok(())
    }
}
