//! 续写循环
//!
//! 初稿不足目标字数时反复请求续写，直到达标或次数用尽。
//! 单章和批量两条路径共用

use tokio_util::sync::CancellationToken;

use super::stream::{ChapterBuffer, StreamConsumer, StreamOutcome};
use crate::application::ports::{
    ChapterPhase, GenerationError, GenerationEvent, GenerationRequest, LengthStatus,
};

/// 续写片段前的段落分隔
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// 续写结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionOutcome {
    /// 实际续写次数
    pub iterations: u32,
    pub word_count: usize,
    pub status: LengthStatus,
    pub cancelled: bool,
}

/// 续写循环
#[derive(Clone)]
pub struct ExtensionLoop {
    consumer: StreamConsumer,
    max_iterations: u32,
}

impl ExtensionLoop {
    pub fn new(consumer: StreamConsumer, max_iterations: u32) -> Self {
        Self {
            consumer,
            max_iterations,
        }
    }

    /// 执行续写
    ///
    /// `request_for` 根据当前缓冲生成续写请求。
    /// 后端返回空内容时同样计一次，保证在上限内结束
    pub async fn run<F>(
        &self,
        buffer: &mut ChapterBuffer,
        request_for: F,
        cancel: &CancellationToken,
    ) -> Result<ExtensionOutcome, GenerationError>
    where
        F: Fn(&ChapterBuffer) -> GenerationRequest,
    {
        let mut iterations = 0;

        while !buffer.reached_target() && iterations < self.max_iterations {
            if cancel.is_cancelled() {
                return Ok(Self::outcome(buffer, iterations, true));
            }

            iterations += 1;
            tracing::debug!(
                chapter = %buffer.chapter(),
                iteration = iterations,
                words = buffer.word_count(),
                target = buffer.target_words(),
                "Extending chapter"
            );
            self.consumer.events().publish(GenerationEvent::ChapterPhaseChanged {
                novel_id: buffer.novel_id(),
                chapter_id: buffer.chapter(),
                phase: ChapterPhase::Extending(iterations),
            });

            let request = request_for(buffer);
            let outcome = self
                .consumer
                .consume(request, buffer, Some(PARAGRAPH_SEPARATOR), cancel)
                .await?;
            if outcome == StreamOutcome::Cancelled {
                return Ok(Self::outcome(buffer, iterations, true));
            }
        }

        Ok(Self::outcome(buffer, iterations, false))
    }

    fn outcome(buffer: &ChapterBuffer, iterations: u32, cancelled: bool) -> ExtensionOutcome {
        ExtensionOutcome {
            iterations,
            word_count: buffer.word_count(),
            status: if buffer.reached_target() {
                LengthStatus::OnTarget
            } else {
                LengthStatus::UnderTarget
            },
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generation::test_support::{words, Harness};
    use crate::domain::novel::ChapterId;
    use crate::infrastructure::adapters::ScriptedStep;

    fn seeded(harness: &Harness, id: ChapterId, target: u32, initial: usize) -> ChapterBuffer {
        harness.begin(id);
        harness.generator.push_stream(vec![ScriptedStep::text(&words(initial))]);
        harness.buffer(id, target)
    }

    #[tokio::test]
    async fn test_extends_until_target() {
        let harness = Harness::with_chapters(1);
        let id = ChapterId::new(1);
        let mut buffer = seeded(&harness, id, 30, 10);
        let cancel = CancellationToken::new();
        harness
            .consumer()
            .consume(GenerationRequest::default(), &mut buffer, None, &cancel)
            .await
            .unwrap();

        harness.generator.push_stream(vec![ScriptedStep::text(&words(12))]);
        harness.generator.push_stream(vec![ScriptedStep::text(&words(12))]);
        harness.generator.push_stream(vec![ScriptedStep::text(&words(12))]);

        let outcome = ExtensionLoop::new(harness.consumer(), 5)
            .run(&mut buffer, |_| GenerationRequest::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.word_count, 34);
        assert_eq!(outcome.status, LengthStatus::OnTarget);
        assert!(!outcome.cancelled);
        assert_eq!(harness.content(id), buffer.text());
        assert_eq!(buffer.text().matches(PARAGRAPH_SEPARATOR).count(), 2);
    }

    #[tokio::test]
    async fn test_empty_fragments_still_terminate() {
        let harness = Harness::with_chapters(1);
        let id = ChapterId::new(1);
        let mut buffer = seeded(&harness, id, 1_000, 5);
        let cancel = CancellationToken::new();
        harness
            .consumer()
            .consume(GenerationRequest::default(), &mut buffer, None, &cancel)
            .await
            .unwrap();
        let before = buffer.text().to_string();

        // 没有脚本时后端返回空流
        let outcome = ExtensionLoop::new(harness.consumer(), 5)
            .run(&mut buffer, |_| GenerationRequest::default(), &cancel)
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 5);
        assert_eq!(outcome.status, LengthStatus::UnderTarget);
        assert_eq!(buffer.text(), before);
        assert_eq!(harness.generator.stream_requests().len(), 6);
    }

    #[tokio::test]
    async fn test_content_never_shrinks() {
        let harness = Harness::with_chapters(1);
        let id = ChapterId::new(1);
        let mut buffer = seeded(&harness, id, 100, 10);
        let cancel = CancellationToken::new();
        harness
            .consumer()
            .consume(GenerationRequest::default(), &mut buffer, None, &cancel)
            .await
            .unwrap();

        for size in [3, 0, 7] {
            harness.generator.push_stream(vec![ScriptedStep::text(&words(size))]);
        }

        let mut lengths = vec![buffer.text().len()];
        let extension = ExtensionLoop::new(harness.consumer(), 1);
        for _ in 0..3 {
            extension
                .run(&mut buffer, |_| GenerationRequest::default(), &cancel)
                .await
                .unwrap();
            lengths.push(buffer.text().len());
        }

        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(buffer.word_count(), 20);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_iteration() {
        let harness = Harness::with_chapters(1);
        let id = ChapterId::new(1);
        harness.begin(id);
        let mut buffer = harness.buffer(id, 100);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = ExtensionLoop::new(harness.consumer(), 5)
            .run(&mut buffer, |_| GenerationRequest::default(), &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.iterations, 0);
        assert!(harness.generator.stream_requests().is_empty());
    }
}
