//! 生成编排流水线
//!
//! - stream: 流式消费，逐片段写入文档并发布事件
//! - extension: 续写直到达到目标字数
//! - chapter: 单章生成状态机
//! - batch: 多章节顺序批量生成（重试/退避/内容安全跳过）
//! - outline: 大纲与人物规划
//! - consistency: 一致性分析
//! - cancellation / retry: 取消令牌与重试策略

mod batch;
mod cancellation;
mod chapter;
mod consistency;
mod extension;
mod outline;
pub mod prompts;
mod retry;
mod stream;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

pub use batch::{BatchReport, BatchSequencer, SKIPPED_CHAPTER_MARKER};
pub use cancellation::{OperationGuard, OperationKind, OperationSlot};
pub use chapter::{ChapterGenerationOptions, ChapterGenerator, ChapterOutcome, ChapterReport};
pub use consistency::ConsistencyChecker;
pub use extension::{ExtensionLoop, ExtensionOutcome, PARAGRAPH_SEPARATOR};
pub use outline::{parse_outline, OutlineOutcome, OutlinePlanner};
pub use retry::{sleep_or_cancel, RetryDecision, RetryPolicy};
pub use stream::{ChapterBuffer, StreamConsumer, StreamOutcome};

use crate::application::ports::GenerationRequest;
use crate::domain::novel::MIN_CHAPTER_WORDS;
use crate::domain::DEFAULT_CONTEXT_BUDGET;

/// 生成流水线配置
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// 上下文正文尾部字符预算
    pub context_budget_chars: usize,
    /// 每章最多续写次数
    pub max_extension_iterations: u32,
    /// 单章目标字数下限
    pub min_chapter_words: u32,
    /// 批量生成时章节之间的间隔
    pub inter_chapter_delay: Duration,
    pub retry: RetryPolicy,
    /// 摘要最大长度（提示用）
    pub summary_max_chars: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            context_budget_chars: DEFAULT_CONTEXT_BUDGET,
            max_extension_iterations: 5,
            min_chapter_words: MIN_CHAPTER_WORDS,
            inter_chapter_delay: Duration::from_secs(5),
            retry: RetryPolicy::default(),
            summary_max_chars: 300,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl GenerationConfig {
    /// 填入采样参数
    pub fn tune(&self, mut request: GenerationRequest) -> GenerationRequest {
        request.temperature = request.temperature.or(self.temperature);
        request.max_tokens = request.max_tokens.or(self.max_tokens);
        request
    }
}
