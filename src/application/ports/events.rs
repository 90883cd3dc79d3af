//! Generation Event Port - 生成进度事件
//!
//! 应用层在每个片段、每次章节状态变化、每个批量步骤之后发布事件，
//! 具体推送方式（WebSocket 等）由 infrastructure/events 实现

use serde::{Deserialize, Serialize};

use crate::application::ports::ErrorClass;
use crate::domain::novel::{ChapterId, NovelId};

/// 单章生成阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "iteration", rename_all = "snake_case")]
pub enum ChapterPhase {
    Idle,
    StreamingInitial,
    /// 第 n 次续写
    Extending(u32),
    Summarizing,
    Done,
    Aborted,
    Failed,
}

/// 完成时的篇幅状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthStatus {
    /// 达到目标字数
    OnTarget,
    /// 续写次数用尽仍未达标
    UnderTarget,
}

/// 生成事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum GenerationEvent {
    /// 章节阶段变化
    ChapterPhaseChanged {
        novel_id: NovelId,
        chapter_id: ChapterId,
        phase: ChapterPhase,
    },
    /// 流式片段
    ChapterDelta {
        novel_id: NovelId,
        chapter_id: ChapterId,
        delta: String,
        word_count: usize,
        progress: u8,
    },
    /// 章节完成
    ChapterCompleted {
        novel_id: NovelId,
        chapter_id: ChapterId,
        word_count: usize,
        target_words: u32,
        iterations: u32,
        length: LengthStatus,
    },
    /// 章节失败（单章模式）
    ChapterFailed {
        novel_id: NovelId,
        chapter_id: ChapterId,
        class: ErrorClass,
        error: String,
    },
    /// 章节因内容安全被跳过
    ChapterSkipped {
        novel_id: NovelId,
        chapter_id: ChapterId,
        reason: String,
    },
    /// 即将重试
    RetryScheduled {
        novel_id: NovelId,
        chapter_id: ChapterId,
        attempt: u32,
        delay_secs: u64,
        class: ErrorClass,
    },
    /// 批量生成前进一步
    BatchStep {
        novel_id: NovelId,
        chapter_id: ChapterId,
        done: usize,
        total: usize,
    },
    /// 批量生成结束（完成或取消）
    BatchFinished {
        novel_id: NovelId,
        generated: usize,
        skipped: usize,
        cancelled: bool,
    },
    /// 批量生成中止
    BatchHalted {
        novel_id: NovelId,
        chapter_id: ChapterId,
        title: String,
        error: String,
    },
    /// 大纲生成完成
    OutlineReady { novel_id: NovelId, chapters: usize },
    /// 大纲生成失败
    OutlineFailed { novel_id: NovelId, error: String },
    /// 一致性分析完成
    ConsistencyAnalyzed {
        novel_id: NovelId,
        chapter_id: ChapterId,
    },
    /// 文档已保存
    NovelSaved { novel_id: NovelId },
    /// 自动保存失败
    SaveFailed { novel_id: NovelId, error: String },
}

impl GenerationEvent {
    /// 事件所属文档
    pub fn novel_id(&self) -> NovelId {
        match self {
            GenerationEvent::ChapterPhaseChanged { novel_id, .. }
            | GenerationEvent::ChapterDelta { novel_id, .. }
            | GenerationEvent::ChapterCompleted { novel_id, .. }
            | GenerationEvent::ChapterFailed { novel_id, .. }
            | GenerationEvent::ChapterSkipped { novel_id, .. }
            | GenerationEvent::RetryScheduled { novel_id, .. }
            | GenerationEvent::BatchStep { novel_id, .. }
            | GenerationEvent::BatchFinished { novel_id, .. }
            | GenerationEvent::BatchHalted { novel_id, .. }
            | GenerationEvent::OutlineReady { novel_id, .. }
            | GenerationEvent::OutlineFailed { novel_id, .. }
            | GenerationEvent::ConsistencyAnalyzed { novel_id, .. }
            | GenerationEvent::NovelSaved { novel_id }
            | GenerationEvent::SaveFailed { novel_id, .. } => *novel_id,
        }
    }
}

/// Generation Event Port
pub trait GenerationEventPort: Send + Sync {
    fn publish(&self, event: GenerationEvent);
}
