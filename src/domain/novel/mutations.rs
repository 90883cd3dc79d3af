//! Novel Context - 文档变更
//!
//! 文档的所有修改都表达为 `NovelMutation`，统一经由 `Novel::apply` 执行

use serde::{Deserialize, Serialize};

use super::{ChapterId, NovelSettings, TokenUsage, Volume};

/// 大纲条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineEntry {
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub volume: Option<Volume>,
}

/// 文档变更
#[derive(Debug, Clone, PartialEq)]
pub enum NovelMutation {
    SetTitle(String),
    UpdateSettings(NovelSettings),
    SelectChapter(ChapterId),

    /// Idle -> Planning
    BeginPlanning { premise: String },
    /// Planning -> Ready，按大纲重建章节列表
    CompleteOutline {
        entries: Vec<OutlineEntry>,
        characters: String,
    },
    /// Planning -> Idle
    AbandonPlanning,

    /// 进入生成状态
    BeginChapter(ChapterId),
    /// 追加流式片段
    AppendContent { chapter: ChapterId, delta: String },
    /// 清除生成标记（取消/失败），保留已生成内容
    StopChapter(ChapterId),
    /// 完成章节，可选地替换梗概
    FinishChapter {
        chapter: ChapterId,
        summary: Option<String>,
    },
    /// 清空内容并取消完成标记（强制重写）
    ResetChapter(ChapterId),
    /// 因内容安全被跳过：追加标记并视为完成
    SkipChapter { chapter: ChapterId, note: String },
    /// 用户手动编辑
    EditChapter { chapter: ChapterId, content: String },
    SetConsistencyAnalysis {
        chapter: ChapterId,
        analysis: Option<String>,
    },

    RecordUsage(TokenUsage),
}

impl NovelMutation {
    /// 变更名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            NovelMutation::SetTitle(_) => "set_title",
            NovelMutation::UpdateSettings(_) => "update_settings",
            NovelMutation::SelectChapter(_) => "select_chapter",
            NovelMutation::BeginPlanning { .. } => "begin_planning",
            NovelMutation::CompleteOutline { .. } => "complete_outline",
            NovelMutation::AbandonPlanning => "abandon_planning",
            NovelMutation::BeginChapter(_) => "begin_chapter",
            NovelMutation::AppendContent { .. } => "append_content",
            NovelMutation::StopChapter(_) => "stop_chapter",
            NovelMutation::FinishChapter { .. } => "finish_chapter",
            NovelMutation::ResetChapter(_) => "reset_chapter",
            NovelMutation::SkipChapter { .. } => "skip_chapter",
            NovelMutation::EditChapter { .. } => "edit_chapter",
            NovelMutation::SetConsistencyAnalysis { .. } => "set_consistency_analysis",
            NovelMutation::RecordUsage(_) => "record_usage",
        }
    }
}
