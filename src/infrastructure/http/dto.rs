//! Data Transfer Objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{CurrentNovelResponse, OperationKind, SaveOutcome};
use crate::domain::count_words;
use crate::domain::novel::{
    Chapter, ChapterId, NovelSettings, NovelStatus, TokenUsage, Volume,
};

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

/// 空数据响应
#[derive(Debug, Serialize)]
pub struct Empty {}

impl ApiResponse<Empty> {
    /// 成功但无数据
    pub fn ok() -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(Empty {}),
        }
    }
}

// ============================================================================
// Novel DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateNovelRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub settings: Option<NovelSettings>,
}

#[derive(Debug, Deserialize)]
pub struct NovelIdRequest {
    pub id: Uuid,
}

/// 设置与标题可单独提交
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub settings: Option<NovelSettings>,
}

#[derive(Debug, Deserialize)]
pub struct EditChapterRequest {
    pub chapter_id: u32,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ChapterRequest {
    pub chapter_id: u32,
}

impl ChapterRequest {
    pub fn id(&self) -> ChapterId {
        ChapterId::new(self.chapter_id)
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub id: ChapterId,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub word_count: usize,
    pub is_generating: bool,
    pub is_done: bool,
    pub volume: Option<Volume>,
    pub consistency_analysis: Option<String>,
}

impl From<&Chapter> for ChapterResponse {
    fn from(chapter: &Chapter) -> Self {
        Self {
            id: chapter.id(),
            title: chapter.title().to_string(),
            summary: chapter.summary().to_string(),
            content: chapter.content().to_string(),
            word_count: count_words(chapter.content()),
            is_generating: chapter.is_generating(),
            is_done: chapter.is_done(),
            volume: chapter.volume().cloned(),
            consistency_analysis: chapter.consistency_analysis().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NovelResponse {
    pub id: Uuid,
    pub title: String,
    pub premise: String,
    pub characters: String,
    pub status: NovelStatus,
    pub settings: NovelSettings,
    pub usage: TokenUsage,
    pub current_chapter: Option<ChapterId>,
    pub done_count: usize,
    pub chapters: Vec<ChapterResponse>,
    pub active_operation: Option<OperationKind>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CurrentNovelResponse> for NovelResponse {
    fn from(current: CurrentNovelResponse) -> Self {
        let novel = current.novel;
        Self {
            id: *novel.id().as_uuid(),
            title: novel.title().to_string(),
            premise: novel.premise().to_string(),
            characters: novel.characters().to_string(),
            status: novel.status(),
            settings: novel.settings().clone(),
            usage: novel.usage(),
            current_chapter: novel.current_chapter(),
            done_count: novel.done_count(),
            chapters: novel.chapters().iter().map(ChapterResponse::from).collect(),
            active_operation: current.active_operation,
            created_at: novel.created_at(),
            updated_at: novel.updated_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub saved: bool,
    pub id: Option<Uuid>,
}

impl From<SaveOutcome> for SaveResponse {
    fn from(outcome: SaveOutcome) -> Self {
        match outcome {
            SaveOutcome::Saved(id) => Self {
                saved: true,
                id: Some(*id.as_uuid()),
            },
            SaveOutcome::SkippedUntitled => Self {
                saved: false,
                id: None,
            },
        }
    }
}

// ============================================================================
// Generation DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PlanOutlineRequest {
    pub premise: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateChapterRequest {
    pub chapter_id: u32,
    #[serde(default)]
    pub force_rewrite: bool,
}

/// 后台操作已启动，结果通过 WebSocket 事件返回
#[derive(Debug, Serialize)]
pub struct OperationStarted {
    pub operation: OperationKind,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}
