//! Novel HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::ports::NovelListing;
use crate::application::{
    CreateNovel, DeleteNovel, EditChapter, GetCurrentNovel, ListNovels, LoadNovel, SaveNovel,
    SelectChapter, SetTitle, UpdateSettings,
};
use crate::domain::novel::{ChapterId, NovelId};
use crate::infrastructure::http::dto::{
    ApiResponse, ChapterRequest, CreateNovelRequest, CreatedResponse, EditChapterRequest, Empty,
    NovelIdRequest, NovelResponse, SaveResponse, UpdateSettingsRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

fn current(state: &AppState) -> NovelResponse {
    NovelResponse::from(state.get_current_novel_handler.handle(GetCurrentNovel))
}

/// 新建文档（替换当前文档）
pub async fn create_novel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateNovelRequest>,
) -> Result<Json<ApiResponse<CreatedResponse>>, ApiError> {
    let command = CreateNovel {
        title: req.title,
        settings: req.settings.unwrap_or_default(),
    };
    let id = state.create_novel_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(CreatedResponse {
        id: *id.as_uuid(),
    })))
}

/// 加载已保存的文档
pub async fn load_novel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NovelIdRequest>,
) -> Result<Json<ApiResponse<NovelResponse>>, ApiError> {
    let command = LoadNovel {
        novel_id: NovelId::from_uuid(req.id),
    };
    state.load_novel_handler.handle(command).await?;

    Ok(Json(ApiResponse::success(current(&state))))
}

/// 获取当前文档
pub async fn current_novel(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<NovelResponse>> {
    Json(ApiResponse::success(current(&state)))
}

/// 列出已保存文档
pub async fn list_novels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<NovelListing>>>, ApiError> {
    let novels = state.list_novels_handler.handle(ListNovels).await?;
    Ok(Json(ApiResponse::success(novels)))
}

/// 删除已保存文档
pub async fn delete_novel(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NovelIdRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let command = DeleteNovel {
        novel_id: NovelId::from_uuid(req.id),
    };
    state.delete_novel_handler.handle(command).await?;

    Ok(Json(ApiResponse::ok()))
}

/// 手动保存
pub async fn save_novel(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SaveResponse>>, ApiError> {
    let outcome = state.save_novel_handler.handle(SaveNovel).await?;
    Ok(Json(ApiResponse::success(SaveResponse::from(outcome))))
}

/// 修改标题和/或创作设置
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<NovelResponse>>, ApiError> {
    if req.title.is_none() && req.settings.is_none() {
        return Err(ApiError::BadRequest(
            "Either title or settings is required".to_string(),
        ));
    }

    if let Some(settings) = req.settings {
        state
            .update_settings_handler
            .handle(UpdateSettings { settings })
            .await?;
    }
    if let Some(title) = req.title {
        state.set_title_handler.handle(SetTitle { title }).await?;
    }

    Ok(Json(ApiResponse::success(current(&state))))
}

/// 切换当前章节
pub async fn select_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    state
        .select_chapter_handler
        .handle(SelectChapter {
            chapter_id: req.id(),
        })
        .await?;

    Ok(Json(ApiResponse::ok()))
}

/// 手动编辑章节正文
pub async fn edit_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EditChapterRequest>,
) -> Result<Json<ApiResponse<Empty>>, ApiError> {
    let command = EditChapter {
        chapter_id: ChapterId::new(req.chapter_id),
        content: req.content,
    };
    state.edit_chapter_handler.handle(command).await?;

    Ok(Json(ApiResponse::ok()))
}
