//! Generation HTTP Handlers
//!
//! 生成操作在后台任务中运行，接口立即返回；
//! 进度与结果通过 /ws/events 推送

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{
    AutoGenerate, GenerateChapter, OperationKind, PlanOutline, StopGeneration,
};
use crate::domain::novel::ChapterId;
use crate::infrastructure::http::dto::{
    ApiResponse, GenerateChapterRequest, OperationStarted, PlanOutlineRequest, StopResponse,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 请求的章节必须存在
pub(super) fn ensure_chapter(state: &AppState, id: ChapterId) -> Result<(), ApiError> {
    state
        .store
        .snapshot()
        .chapter(id)
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Chapter not found: {}", id)))
}

/// 规划大纲与人物
pub async fn plan_outline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanOutlineRequest>,
) -> Result<Json<ApiResponse<OperationStarted>>, ApiError> {
    if req.premise.trim().is_empty() {
        return Err(ApiError::BadRequest("Premise must not be empty".to_string()));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        let command = PlanOutline {
            premise: req.premise,
        };
        match task_state.plan_outline_handler.handle(command).await {
            Ok(outcome) => tracing::info!(outcome = ?outcome, "Outline planning finished"),
            Err(e) => tracing::error!(error = %e, "Outline planning failed"),
        }
    });

    Ok(Json(ApiResponse::success(OperationStarted {
        operation: OperationKind::Outline,
    })))
}

/// 生成单章（force_rewrite 时清空重写）
pub async fn generate_chapter(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateChapterRequest>,
) -> Result<Json<ApiResponse<OperationStarted>>, ApiError> {
    let chapter_id = ChapterId::new(req.chapter_id);
    ensure_chapter(&state, chapter_id)?;

    let task_state = state.clone();
    tokio::spawn(async move {
        let command = GenerateChapter {
            chapter_id,
            force_rewrite: req.force_rewrite,
        };
        match task_state.generate_chapter_handler.handle(command).await {
            Ok(outcome) => tracing::info!(
                chapter_id = %chapter_id,
                outcome = ?outcome,
                "Chapter generation finished"
            ),
            Err(e) => tracing::error!(chapter_id = %chapter_id, error = %e, "Chapter generation failed"),
        }
    });

    Ok(Json(ApiResponse::success(OperationStarted {
        operation: OperationKind::Chapter,
    })))
}

/// 顺序生成所有未完成章节
pub async fn auto_generate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<OperationStarted>>, ApiError> {
    if state.store.snapshot().chapters().is_empty() {
        return Err(ApiError::Conflict(
            "Novel has no outline to generate from".to_string(),
        ));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        match task_state.auto_generate_handler.handle(AutoGenerate).await {
            Ok(report) => tracing::info!(
                generated = report.generated,
                skipped = report.skipped,
                cancelled = report.cancelled,
                "Auto-generation finished"
            ),
            Err(e) => tracing::error!(error = %e, "Auto-generation failed"),
        }
    });

    Ok(Json(ApiResponse::success(OperationStarted {
        operation: OperationKind::AutoGenerate,
    })))
}

/// 停止当前生成
pub async fn stop_generation(State(state): State<Arc<AppState>>) -> Json<ApiResponse<StopResponse>> {
    let stopped = state.stop_generation_handler.handle(StopGeneration);
    Json(ApiResponse::success(StopResponse { stopped }))
}
