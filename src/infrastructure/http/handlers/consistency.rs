//! Consistency HTTP Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use super::generation::ensure_chapter;
use crate::application::{AnalyzeConsistency, OperationKind, RepairConsistency};
use crate::infrastructure::http::dto::{ApiResponse, ChapterRequest, OperationStarted};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 分析章节一致性，结果保存在章节上并推送 ConsistencyAnalyzed
pub async fn analyze_consistency(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterRequest>,
) -> Result<Json<ApiResponse<OperationStarted>>, ApiError> {
    let chapter_id = req.id();
    ensure_chapter(&state, chapter_id)?;

    let task_state = state.clone();
    tokio::spawn(async move {
        let command = AnalyzeConsistency { chapter_id };
        if let Err(e) = task_state.analyze_consistency_handler.handle(command).await {
            tracing::error!(chapter_id = %chapter_id, error = %e, "Consistency analysis failed");
        }
    });

    Ok(Json(ApiResponse::success(OperationStarted {
        operation: OperationKind::Consistency,
    })))
}

/// 按分析结果重写章节
pub async fn repair_consistency(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChapterRequest>,
) -> Result<Json<ApiResponse<OperationStarted>>, ApiError> {
    let chapter_id = req.id();
    let has_analysis = state
        .store
        .snapshot()
        .chapter(chapter_id)
        .ok_or_else(|| ApiError::NotFound(format!("Chapter not found: {}", chapter_id)))?
        .consistency_analysis()
        .is_some();
    if !has_analysis {
        return Err(ApiError::BadRequest(format!(
            "Chapter {} has no consistency analysis",
            chapter_id
        )));
    }

    let task_state = state.clone();
    tokio::spawn(async move {
        let command = RepairConsistency { chapter_id };
        match task_state.repair_consistency_handler.handle(command).await {
            Ok(outcome) => tracing::info!(
                chapter_id = %chapter_id,
                outcome = ?outcome,
                "Consistency repair finished"
            ),
            Err(e) => tracing::error!(chapter_id = %chapter_id, error = %e, "Consistency repair failed"),
        }
    });

    Ok(Json(ApiResponse::success(OperationStarted {
        operation: OperationKind::Chapter,
    })))
}
