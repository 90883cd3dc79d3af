//! WebSocket Handler - 生成事件推送

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::domain::novel::NovelId;
use crate::infrastructure::http::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// 只接收某一文档的事件；为空时接收全部
    pub novel_id: Option<Uuid>,
}

/// 事件 WebSocket 连接处理
pub async fn events_websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<EventsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let novel_id = query.novel_id.map(NovelId::from_uuid);
    ws.on_upgrade(move |socket| handle_events_socket(socket, novel_id, state))
}

async fn handle_events_socket(socket: WebSocket, novel_id: Option<NovelId>, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut event_rx = match novel_id {
        Some(id) => state.event_publisher.subscribe_novel(id),
        None => state.event_publisher.subscribe_global(),
    };

    tracing::info!(novel_id = ?novel_id, "Events WebSocket connected");

    // 事件转发任务
    let mut forward_task = tokio::spawn(async move {
        loop {
            let event = match event_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    // 客户端太慢，丢弃的片段可以从 /api/novel/current 补齐
                    tracing::warn!(skipped, "Events WebSocket lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let msg = match serde_json::to_string(&event) {
                Ok(json) => Message::Text(json),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to serialize event");
                    continue;
                }
            };

            if let Err(e) = sender.send(msg).await {
                tracing::debug!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    // 接收客户端消息（心跳）
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::info!("Events WebSocket closed by client");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Events WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    // 任一任务结束即关闭另一个
    tokio::select! {
        _ = &mut forward_task => receive_task.abort(),
        _ = &mut receive_task => forward_task.abort(),
    }

    state.event_publisher.prune();
    tracing::info!(novel_id = ?novel_id, "Events WebSocket disconnected");
}
