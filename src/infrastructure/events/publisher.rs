//! Event Publisher Implementation
//!
//! WebSocket 事件推送实现

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::{GenerationEvent, GenerationEventPort};
use crate::domain::novel::NovelId;

/// 默认通道容量（流式片段较多，留足余量）
const DEFAULT_CAPACITY: usize = 1024;

/// 事件发布器
pub struct EventPublisher {
    /// novel_id -> broadcast sender（只关心某一文档的订阅者）
    novel_channels: DashMap<NovelId, broadcast::Sender<GenerationEvent>>,
    /// 全局广播通道
    global_channel: broadcast::Sender<GenerationEvent>,
    capacity: usize,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (global_tx, _) = broadcast::channel(capacity);
        Self {
            novel_channels: DashMap::new(),
            global_channel: global_tx,
            capacity,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<GenerationEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅某一文档的事件
    pub fn subscribe_novel(&self, novel_id: NovelId) -> broadcast::Receiver<GenerationEvent> {
        self.novel_channels
            .entry(novel_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// 清理没有订阅者的文档通道
    pub fn prune(&self) {
        self.novel_channels
            .retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationEventPort for EventPublisher {
    fn publish(&self, event: GenerationEvent) {
        let novel_id = event.novel_id();

        if let Some(sender) = self.novel_channels.get(&novel_id) {
            if let Err(e) = sender.send(event.clone()) {
                tracing::trace!(
                    novel_id = %novel_id,
                    error = %e,
                    "Failed to publish novel event (no receivers)"
                );
            }
        }

        if let Err(e) = self.global_channel.send(event) {
            tracing::trace!(
                novel_id = %novel_id,
                error = %e,
                "Failed to publish event (no receivers)"
            );
        }
    }
}
