//! Autosave Worker - 防抖自动保存
//!
//! 每次文档修改都重新计时，静默满防抖时长才写入仓储；
//! 手动保存立即写入并清除待触发的自动保存

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::application::ports::{
    AutosavePort, GenerationEvent, GenerationEventPort, NovelRepositoryPort, NovelStorePort,
    RepositoryError, SaveOutcome,
};

type SaveReply = oneshot::Sender<Result<SaveOutcome, RepositoryError>>;

/// Autosave 配置
#[derive(Debug, Clone)]
pub struct AutosaveConfig {
    /// 关闭时只响应手动保存
    pub enabled: bool,
    /// 防抖时长
    pub debounce: Duration,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce: Duration::from_secs(3),
        }
    }
}

/// 自动保存 Worker
pub struct AutosaveWorker {
    config: AutosaveConfig,
    store: Arc<dyn NovelStorePort>,
    repo: Arc<dyn NovelRepositoryPort>,
    events: Arc<dyn GenerationEventPort>,
    revisions: watch::Receiver<u64>,
    requests: mpsc::Receiver<SaveReply>,
}

/// 手动保存入口
#[derive(Clone)]
pub struct AutosaveHandle {
    sender: mpsc::Sender<SaveReply>,
}

impl AutosaveWorker {
    pub fn new(
        config: AutosaveConfig,
        store: Arc<dyn NovelStorePort>,
        repo: Arc<dyn NovelRepositoryPort>,
        events: Arc<dyn GenerationEventPort>,
    ) -> (Self, AutosaveHandle) {
        let (sender, requests) = mpsc::channel(8);
        let revisions = store.subscribe();
        let worker = Self {
            config,
            store,
            repo,
            events,
            revisions,
            requests,
        };
        (worker, AutosaveHandle { sender })
    }

    /// 启动 Worker
    pub async fn run(mut self) {
        tracing::info!(
            enabled = self.config.enabled,
            debounce_ms = self.config.debounce.as_millis() as u64,
            "AutosaveWorker started"
        );

        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                changed = self.revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if self.config.enabled {
                        deadline = Some(Instant::now() + self.config.debounce);
                    }
                }
                request = self.requests.recv() => {
                    let Some(reply) = request else {
                        break;
                    };
                    deadline = None;
                    let result = self.save().await;
                    if reply.send(result).is_err() {
                        tracing::debug!("Manual save caller went away");
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    // 后台保存失败只记录，不打断用户
                    if let Err(e) = self.save().await {
                        tracing::warn!(error = %e, "Autosave failed");
                    }
                }
            }
        }

        tracing::info!("AutosaveWorker stopped");
    }

    async fn save(&self) -> Result<SaveOutcome, RepositoryError> {
        let novel = self.store.snapshot();
        if !novel.has_title() {
            tracing::debug!("Skipping save of untitled document");
            return Ok(SaveOutcome::SkippedUntitled);
        }

        match self.repo.save(&novel).await {
            Ok(id) => {
                tracing::debug!(novel_id = %id, "Document saved");
                self.events.publish(GenerationEvent::NovelSaved { novel_id: id });
                Ok(SaveOutcome::Saved(id))
            }
            Err(e) => {
                self.events.publish(GenerationEvent::SaveFailed {
                    novel_id: novel.id(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[async_trait]
impl AutosavePort for AutosaveHandle {
    async fn save_now(&self) -> Result<SaveOutcome, RepositoryError> {
        let (reply, response) = oneshot::channel();
        let stopped = || RepositoryError::DatabaseError("autosave worker stopped".to_string());

        self.sender.send(reply).await.map_err(|_| stopped())?;
        response.await.map_err(|_| stopped())?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::application::ports::NovelListing;
    use crate::domain::novel::{Novel, NovelId, NovelMutation, NovelSettings};
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::InMemoryNovelStore;

    #[derive(Default)]
    struct CountingRepo {
        saves: AtomicUsize,
        fail: AtomicBool,
        last_title: std::sync::Mutex<String>,
    }

    #[async_trait]
    impl NovelRepositoryPort for CountingRepo {
        async fn save(&self, novel: &Novel) -> Result<NovelId, RepositoryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepositoryError::DatabaseError("disk full".into()));
            }
            self.saves.fetch_add(1, Ordering::SeqCst);
            *self.last_title.lock().unwrap() = novel.title().to_string();
            Ok(novel.id())
        }

        async fn load(&self, _id: NovelId) -> Result<Option<Novel>, RepositoryError> {
            Ok(None)
        }

        async fn list(&self) -> Result<Vec<NovelListing>, RepositoryError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _id: NovelId) -> Result<(), RepositoryError> {
            Ok(())
        }
    }

    fn start(store: Arc<InMemoryNovelStore>, repo: Arc<CountingRepo>) -> AutosaveHandle {
        start_with(AutosaveConfig::default(), store, repo)
    }

    fn start_with(
        config: AutosaveConfig,
        store: Arc<InMemoryNovelStore>,
        repo: Arc<CountingRepo>,
    ) -> AutosaveHandle {
        let (worker, handle) = AutosaveWorker::new(
            config,
            store,
            repo,
            Arc::new(EventPublisher::new()),
        );
        tokio::spawn(worker.run());
        handle
    }

    fn titled(store: &InMemoryNovelStore, title: &str) {
        store.apply(NovelMutation::SetTitle(title.into())).unwrap();
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_restarts_on_each_mutation() {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(CountingRepo::default());
        let _handle = start(store.clone(), repo.clone());

        titled(&store, "Draft");
        advance(2).await;
        titled(&store, "Final");
        advance(2).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);

        advance(2).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
        assert_eq!(*repo.last_title.lock().unwrap(), "Final");
    }

    #[tokio::test(start_paused = true)]
    async fn test_untitled_document_is_never_saved() {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(CountingRepo::default());
        let handle = start(store.clone(), repo.clone());

        store
            .apply(NovelMutation::UpdateSettings(NovelSettings::default()))
            .unwrap();
        advance(10).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);
        assert_eq!(handle.save_now().await.unwrap(), SaveOutcome::SkippedUntitled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_save_clears_pending_timer() {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(CountingRepo::default());
        let handle = start(store.clone(), repo.clone());

        titled(&store, "Manual");
        advance(1).await;
        let outcome = handle.save_now().await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved(_)));

        advance(10).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_swallowed_in_background_surfaced_on_manual() {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(CountingRepo::default());
        repo.fail.store(true, Ordering::SeqCst);
        let handle = start(store.clone(), repo.clone());

        titled(&store, "Doomed");
        advance(5).await;

        // Worker 仍在运行，手动保存把错误交给调用方
        let err = handle.save_now().await.unwrap_err();
        assert!(matches!(err, RepositoryError::DatabaseError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_worker_only_saves_on_request() {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(CountingRepo::default());
        let config = AutosaveConfig {
            enabled: false,
            ..AutosaveConfig::default()
        };
        let handle = start_with(config, store.clone(), repo.clone());

        titled(&store, "Manual Only");
        advance(30).await;
        assert_eq!(repo.saves.load(Ordering::SeqCst), 0);

        handle.save_now().await.unwrap();
        assert_eq!(repo.saves.load(Ordering::SeqCst), 1);
    }
}
