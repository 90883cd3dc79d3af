//! In-Memory Novel Store Implementation

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::application::ports::NovelStorePort;
use crate::domain::novel::{Novel, NovelError, NovelMutation, NovelSettings};

/// 当前文档的内存容器
///
/// 所有修改在同一把锁内完成，之后递增 revision 通知订阅者（自动保存等）
pub struct InMemoryNovelStore {
    novel: Mutex<Novel>,
    revision: watch::Sender<u64>,
}

impl InMemoryNovelStore {
    pub fn new(novel: Novel) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            novel: Mutex::new(novel),
            revision,
        }
    }

    /// 以空白未命名文档启动
    pub fn blank() -> Self {
        Self::new(Novel::new("", NovelSettings::default()))
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, Novel> {
        self.novel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

impl NovelStorePort for InMemoryNovelStore {
    fn snapshot(&self) -> Novel {
        self.lock().clone()
    }

    fn apply(&self, mutation: NovelMutation) -> Result<(), NovelError> {
        let kind = mutation.kind();
        {
            let mut novel = self.lock();
            if let Err(e) = novel.apply(mutation) {
                tracing::debug!(mutation = kind, error = %e, "Mutation rejected");
                return Err(e);
            }
        }
        tracing::trace!(mutation = kind, "Mutation applied");
        self.bump();
        Ok(())
    }

    fn replace(&self, novel: Novel) {
        let id = novel.id();
        *self.lock() = novel;
        tracing::info!(novel_id = %id, "Document replaced");
        self.bump();
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::novel::{Chapter, ChapterId};

    #[test]
    fn test_apply_bumps_revision() {
        let store = InMemoryNovelStore::blank();
        let rx = store.subscribe();
        assert_eq!(*rx.borrow(), 0);

        store
            .apply(NovelMutation::SetTitle("Dune".into()))
            .unwrap();
        assert_eq!(store.snapshot().title(), "Dune");
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn test_rejected_mutation_does_not_notify() {
        let store = InMemoryNovelStore::blank();
        let rx = store.subscribe();
        let result = store.apply(NovelMutation::BeginChapter(ChapterId::new(9)));
        assert!(result.is_err());
        assert_eq!(*rx.borrow(), 0);
    }

    #[test]
    fn test_replace_swaps_document() {
        let store = InMemoryNovelStore::blank();
        let next = Novel::with_chapters(
            "Other",
            NovelSettings::default(),
            vec![Chapter::new(ChapterId::new(1), "One", "")],
        );
        let id = next.id();
        store.replace(next);
        assert_eq!(store.snapshot().id(), id);
        assert_eq!(*store.subscribe().borrow(), 1);
    }
}
