//! Novel Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::generation::{OperationKind, OperationSlot};
use crate::application::ports::{NovelListing, NovelRepositoryPort, NovelStorePort};
use crate::application::queries::{GetCurrentNovel, ListNovels};
use crate::domain::novel::Novel;

/// 当前文档及正在运行的操作
#[derive(Debug, Clone)]
pub struct CurrentNovelResponse {
    pub novel: Novel,
    pub active_operation: Option<OperationKind>,
}

/// GetCurrentNovel Handler
pub struct GetCurrentNovelHandler {
    store: Arc<dyn NovelStorePort>,
    slot: Arc<OperationSlot>,
}

impl GetCurrentNovelHandler {
    pub fn new(store: Arc<dyn NovelStorePort>, slot: Arc<OperationSlot>) -> Self {
        Self { store, slot }
    }

    pub fn handle(&self, _query: GetCurrentNovel) -> CurrentNovelResponse {
        CurrentNovelResponse {
            novel: self.store.snapshot(),
            active_operation: self.slot.active_kind(),
        }
    }
}

/// ListNovels Handler
pub struct ListNovelsHandler {
    novel_repo: Arc<dyn NovelRepositoryPort>,
}

impl ListNovelsHandler {
    pub fn new(novel_repo: Arc<dyn NovelRepositoryPort>) -> Self {
        Self { novel_repo }
    }

    pub async fn handle(&self, _query: ListNovels) -> Result<Vec<NovelListing>, ApplicationError> {
        Ok(self.novel_repo.list().await?)
    }
}
