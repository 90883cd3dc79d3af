//! In-Memory Novel Repository Implementation

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::application::ports::{NovelListing, NovelRepositoryPort, RepositoryError};
use crate::domain::novel::{Novel, NovelId};

/// 内存文档仓储（不持久化，用于测试和无数据库运行）
pub struct InMemoryNovelRepository {
    novels: DashMap<NovelId, Novel>,
}

impl InMemoryNovelRepository {
    pub fn new() -> Self {
        Self {
            novels: DashMap::new(),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for InMemoryNovelRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NovelRepositoryPort for InMemoryNovelRepository {
    async fn save(&self, novel: &Novel) -> Result<NovelId, RepositoryError> {
        self.novels.insert(novel.id(), novel.clone());
        Ok(novel.id())
    }

    async fn load(&self, id: NovelId) -> Result<Option<Novel>, RepositoryError> {
        Ok(self.novels.get(&id).map(|n| n.clone()))
    }

    async fn list(&self) -> Result<Vec<NovelListing>, RepositoryError> {
        let mut listings: Vec<NovelListing> = self
            .novels
            .iter()
            .map(|entry| NovelListing {
                id: entry.id(),
                title: entry.title().to_string(),
                updated_at: entry.updated_at(),
            })
            .collect();
        listings.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(listings)
    }

    async fn delete(&self, id: NovelId) -> Result<(), RepositoryError> {
        self.novels
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::novel::NovelSettings;

    #[tokio::test]
    async fn test_save_load_delete() {
        let repo = InMemoryNovelRepository::new();
        let novel = Novel::new("Kept", NovelSettings::default());
        let id = repo.save(&novel).await.unwrap();

        assert_eq!(repo.load(id).await.unwrap().unwrap().title(), "Kept");
        assert_eq!(repo.list().await.unwrap().len(), 1);

        repo.delete(id).await.unwrap();
        assert!(repo.load(id).await.unwrap().is_none());
        assert!(matches!(repo.delete(id).await, Err(RepositoryError::NotFound(_))));
    }
}
