//! Novel Command Handlers - 文档管理

use std::sync::Arc;

use crate::application::commands::{
    CreateNovel, DeleteNovel, EditChapter, LoadNovel, SaveNovel, SelectChapter, SetTitle,
    UpdateSettings,
};
use crate::application::error::ApplicationError;
use crate::application::generation::{OperationKind, OperationSlot};
use crate::application::ports::{AutosavePort, NovelRepositoryPort, NovelStorePort, SaveOutcome};
use crate::domain::novel::{Novel, NovelId, NovelMutation, NovelSettings};

// ============================================================================
// CreateNovel
// ============================================================================

/// CreateNovel Handler - 以空白文档替换当前文档
pub struct CreateNovelHandler {
    store: Arc<dyn NovelStorePort>,
    slot: Arc<OperationSlot>,
}

impl CreateNovelHandler {
    pub fn new(store: Arc<dyn NovelStorePort>, slot: Arc<OperationSlot>) -> Self {
        Self { store, slot }
    }

    pub async fn handle(&self, command: CreateNovel) -> Result<NovelId, ApplicationError> {
        // 等待正在运行的生成退出，避免旧操作写入新文档
        let _guard = self.slot.begin(OperationKind::Document).await;

        let novel = Novel::new(command.title.trim(), command.settings);
        let novel_id = novel.id();
        self.store.replace(novel);

        tracing::info!(novel_id = %novel_id, title = %command.title.trim(), "Novel created");
        Ok(novel_id)
    }
}

// ============================================================================
// LoadNovel
// ============================================================================

/// LoadNovel Handler - 从仓储加载文档到当前文档
pub struct LoadNovelHandler {
    store: Arc<dyn NovelStorePort>,
    novel_repo: Arc<dyn NovelRepositoryPort>,
    slot: Arc<OperationSlot>,
}

impl LoadNovelHandler {
    pub fn new(
        store: Arc<dyn NovelStorePort>,
        novel_repo: Arc<dyn NovelRepositoryPort>,
        slot: Arc<OperationSlot>,
    ) -> Self {
        Self {
            store,
            novel_repo,
            slot,
        }
    }

    pub async fn handle(&self, command: LoadNovel) -> Result<Novel, ApplicationError> {
        let novel = self
            .novel_repo
            .load(command.novel_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Novel", command.novel_id))?;

        let _guard = self.slot.begin(OperationKind::Document).await;

        // 保存时可能正处于生成中，加载后这些标记已无意义
        let novel = novel.without_stale_generation();
        self.store.replace(novel.clone());

        tracing::info!(
            novel_id = %command.novel_id,
            title = %novel.title(),
            chapters = novel.chapters().len(),
            "Novel loaded"
        );
        Ok(novel)
    }
}

// ============================================================================
// DeleteNovel
// ============================================================================

/// DeleteNovel Handler
pub struct DeleteNovelHandler {
    store: Arc<dyn NovelStorePort>,
    novel_repo: Arc<dyn NovelRepositoryPort>,
    slot: Arc<OperationSlot>,
}

impl DeleteNovelHandler {
    pub fn new(
        store: Arc<dyn NovelStorePort>,
        novel_repo: Arc<dyn NovelRepositoryPort>,
        slot: Arc<OperationSlot>,
    ) -> Self {
        Self {
            store,
            novel_repo,
            slot,
        }
    }

    pub async fn handle(&self, command: DeleteNovel) -> Result<(), ApplicationError> {
        // 删除的是当前打开的文档：先换成空白文档再删除，防止自动保存把它写回去
        let _guard = if self.store.snapshot().id() == command.novel_id {
            let guard = self.slot.begin(OperationKind::Document).await;
            self.store.replace(Novel::new("", NovelSettings::default()));
            tracing::info!(novel_id = %command.novel_id, "Open novel closed before delete");
            Some(guard)
        } else {
            None
        };

        self.novel_repo.delete(command.novel_id).await?;
        tracing::info!(novel_id = %command.novel_id, "Novel deleted");
        Ok(())
    }
}

// ============================================================================
// SaveNovel
// ============================================================================

/// SaveNovel Handler - 手动保存
pub struct SaveNovelHandler {
    autosave: Arc<dyn AutosavePort>,
}

impl SaveNovelHandler {
    pub fn new(autosave: Arc<dyn AutosavePort>) -> Self {
        Self { autosave }
    }

    pub async fn handle(&self, _command: SaveNovel) -> Result<SaveOutcome, ApplicationError> {
        let outcome = self.autosave.save_now().await?;
        tracing::info!(outcome = ?outcome, "Manual save");
        Ok(outcome)
    }
}

// ============================================================================
// Document edits
// ============================================================================

/// UpdateSettings Handler
pub struct UpdateSettingsHandler {
    store: Arc<dyn NovelStorePort>,
}

impl UpdateSettingsHandler {
    pub fn new(store: Arc<dyn NovelStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, command: UpdateSettings) -> Result<(), ApplicationError> {
        if command.settings.chapter_count == 0 {
            return Err(ApplicationError::validation("chapter_count must be at least 1"));
        }
        self.store
            .apply(NovelMutation::UpdateSettings(command.settings))?;
        Ok(())
    }
}

/// SetTitle Handler
pub struct SetTitleHandler {
    store: Arc<dyn NovelStorePort>,
}

impl SetTitleHandler {
    pub fn new(store: Arc<dyn NovelStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, command: SetTitle) -> Result<(), ApplicationError> {
        self.store
            .apply(NovelMutation::SetTitle(command.title.trim().to_string()))?;
        Ok(())
    }
}

/// SelectChapter Handler
pub struct SelectChapterHandler {
    store: Arc<dyn NovelStorePort>,
}

impl SelectChapterHandler {
    pub fn new(store: Arc<dyn NovelStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, command: SelectChapter) -> Result<(), ApplicationError> {
        self.store
            .apply(NovelMutation::SelectChapter(command.chapter_id))?;
        Ok(())
    }
}

/// EditChapter Handler - 生成中的章节不可编辑
pub struct EditChapterHandler {
    store: Arc<dyn NovelStorePort>,
}

impl EditChapterHandler {
    pub fn new(store: Arc<dyn NovelStorePort>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, command: EditChapter) -> Result<(), ApplicationError> {
        self.store.apply(NovelMutation::EditChapter {
            chapter: command.chapter_id,
            content: command.content,
        })?;
        tracing::debug!(chapter_id = %command.chapter_id, "Chapter edited");
        Ok(())
    }
}
