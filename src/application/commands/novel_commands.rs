//! Novel Commands - 文档管理

use crate::domain::novel::{ChapterId, NovelId, NovelSettings};

/// 新建文档命令（替换当前文档）
#[derive(Debug, Clone)]
pub struct CreateNovel {
    pub title: String,
    pub settings: NovelSettings,
}

/// 加载已保存文档命令
#[derive(Debug, Clone)]
pub struct LoadNovel {
    pub novel_id: NovelId,
}

/// 删除已保存文档命令
#[derive(Debug, Clone)]
pub struct DeleteNovel {
    pub novel_id: NovelId,
}

/// 手动保存命令
#[derive(Debug, Clone, Default)]
pub struct SaveNovel;

/// 更新创作设置命令
#[derive(Debug, Clone)]
pub struct UpdateSettings {
    pub settings: NovelSettings,
}

/// 修改标题命令
#[derive(Debug, Clone)]
pub struct SetTitle {
    pub title: String,
}

/// 切换当前章节命令
#[derive(Debug, Clone)]
pub struct SelectChapter {
    pub chapter_id: ChapterId,
}

/// 手动编辑章节正文命令
#[derive(Debug, Clone)]
pub struct EditChapter {
    pub chapter_id: ChapterId,
    pub content: String,
}
