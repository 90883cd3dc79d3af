//! Novel Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Chapter, ChapterId, NovelError, NovelId, NovelMutation, NovelSettings, NovelStatus,
    TokenUsage,
};

/// Novel 聚合根（即整份文档状态）
///
/// 不变量:
/// - 章节按 id 升序排列
/// - 状态只能 Idle -> Planning -> Ready 单向推进（规划失败时回到 Idle）
/// - 用量计数只增不减
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Novel {
    id: NovelId,
    title: String,
    #[serde(default)]
    premise: String,
    #[serde(default)]
    characters: String,
    chapters: Vec<Chapter>,
    settings: NovelSettings,
    usage: TokenUsage,
    current_chapter: Option<ChapterId>,
    status: NovelStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Novel {
    /// 创建新文档
    pub fn new(title: impl Into<String>, settings: NovelSettings) -> Self {
        let now = Utc::now();
        Self {
            id: NovelId::new(),
            title: title.into(),
            premise: String::new(),
            characters: String::new(),
            chapters: Vec::new(),
            settings,
            usage: TokenUsage::default(),
            current_chapter: None,
            status: NovelStatus::Idle,
            created_at: now,
            updated_at: now,
        }
    }

    /// 直接以章节列表构建就绪状态的文档
    pub fn with_chapters(
        title: impl Into<String>,
        settings: NovelSettings,
        chapters: Vec<Chapter>,
    ) -> Self {
        let mut novel = Self::new(title, settings);
        novel.chapters = chapters;
        novel.chapters.sort_by_key(|c| c.id());
        novel.current_chapter = novel.chapters.first().map(|c| c.id());
        if !novel.chapters.is_empty() {
            novel.status = NovelStatus::Ready;
        }
        novel
    }

    /// 应用一次变更
    ///
    /// 所有修改的唯一入口；违反不变量时返回错误且不做任何修改
    pub fn apply(&mut self, mutation: NovelMutation) -> Result<(), NovelError> {
        match mutation {
            NovelMutation::SetTitle(title) => {
                self.title = title;
            }
            NovelMutation::UpdateSettings(settings) => {
                self.settings = settings;
            }
            NovelMutation::SelectChapter(id) => {
                self.chapter(id).ok_or(NovelError::ChapterNotFound(id))?;
                self.current_chapter = Some(id);
            }
            NovelMutation::BeginPlanning { premise } => {
                self.transition(NovelStatus::Idle, NovelStatus::Planning)?;
                self.premise = premise;
            }
            NovelMutation::CompleteOutline {
                entries,
                characters,
            } => {
                if entries.is_empty() {
                    return Err(NovelError::InvalidOutline("outline has no chapters".into()));
                }
                self.transition(NovelStatus::Planning, NovelStatus::Ready)?;
                self.chapters = entries
                    .into_iter()
                    .enumerate()
                    .map(|(index, entry)| {
                        Chapter::new(ChapterId::new(index as u32 + 1), entry.title, entry.summary)
                            .with_volume(entry.volume)
                    })
                    .collect();
                self.characters = characters;
                self.current_chapter = self.chapters.first().map(|c| c.id());
            }
            NovelMutation::AbandonPlanning => {
                self.transition(NovelStatus::Planning, NovelStatus::Idle)?;
            }
            NovelMutation::BeginChapter(id) => {
                let chapter = self.chapter_mut(id)?;
                if chapter.is_generating() {
                    return Err(NovelError::ChapterGenerating(id));
                }
                if chapter.is_done() {
                    return Err(NovelError::ChapterDone(id));
                }
                chapter.begin_generation();
                self.current_chapter = Some(id);
            }
            NovelMutation::AppendContent { chapter, delta } => {
                let target = self.chapter_mut(chapter)?;
                if !target.is_generating() {
                    return Err(NovelError::ChapterNotGenerating(chapter));
                }
                target.append(&delta);
            }
            NovelMutation::StopChapter(id) => {
                self.chapter_mut(id)?.stop_generation();
            }
            NovelMutation::FinishChapter { chapter, summary } => {
                let target = self.chapter_mut(chapter)?;
                if !target.is_generating() {
                    return Err(NovelError::ChapterNotGenerating(chapter));
                }
                target.finish(summary.filter(|s| !s.trim().is_empty()));
            }
            NovelMutation::ResetChapter(id) => {
                let chapter = self.chapter_mut(id)?;
                if chapter.is_generating() {
                    return Err(NovelError::ChapterGenerating(id));
                }
                chapter.reset();
            }
            NovelMutation::SkipChapter { chapter, note } => {
                let target = self.chapter_mut(chapter)?;
                target.append(&note);
                target.finish(None);
            }
            NovelMutation::EditChapter { chapter, content } => {
                let target = self.chapter_mut(chapter)?;
                if target.is_generating() {
                    return Err(NovelError::ChapterGenerating(chapter));
                }
                target.replace_content(content);
            }
            NovelMutation::SetConsistencyAnalysis { chapter, analysis } => {
                self.chapter_mut(chapter)?.set_consistency_analysis(analysis);
            }
            NovelMutation::RecordUsage(usage) => {
                self.usage += usage;
            }
        }

        self.updated_at = Utc::now();
        Ok(())
    }

    /// 清除持久化文档中残留的生成中标记
    ///
    /// 进程中断时正在生成的章节会带着 is_generating 被保存；
    /// 载入后没有任何会话拥有它们。规划中断同理回到 Idle
    pub fn without_stale_generation(mut self) -> Self {
        for chapter in self.chapters.iter_mut().filter(|c| c.is_generating()) {
            chapter.stop_generation();
        }
        if self.status == NovelStatus::Planning {
            self.status = if self.chapters.is_empty() {
                NovelStatus::Idle
            } else {
                NovelStatus::Ready
            };
        }
        self
    }

    fn transition(&mut self, from: NovelStatus, to: NovelStatus) -> Result<(), NovelError> {
        if self.status != from {
            return Err(NovelError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn chapter_mut(&mut self, id: ChapterId) -> Result<&mut Chapter, NovelError> {
        self.chapters
            .iter_mut()
            .find(|c| c.id() == id)
            .ok_or(NovelError::ChapterNotFound(id))
    }

    // Getters
    pub fn id(&self) -> NovelId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// 没有标题的文档不算正式文档，不参与保存
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn premise(&self) -> &str {
        &self.premise
    }

    pub fn characters(&self) -> &str {
        &self.characters
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id() == id)
    }

    pub fn chapter_ids(&self) -> Vec<ChapterId> {
        self.chapters.iter().map(|c| c.id()).collect()
    }

    pub fn settings(&self) -> &NovelSettings {
        &self.settings
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    pub fn current_chapter(&self) -> Option<ChapterId> {
        self.current_chapter
    }

    pub fn status(&self) -> NovelStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 已完成章节数
    pub fn done_count(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_done()).count()
    }

    /// 当前章节的目标字数
    pub fn chapter_word_target(&self, min_words: u32) -> u32 {
        self.settings
            .chapter_word_target(self.chapters.len(), min_words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::novel::OutlineEntry;

    fn ready_novel() -> Novel {
        Novel::with_chapters(
            "Test",
            NovelSettings::default(),
            vec![
                Chapter::new(ChapterId::new(2), "Two", "second"),
                Chapter::new(ChapterId::new(1), "One", "first"),
            ],
        )
    }

    #[test]
    fn test_chapters_sorted_by_id() {
        let novel = ready_novel();
        assert_eq!(novel.chapter_ids(), vec![ChapterId::new(1), ChapterId::new(2)]);
        assert_eq!(novel.status(), NovelStatus::Ready);
    }

    #[test]
    fn test_planning_lifecycle() {
        let mut novel = Novel::new("Test", NovelSettings::default());
        novel
            .apply(NovelMutation::BeginPlanning {
                premise: "a premise".into(),
            })
            .unwrap();
        assert_eq!(novel.status(), NovelStatus::Planning);

        novel
            .apply(NovelMutation::CompleteOutline {
                entries: vec![
                    OutlineEntry {
                        title: "Start".into(),
                        summary: "begin".into(),
                        volume: None,
                    },
                    OutlineEntry {
                        title: "End".into(),
                        summary: "finish".into(),
                        volume: None,
                    },
                ],
                characters: "Alice".into(),
            })
            .unwrap();

        assert_eq!(novel.status(), NovelStatus::Ready);
        assert_eq!(novel.chapter_ids(), vec![ChapterId::new(1), ChapterId::new(2)]);
        assert_eq!(novel.characters(), "Alice");

        // Ready 不能再次进入 Planning
        let err = novel
            .apply(NovelMutation::BeginPlanning {
                premise: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, NovelError::InvalidTransition { .. }));
    }

    #[test]
    fn test_generating_and_done_are_exclusive() {
        let mut novel = ready_novel();
        let id = ChapterId::new(1);

        novel.apply(NovelMutation::BeginChapter(id)).unwrap();
        let chapter = novel.chapter(id).unwrap();
        assert!(chapter.is_generating() && !chapter.is_done());

        novel
            .apply(NovelMutation::FinishChapter {
                chapter: id,
                summary: Some("new summary".into()),
            })
            .unwrap();
        let chapter = novel.chapter(id).unwrap();
        assert!(!chapter.is_generating() && chapter.is_done());
        assert_eq!(chapter.summary(), "new summary");

        assert_eq!(
            novel.apply(NovelMutation::BeginChapter(id)),
            Err(NovelError::ChapterDone(id))
        );
    }

    #[test]
    fn test_append_requires_generating() {
        let mut novel = ready_novel();
        let id = ChapterId::new(1);
        let err = novel
            .apply(NovelMutation::AppendContent {
                chapter: id,
                delta: "text".into(),
            })
            .unwrap_err();
        assert_eq!(err, NovelError::ChapterNotGenerating(id));
    }

    #[test]
    fn test_stop_keeps_partial_content() {
        let mut novel = ready_novel();
        let id = ChapterId::new(1);
        novel.apply(NovelMutation::BeginChapter(id)).unwrap();
        novel
            .apply(NovelMutation::AppendContent {
                chapter: id,
                delta: "partial".into(),
            })
            .unwrap();
        novel.apply(NovelMutation::StopChapter(id)).unwrap();

        let chapter = novel.chapter(id).unwrap();
        assert_eq!(chapter.content(), "partial");
        assert!(!chapter.is_generating());
        assert!(!chapter.is_done());
    }

    #[test]
    fn test_skip_marks_done_with_note() {
        let mut novel = ready_novel();
        let id = ChapterId::new(2);
        novel.apply(NovelMutation::BeginChapter(id)).unwrap();
        novel
            .apply(NovelMutation::SkipChapter {
                chapter: id,
                note: "[skipped]".into(),
            })
            .unwrap();
        let chapter = novel.chapter(id).unwrap();
        assert!(chapter.is_done());
        assert!(!chapter.is_generating());
        assert!(chapter.content().ends_with("[skipped]"));
    }

    #[test]
    fn test_edit_rejected_while_generating() {
        let mut novel = ready_novel();
        let id = ChapterId::new(1);
        novel.apply(NovelMutation::BeginChapter(id)).unwrap();
        assert!(novel
            .apply(NovelMutation::EditChapter {
                chapter: id,
                content: "x".into(),
            })
            .is_err());
    }

    #[test]
    fn test_without_stale_generation() {
        let mut novel = ready_novel();
        let id = ChapterId::new(1);
        novel.apply(NovelMutation::BeginChapter(id)).unwrap();
        novel
            .apply(NovelMutation::AppendContent {
                chapter: id,
                delta: "half".into(),
            })
            .unwrap();

        let restored = novel.without_stale_generation();
        let chapter = restored.chapter(id).unwrap();
        assert!(!chapter.is_generating());
        assert!(!chapter.is_done());
        assert_eq!(chapter.content(), "half");
    }

    #[test]
    fn test_usage_only_grows() {
        let mut novel = ready_novel();
        novel
            .apply(NovelMutation::RecordUsage(TokenUsage::new(3, 4)))
            .unwrap();
        novel
            .apply(NovelMutation::RecordUsage(TokenUsage::new(1, 1)))
            .unwrap();
        assert_eq!(novel.usage(), TokenUsage::new(4, 5));
    }
}
