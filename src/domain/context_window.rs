//! 上下文窗口构建
//!
//! 为每次生成请求准备有界的前情上下文:
//! - 所有已完成前序章节的梗概
//! - 最近已完成章节的正文尾部（按字符预算从尾部截取）

use std::collections::BTreeSet;

use super::novel::{Chapter, ChapterId};

/// 默认正文尾部字符预算
pub const DEFAULT_CONTEXT_BUDGET: usize = 10_000;

/// 章节正文之间的分隔
const CHAPTER_SEPARATOR: &str = "\n\n";

/// 上下文窗口
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextWindow {
    /// 前序章节梗概
    pub summaries: String,
    /// 最近正文尾部（不超过预算字符数）
    pub recent_text: String,
}

impl ContextWindow {
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.recent_text.is_empty()
    }
}

/// 为 `target` 章节构建上下文
///
/// 只取 id 小于 target 且已完成的章节；纯函数
pub fn build_context(chapters: &[Chapter], target: ChapterId, budget_chars: usize) -> ContextWindow {
    let mut prior: Vec<&Chapter> = chapters
        .iter()
        .filter(|c| c.id() < target && c.is_done())
        .collect();
    prior.sort_by_key(|c| c.id());

    let summaries = prior
        .iter()
        .map(|c| summary_entry(c))
        .collect::<Vec<_>>()
        .join("\n");

    // 从最新章节向前累积，够预算即停止，更早的正文直接丢弃
    let mut kept: Vec<&str> = Vec::new();
    let mut size = 0;
    for chapter in prior.iter().rev() {
        if size >= budget_chars {
            break;
        }
        if chapter.content().is_empty() {
            continue;
        }
        if !kept.is_empty() {
            size += CHAPTER_SEPARATOR.len();
        }
        size += chapter.content().chars().count();
        kept.push(chapter.content());
    }
    kept.reverse();

    ContextWindow {
        summaries,
        recent_text: tail_chars(&kept.join(CHAPTER_SEPARATOR), budget_chars).to_string(),
    }
}

/// 增量上下文（批量生成时使用）
///
/// 每个章节最多折叠一次；对同一段历史与 `build_context` 结果一致
#[derive(Debug, Clone)]
pub struct RollingContext {
    budget_chars: usize,
    folded: BTreeSet<ChapterId>,
    summaries: Vec<String>,
    recent_text: String,
}

impl RollingContext {
    pub fn new(budget_chars: usize) -> Self {
        Self {
            budget_chars,
            folded: BTreeSet::new(),
            summaries: Vec::new(),
            recent_text: String::new(),
        }
    }

    /// 折叠一个已完成章节，返回是否为首次折叠
    pub fn fold(&mut self, chapter: &Chapter) -> bool {
        if !self.folded.insert(chapter.id()) {
            return false;
        }

        self.summaries.push(summary_entry(chapter));

        if !chapter.content().is_empty() {
            if !self.recent_text.is_empty() {
                self.recent_text.push_str(CHAPTER_SEPARATOR);
            }
            self.recent_text.push_str(chapter.content());
            let start = self.recent_text.len() - tail_chars(&self.recent_text, self.budget_chars).len();
            self.recent_text.drain(..start);
        }
        true
    }

    pub fn is_folded(&self, id: ChapterId) -> bool {
        self.folded.contains(&id)
    }

    pub fn window(&self) -> ContextWindow {
        ContextWindow {
            summaries: self.summaries.join("\n"),
            recent_text: self.recent_text.clone(),
        }
    }
}

fn summary_entry(chapter: &Chapter) -> String {
    if chapter.summary().is_empty() {
        chapter.display_title()
    } else {
        format!("{}\n{}", chapter.display_title(), chapter.summary())
    }
}

/// 取字符串最后 `max_chars` 个字符（按 char 边界切分）
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let total = text.chars().count();
    if total <= max_chars {
        return text;
    }
    let skip = total - max_chars;
    match text.char_indices().nth(skip) {
        Some((index, _)) => &text[index..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::novel::{Novel, NovelMutation, NovelSettings};

    /// 构造一组章节，前 `done` 章已完成
    fn chapters(contents: &[&str], done: usize) -> Vec<Chapter> {
        let list = contents
            .iter()
            .enumerate()
            .map(|(i, _)| Chapter::new(ChapterId::new(i as u32 + 1), format!("T{}", i + 1), format!("S{}", i + 1)))
            .collect();
        let mut novel = Novel::with_chapters("ctx", NovelSettings::default(), list);
        for (i, content) in contents.iter().enumerate().take(done) {
            let id = ChapterId::new(i as u32 + 1);
            novel.apply(NovelMutation::BeginChapter(id)).unwrap();
            novel
                .apply(NovelMutation::AppendContent {
                    chapter: id,
                    delta: content.to_string(),
                })
                .unwrap();
            novel
                .apply(NovelMutation::FinishChapter {
                    chapter: id,
                    summary: None,
                })
                .unwrap();
        }
        novel.chapters().to_vec()
    }

    #[test]
    fn test_no_completed_chapters_is_empty() {
        let list = chapters(&["a", "b"], 0);
        let window = build_context(&list, ChapterId::new(2), 100);
        assert!(window.is_empty());
    }

    #[test]
    fn test_only_earlier_done_chapters() {
        let list = chapters(&["alpha", "beta", "gamma"], 3);
        let window = build_context(&list, ChapterId::new(2), 100);
        assert_eq!(window.recent_text, "alpha");
        assert_eq!(window.summaries, "Chapter 1: T1\nS1");
    }

    #[test]
    fn test_tail_is_bounded_suffix() {
        let a = "a".repeat(40);
        let b = "b".repeat(40);
        let c = "c".repeat(40);
        let list = chapters(&[&a, &b, &c, ""], 3);
        let full = format!("{}\n\n{}\n\n{}", a, b, c);

        for budget in [0, 1, 10, 41, 50, 85, 500] {
            let window = build_context(&list, ChapterId::new(4), budget);
            assert!(window.recent_text.chars().count() <= budget);
            assert!(full.ends_with(&window.recent_text));
        }

        let window = build_context(&list, ChapterId::new(4), 50);
        assert_eq!(window.recent_text.chars().count(), 50);
        assert!(window.recent_text.ends_with(&c));
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        let list = chapters(&["前情提要。", "风起云涌。"], 2);
        let window = build_context(&list, ChapterId::new(3), 3);
        assert_eq!(window.recent_text, "云涌。");
    }

    #[test]
    fn test_rolling_matches_build_and_is_idempotent() {
        let list = chapters(&["one two", "three four", "five six", "seven"], 3);
        let mut rolling = RollingContext::new(12);
        for chapter in list.iter().filter(|c| c.is_done()) {
            assert!(rolling.fold(chapter));
            assert!(!rolling.fold(chapter));
        }
        assert_eq!(rolling.window(), build_context(&list, ChapterId::new(4), 12));
        assert!(rolling.is_folded(ChapterId::new(2)));
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("hello", 10), "hello");
        assert_eq!(tail_chars("hello", 2), "lo");
        assert_eq!(tail_chars("hello", 0), "");
    }
}
