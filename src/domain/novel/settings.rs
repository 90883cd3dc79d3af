//! Novel Context - 创作设置

use serde::{Deserialize, Serialize};

/// 章节目标字数的下限
pub const MIN_CHAPTER_WORDS: u32 = 1500;

/// 篇幅模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    /// 长篇：按章节拆分总字数
    #[default]
    LongForm,
    /// 短篇：单章即全文
    ShortForm,
}

/// 创作设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NovelSettings {
    /// 题材
    #[serde(default)]
    pub genre: String,

    /// 文风描述
    #[serde(default)]
    pub style: String,

    /// 写作语言
    #[serde(default = "default_language")]
    pub language: String,

    /// 全书目标字数
    #[serde(default = "default_total_words")]
    pub total_target_words: u32,

    /// 计划章节数
    #[serde(default = "default_chapter_count")]
    pub chapter_count: u32,

    /// 单章目标字数（显式配置时优先）
    #[serde(default)]
    pub chapter_target_words: Option<u32>,

    #[serde(default)]
    pub length_mode: LengthMode,

    /// 额外写作要求
    #[serde(default)]
    pub instructions: String,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_total_words() -> u32 {
    60_000
}

fn default_chapter_count() -> u32 {
    20
}

impl Default for NovelSettings {
    fn default() -> Self {
        Self {
            genre: String::new(),
            style: String::new(),
            language: default_language(),
            total_target_words: default_total_words(),
            chapter_count: default_chapter_count(),
            chapter_target_words: None,
            length_mode: LengthMode::default(),
            instructions: String::new(),
        }
    }
}

impl NovelSettings {
    /// 计算单章目标字数
    ///
    /// - 短篇：全书目标字数
    /// - 显式配置：单章目标字数
    /// - 否则：总字数 / 章节数，且不低于 `min_words`
    pub fn chapter_word_target(&self, chapters: usize, min_words: u32) -> u32 {
        if self.length_mode == LengthMode::ShortForm {
            return self.total_target_words;
        }
        if let Some(target) = self.chapter_target_words.filter(|t| *t > 0) {
            return target;
        }
        let chapters = chapters.max(1) as u32;
        (self.total_target_words / chapters).max(min_words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_chapter_target_wins() {
        let settings = NovelSettings {
            chapter_target_words: Some(3000),
            ..Default::default()
        };
        assert_eq!(settings.chapter_word_target(10, MIN_CHAPTER_WORDS), 3000);
    }

    #[test]
    fn test_divided_target_is_floored() {
        let settings = NovelSettings {
            total_target_words: 10_000,
            ..Default::default()
        };
        assert_eq!(settings.chapter_word_target(20, MIN_CHAPTER_WORDS), 1500);
        assert_eq!(settings.chapter_word_target(4, MIN_CHAPTER_WORDS), 2500);
    }

    #[test]
    fn test_short_form_uses_total() {
        let settings = NovelSettings {
            total_target_words: 8000,
            length_mode: LengthMode::ShortForm,
            chapter_target_words: Some(1000),
            ..Default::default()
        };
        assert_eq!(settings.chapter_word_target(1, MIN_CHAPTER_WORDS), 8000);
    }

    #[test]
    fn test_zero_chapters_does_not_divide_by_zero() {
        let settings = NovelSettings::default();
        assert_eq!(settings.chapter_word_target(0, MIN_CHAPTER_WORDS), 60_000);
    }
}
