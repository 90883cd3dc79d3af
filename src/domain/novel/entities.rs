//! Novel Context - Entities

use serde::{Deserialize, Serialize};

use super::{ChapterId, Volume};

/// 章节
///
/// 不变量:
/// - id 在 Novel 内唯一且决定顺序
/// - is_generating 与 is_done 不会同时为 true
/// - 单次生成过程中 content 只追加不回退（强制重写时整体清空）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    title: String,
    /// 简要梗概（规划产物，也作为后续章节的上下文）
    summary: String,
    content: String,
    is_generating: bool,
    is_done: bool,
    #[serde(default)]
    volume: Option<Volume>,
    /// 一致性分析结果
    #[serde(default)]
    consistency_analysis: Option<String>,
}

impl Chapter {
    pub fn new(id: ChapterId, title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            summary: summary.into(),
            content: String::new(),
            is_generating: false,
            is_done: false,
            volume: None,
            consistency_analysis: None,
        }
    }

    pub fn with_volume(mut self, volume: Option<Volume>) -> Self {
        self.volume = volume;
        self
    }

    pub fn id(&self) -> ChapterId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn is_done(&self) -> bool {
        self.is_done
    }

    pub fn volume(&self) -> Option<&Volume> {
        self.volume.as_ref()
    }

    pub fn consistency_analysis(&self) -> Option<&str> {
        self.consistency_analysis.as_deref()
    }

    /// 带章节号的可读标题，如 "Chapter 3: The Storm"
    pub fn display_title(&self) -> String {
        if self.title.is_empty() {
            format!("Chapter {}", self.id)
        } else {
            format!("Chapter {}: {}", self.id, self.title)
        }
    }

    // 以下修改方法仅供聚合根的 reducer 调用

    pub(super) fn begin_generation(&mut self) {
        self.is_done = false;
        self.is_generating = true;
    }

    pub(super) fn stop_generation(&mut self) {
        self.is_generating = false;
    }

    pub(super) fn append(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    pub(super) fn reset(&mut self) {
        self.content.clear();
        self.is_done = false;
        self.is_generating = false;
    }

    pub(super) fn finish(&mut self, summary: Option<String>) {
        if let Some(summary) = summary {
            self.summary = summary;
        }
        self.is_generating = false;
        self.is_done = true;
    }

    pub(super) fn replace_content(&mut self, content: String) {
        self.content = content;
    }

    pub(super) fn set_consistency_analysis(&mut self, analysis: Option<String>) {
        self.consistency_analysis = analysis;
    }
}
