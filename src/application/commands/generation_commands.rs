//! Generation Commands - 生成类操作
//!
//! 同一时刻只运行一个；新命令会先取消正在运行的操作

use crate::domain::novel::ChapterId;

/// 规划大纲与人物命令
#[derive(Debug, Clone)]
pub struct PlanOutline {
    pub premise: String,
}

/// 生成单章命令
#[derive(Debug, Clone)]
pub struct GenerateChapter {
    pub chapter_id: ChapterId,
    /// 已完成的章节也清空重写
    pub force_rewrite: bool,
}

/// 按顺序生成所有未完成章节命令
#[derive(Debug, Clone, Default)]
pub struct AutoGenerate;

/// 停止当前生成命令
#[derive(Debug, Clone, Default)]
pub struct StopGeneration;

/// 一致性分析命令
#[derive(Debug, Clone)]
pub struct AnalyzeConsistency {
    pub chapter_id: ChapterId,
}

/// 按一致性分析重写章节命令
#[derive(Debug, Clone)]
pub struct RepairConsistency {
    pub chapter_id: ChapterId,
}
