//! Novel Queries

/// 获取当前文档查询
#[derive(Debug, Clone, Default)]
pub struct GetCurrentNovel;

/// 列出已保存文档查询
#[derive(Debug, Clone, Default)]
pub struct ListNovels;
