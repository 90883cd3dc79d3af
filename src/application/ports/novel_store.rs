//! Novel Store Port - 当前文档的状态容器
//!
//! 整个进程只有一份可编辑文档；UI、生成流程和自动保存都通过这里读写

use tokio::sync::watch;

use crate::domain::novel::{Novel, NovelError, NovelMutation};

/// Novel Store Port
///
/// - 所有修改经由 `apply` 串行执行，不存在部分写入
/// - 每次成功修改后 revision 递增并通知订阅者
pub trait NovelStorePort: Send + Sync {
    /// 获取当前文档快照
    fn snapshot(&self) -> Novel;

    /// 应用一次变更
    fn apply(&self, mutation: NovelMutation) -> Result<(), NovelError>;

    /// 整体替换文档（新建 / 加载）
    fn replace(&self, novel: Novel);

    /// 订阅修改通知（值为 revision）
    fn subscribe(&self) -> watch::Receiver<u64>;
}
