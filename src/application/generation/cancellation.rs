//! 生成操作的取消与互斥
//!
//! 同一时刻最多一个生成类操作（大纲、单章、批量、一致性分析）在运行；
//! 新操作开始前先取消旧操作的令牌，并等待其退出

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

/// 操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Outline,
    Chapter,
    AutoGenerate,
    Consistency,
    /// 新建/加载/删除当前文档
    Document,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Outline => "outline",
            OperationKind::Chapter => "chapter",
            OperationKind::AutoGenerate => "auto_generate",
            OperationKind::Consistency => "consistency",
            OperationKind::Document => "document",
        }
    }
}

#[derive(Debug)]
struct ActiveOperation {
    id: u64,
    kind: OperationKind,
    token: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 操作槽
pub struct OperationSlot {
    active: Arc<Mutex<Option<ActiveOperation>>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    next_id: AtomicU64,
}

impl OperationSlot {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            gate: Arc::new(tokio::sync::Mutex::new(())),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 开始新操作
    ///
    /// 先取消当前操作，再等待其释放后返回新操作的守卫；
    /// 等待期间若又有更新的操作开始，本操作的令牌会被取消
    pub async fn begin(&self, kind: OperationKind) -> OperationGuard {
        let token = CancellationToken::new();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut active = lock(&self.active);
            if let Some(previous) = active.replace(ActiveOperation {
                id,
                kind,
                token: token.clone(),
            }) {
                previous.token.cancel();
                tracing::info!(
                    previous = previous.kind.as_str(),
                    next = kind.as_str(),
                    "Aborting active operation"
                );
            }
        }

        let permit = self.gate.clone().lock_owned().await;
        tracing::debug!(operation_id = id, kind = kind.as_str(), "Operation started");

        OperationGuard {
            id,
            kind,
            token,
            active: self.active.clone(),
            _permit: permit,
        }
    }

    /// 取消当前操作，返回是否有操作在运行
    pub fn stop(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(operation) => {
                operation.token.cancel();
                tracing::info!(kind = operation.kind.as_str(), "Stop requested");
                true
            }
            None => false,
        }
    }

    /// 当前运行的操作类型
    pub fn active_kind(&self) -> Option<OperationKind> {
        lock(&self.active).as_ref().map(|op| op.kind)
    }
}

impl Default for OperationSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// 操作守卫
///
/// 持有期间独占操作槽；drop 时释放
pub struct OperationGuard {
    id: u64,
    kind: OperationKind,
    token: CancellationToken,
    active: Arc<Mutex<Option<ActiveOperation>>>,
    _permit: OwnedMutexGuard<()>,
}

impl OperationGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.active);
        if active.as_ref().map(|op| op.id) == Some(self.id) {
            *active = None;
        }
    }
}
