//! 重试策略
//!
//! 按错误分类决定重试、跳过或中止

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::ErrorClass;

/// 重试决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 等待后重试
    Retry { delay: Duration },
    /// 不重试，标记跳过后继续
    Skip,
    /// 中止整个批量
    Halt,
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每章最多重试次数
    pub max_retries: u32,
    /// 限流退避
    pub rate_limit_backoff: Duration,
    /// 网络故障退避
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            rate_limit_backoff: Duration::from_secs(60),
            network_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 根据错误分类与已重试次数给出决策
    pub fn decide(&self, class: ErrorClass, retries_so_far: u32) -> RetryDecision {
        let delay = match class {
            ErrorClass::ContentPolicy => return RetryDecision::Skip,
            ErrorClass::RateLimited => self.rate_limit_backoff,
            ErrorClass::TransientNetwork => self.network_backoff,
            ErrorClass::Cancelled | ErrorClass::Other => return RetryDecision::Halt,
        };

        if retries_so_far < self.max_retries {
            RetryDecision::Retry { delay }
        } else {
            RetryDecision::Halt
        }
    }
}

/// 可取消的等待
///
/// 返回 true 表示完整等待结束，false 表示被取消
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_policy_is_never_retried() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(ErrorClass::ContentPolicy, 0), RetryDecision::Skip);
        assert_eq!(policy.decide(ErrorClass::ContentPolicy, 5), RetryDecision::Skip);
    }

    #[test]
    fn test_backoff_by_class() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(ErrorClass::RateLimited, 0),
            RetryDecision::Retry {
                delay: Duration::from_secs(60)
            }
        );
        assert_eq!(
            policy.decide(ErrorClass::TransientNetwork, 0),
            RetryDecision::Retry {
                delay: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn test_budget_exhausted_halts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(ErrorClass::RateLimited, 1), RetryDecision::Halt);
        assert_eq!(
            RetryPolicy::none().decide(ErrorClass::TransientNetwork, 0),
            RetryDecision::Halt
        );
    }

    #[test]
    fn test_other_halts_immediately() {
        assert_eq!(RetryPolicy::default().decide(ErrorClass::Other, 0), RetryDecision::Halt);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_or_cancel() {
        let cancel = CancellationToken::new();
        assert!(sleep_or_cancel(Duration::from_secs(5), &cancel).await);

        cancel.cancel();
        assert!(!sleep_or_cancel(Duration::from_secs(5), &cancel).await);
        assert!(!sleep_or_cancel(Duration::ZERO, &cancel).await);
    }
}
