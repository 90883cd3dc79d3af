//! Text Generator Port - 文本生成后端抽象
//!
//! 定义流式生成与一次性补全的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::novel::TokenUsage;

/// 生成错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Generation cancelled")]
    Cancelled,

    #[error("Content blocked by provider: {0}")]
    ContentPolicy(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误分类（决定重试策略）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// 用户主动取消
    Cancelled,
    /// 内容安全拒绝
    ContentPolicy,
    /// 限流 / 配额
    RateLimited,
    /// 临时网络故障
    TransientNetwork,
    /// 其他错误
    Other,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::ContentPolicy => "content_policy",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::TransientNetwork => "transient_network",
            ErrorClass::Other => "other",
        }
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "resource_exhausted",
    "resource exhausted",
    "too many requests",
];

const CONTENT_POLICY_MARKERS: &[&str] = &[
    "safety",
    "content policy",
    "content_policy",
    "content_filter",
    "content filter",
    "blocked",
    "prohibited",
];

const NETWORK_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "network",
    "connection",
    "fetch failed",
    "econnreset",
    "502",
    "503",
    "504",
    "unavailable",
    "overloaded",
];

/// 根据错误文本中的已知标记分类
pub fn classify_message(message: &str) -> ErrorClass {
    let message = message.to_lowercase();
    let contains_any = |markers: &[&str]| markers.iter().any(|m| message.contains(m));

    if contains_any(RATE_LIMIT_MARKERS) {
        ErrorClass::RateLimited
    } else if contains_any(CONTENT_POLICY_MARKERS) {
        ErrorClass::ContentPolicy
    } else if contains_any(NETWORK_MARKERS) {
        ErrorClass::TransientNetwork
    } else {
        ErrorClass::Other
    }
}

impl GenerationError {
    /// 错误分类
    pub fn class(&self) -> ErrorClass {
        match self {
            GenerationError::Cancelled => ErrorClass::Cancelled,
            GenerationError::ContentPolicy(_) => ErrorClass::ContentPolicy,
            GenerationError::RateLimited(_) => ErrorClass::RateLimited,
            GenerationError::NetworkError(_) | GenerationError::Timeout => {
                ErrorClass::TransientNetwork
            }
            GenerationError::ServiceError(message) | GenerationError::InvalidResponse(message) => {
                classify_message(message)
            }
            GenerationError::Internal(_) => ErrorClass::Other,
        }
    }
}

/// 生成请求
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// 系统提示
    pub system: String,
    /// 前情上下文（可为空）
    pub context: String,
    /// 本次指令
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// 流式片段
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// 文本增量
    Text(String),
    /// 用量报告
    Usage(TokenUsage),
}

/// 一次性补全结果
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// 流式片段序列（有限、不可重放）
pub type FragmentStream = BoxStream<'static, Result<StreamChunk, GenerationError>>;

/// Text Generator Port
///
/// 外部文本生成服务的抽象接口
#[async_trait]
pub trait TextGeneratorPort: Send + Sync {
    /// 打开流式生成
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, GenerationError>;

    /// 非流式补全（摘要、规划、分析等）
    async fn complete(&self, request: GenerationRequest) -> Result<Completion, GenerationError>;

    /// 检查服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify_message("HTTP 429: quota exceeded"), ErrorClass::RateLimited);
        assert_eq!(classify_message("RESOURCE_EXHAUSTED"), ErrorClass::RateLimited);
    }

    #[test]
    fn test_classify_content_policy() {
        assert_eq!(
            classify_message("Response was blocked due to SAFETY"),
            ErrorClass::ContentPolicy
        );
    }

    #[test]
    fn test_classify_network() {
        assert_eq!(classify_message("fetch failed"), ErrorClass::TransientNetwork);
        assert_eq!(classify_message("HTTP 503 Service Unavailable"), ErrorClass::TransientNetwork);
    }

    #[test]
    fn test_classify_other() {
        assert_eq!(classify_message("invalid api key"), ErrorClass::Other);
    }

    #[test]
    fn test_variant_class() {
        assert_eq!(GenerationError::Timeout.class(), ErrorClass::TransientNetwork);
        assert_eq!(
            GenerationError::ServiceError("HTTP 500: quota".into()).class(),
            ErrorClass::RateLimited
        );
        assert_eq!(GenerationError::Internal("x".into()).class(), ErrorClass::Other);
    }
}
