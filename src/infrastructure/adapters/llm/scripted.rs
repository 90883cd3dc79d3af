//! Scripted Text Generator - 按脚本回放的生成后端
//!
//! 不调用任何外部服务：流式请求依次回放预先排好的片段序列，
//! 补全请求按关键字或先后顺序返回预设文本。用于离线演示和测试

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    Completion, FragmentStream, GenerationError, GenerationRequest, StreamChunk,
    TextGeneratorPort,
};
use crate::domain::novel::TokenUsage;

/// 流式脚本的一步
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Text(String),
    Usage(TokenUsage),
    /// 流中途报错
    Fail(GenerationError),
    /// 等待一段时间再继续
    Delay(Duration),
    /// 模拟用户在流进行中按下停止：取消调用方令牌后挂起
    CancelCaller,
}

impl ScriptedStep {
    pub fn text(text: &str) -> Self {
        ScriptedStep::Text(text.to_string())
    }
}

struct ScriptedCompletion {
    /// 请求提示包含该关键字时才匹配；None 匹配任意请求
    key: Option<String>,
    reply: Result<String, GenerationError>,
}

#[derive(Default)]
struct Script {
    streams: VecDeque<Result<Vec<ScriptedStep>, GenerationError>>,
    completions: Vec<ScriptedCompletion>,
    stream_requests: Vec<GenerationRequest>,
    completion_requests: Vec<GenerationRequest>,
}

/// 按脚本回放的生成后端
///
/// 脚本用尽后流式请求返回空流，补全请求返回错误
#[derive(Default)]
pub struct ScriptedTextGenerator {
    script: Mutex<Script>,
}

impl ScriptedTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 排入一次流式响应
    pub fn push_stream(&self, steps: Vec<ScriptedStep>) {
        self.script().streams.push_back(Ok(steps));
    }

    /// 排入一次打开流即失败的响应
    pub fn push_open_error(&self, error: GenerationError) {
        self.script().streams.push_back(Err(error));
    }

    /// 排入一次补全响应（按顺序匹配任意请求）
    pub fn push_completion(&self, text: &str) {
        self.push_completion_reply(None, Ok(text.to_string()));
    }

    pub fn push_completion_error(&self, error: GenerationError) {
        self.push_completion_reply(None, Err(error));
    }

    /// 排入一次只匹配提示中含 `key` 的补全响应
    pub fn push_keyed_completion(&self, key: &str, text: &str) {
        self.push_completion_reply(Some(key.to_string()), Ok(text.to_string()));
    }

    pub fn push_keyed_completion_error(&self, key: &str, error: GenerationError) {
        self.push_completion_reply(Some(key.to_string()), Err(error));
    }

    fn push_completion_reply(&self, key: Option<String>, reply: Result<String, GenerationError>) {
        self.script().completions.push(ScriptedCompletion { key, reply });
    }

    /// 已收到的流式请求
    pub fn stream_requests(&self) -> Vec<GenerationRequest> {
        self.script().stream_requests.clone()
    }

    /// 已收到的补全请求
    pub fn completion_requests(&self) -> Vec<GenerationRequest> {
        self.script().completion_requests.clone()
    }
}

async fn play(step: ScriptedStep, cancel: &CancellationToken) -> Option<Result<StreamChunk, GenerationError>> {
    match step {
        ScriptedStep::Text(text) => Some(Ok(StreamChunk::Text(text))),
        ScriptedStep::Usage(usage) => Some(Ok(StreamChunk::Usage(usage))),
        ScriptedStep::Fail(error) => Some(Err(error)),
        ScriptedStep::Delay(duration) => {
            tokio::time::sleep(duration).await;
            None
        }
        ScriptedStep::CancelCaller => {
            cancel.cancel();
            std::future::pending::<()>().await;
            None
        }
    }
}

#[async_trait]
impl TextGeneratorPort for ScriptedTextGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, GenerationError> {
        let next = {
            let mut script = self.script();
            script.stream_requests.push(request);
            script.streams.pop_front()
        };
        let steps = next.unwrap_or_else(|| Ok(Vec::new()))?;

        let fragments = stream::unfold(
            (steps.into_iter(), cancel),
            |(mut steps, cancel)| async move {
                loop {
                    let step = steps.next()?;
                    if let Some(item) = play(step, &cancel).await {
                        return Some((item, (steps, cancel)));
                    }
                }
            },
        );
        Ok(fragments.boxed())
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, GenerationError> {
        let mut script = self.script();
        let position = script.completions.iter().position(|c| match &c.key {
            Some(key) => request.prompt.contains(key.as_str()),
            None => true,
        });
        script.completion_requests.push(request);

        let reply = match position {
            Some(index) => script.completions.remove(index).reply,
            None => Err(GenerationError::ServiceError(
                "no scripted completion left".to_string(),
            )),
        };
        reply.map(|text| Completion { text, usage: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_streams_in_order() {
        let generator = ScriptedTextGenerator::new();
        generator.push_stream(vec![ScriptedStep::text("a"), ScriptedStep::text("b")]);

        let chunks: Vec<_> = generator
            .generate(GenerationRequest::default(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(
            chunks,
            vec![
                Ok(StreamChunk::Text("a".into())),
                Ok(StreamChunk::Text("b".into()))
            ]
        );

        // 脚本用尽后返回空流
        let rest: Vec<_> = generator
            .generate(GenerationRequest::default(), CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert!(rest.is_empty());
        assert_eq!(generator.stream_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_keyed_completions_match_prompt() {
        let generator = ScriptedTextGenerator::new();
        generator.push_keyed_completion("outline", "the outline");
        generator.push_keyed_completion("cast", "the cast");

        let cast = generator
            .complete(GenerationRequest {
                prompt: "describe the cast".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cast.text, "the cast");

        let missing = generator
            .complete(GenerationRequest {
                prompt: "describe the cast".into(),
                ..Default::default()
            })
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_open_error() {
        let generator = ScriptedTextGenerator::new();
        generator.push_open_error(GenerationError::RateLimited("429".into()));
        let result = generator
            .generate(GenerationRequest::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(GenerationError::RateLimited(_))));
    }
}
