//! OpenAI 兼容客户端
//!
//! 实现 TextGeneratorPort，调用任意 OpenAI 兼容的 chat completions 接口
//!
//! POST {base_url}/chat/completions
//! - stream=true: SSE，每行 `data: {json}`，以 `data: [DONE]` 结束
//! - stream=false: 普通 JSON 响应

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    classify_message, Completion, ErrorClass, FragmentStream, GenerationError, GenerationRequest,
    StreamChunk, TextGeneratorPort,
};
use crate::domain::novel::TokenUsage;

/// 客户端配置
#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// 服务基础 URL（不含 /chat/completions）
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// 非流式请求超时（秒）
    pub timeout_secs: u64,
    /// 建立连接超时（秒）
    pub connect_timeout_secs: u64,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 120,
            connect_timeout_secs: 10,
        }
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiCompatClient {
    client: Client,
    config: OpenAiClientConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, GenerationError> {
        // 流式请求没有总超时，只限制建立连接
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            "OpenAI-compatible client initialized"
        );
        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, request: &GenerationRequest, stream: bool) -> Value {
        build_body(&self.config.model, request, stream)
    }

    async fn post(
        &self,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, GenerationError> {
        let mut builder = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(body);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }
        Ok(response)
    }
}

fn build_body(model: &str, request: &GenerationRequest, stream: bool) -> Value {
    let mut messages = Vec::new();
    if !request.system.is_empty() {
        messages.push(json!({"role": "system", "content": request.system}));
    }
    let user = if request.context.is_empty() {
        request.prompt.clone()
    } else {
        format!("{}\n\n{}", request.context, request.prompt)
    };
    messages.push(json!({"role": "user", "content": user}));

    let mut body = json!({
        "model": model,
        "messages": messages,
        "stream": stream,
    });
    if stream {
        body["stream_options"] = json!({"include_usage": true});
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    body
}

/// 把传输错误映射为生成错误
fn map_reqwest_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() {
        GenerationError::NetworkError(format!("Cannot connect to generation service: {e}"))
    } else {
        GenerationError::NetworkError(e.to_string())
    }
}

/// 把 HTTP 错误状态映射为生成错误
fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let detail = error_message(body).unwrap_or_else(|| body.trim().to_string());
    let message = format!("HTTP {}: {}", status.as_u16(), detail);

    match status.as_u16() {
        429 => GenerationError::RateLimited(message),
        408 => GenerationError::Timeout,
        _ => from_message(message),
    }
}

fn from_message(message: String) -> GenerationError {
    match classify_message(&message) {
        ErrorClass::RateLimited => GenerationError::RateLimited(message),
        ErrorClass::ContentPolicy => GenerationError::ContentPolicy(message),
        ErrorClass::TransientNetwork => GenerationError::NetworkError(message),
        _ => GenerationError::ServiceError(message),
    }
}

fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    error_from_value(&value)
}

fn error_from_value(value: &Value) -> Option<String> {
    let error = value.get("error").filter(|e| !e.is_null())?;
    if let Some(message) = error.as_str() {
        return Some(message.to_string());
    }

    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let code = error
        .get("code")
        .or_else(|| error.get("type"))
        .filter(|c| !c.is_null())
        .map(|c| c.as_str().map(str::to_string).unwrap_or_else(|| c.to_string()));
    Some(match code {
        Some(code) => format!("{message} ({code})"),
        None => message.to_string(),
    })
}

fn parse_usage(value: &Value) -> Option<TokenUsage> {
    let usage = value.get("usage").filter(|u| !u.is_null())?;
    Some(TokenUsage::new(
        usage.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
        usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0),
    ))
}

/// 单行 SSE 的解析结果
#[derive(Debug, PartialEq)]
enum SseLine {
    Ignore,
    Done,
    Items(Vec<Result<StreamChunk, GenerationError>>),
}

fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignore;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    let value: Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping malformed SSE line");
            return SseLine::Ignore;
        }
    };

    if let Some(message) = error_from_value(&value) {
        return SseLine::Items(vec![Err(from_message(message))]);
    }

    let mut items = Vec::new();
    if let Some(choice) = value.get("choices").and_then(|c| c.get(0)) {
        if let Some(content) = choice
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
        {
            items.push(Ok(StreamChunk::Text(content.to_string())));
        }
        if choice.get("finish_reason").and_then(Value::as_str) == Some("content_filter") {
            items.push(Err(GenerationError::ContentPolicy(
                "finish_reason: content_filter".to_string(),
            )));
        }
    }
    if let Some(usage) = parse_usage(&value) {
        items.push(Ok(StreamChunk::Usage(usage)));
    }
    SseLine::Items(items)
}

struct SseState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamChunk, GenerationError>>,
    finished: bool,
    cancel: CancellationToken,
}

impl SseState {
    fn feed_line(&mut self, raw: &[u8]) {
        if self.finished {
            return;
        }
        match parse_sse_line(&String::from_utf8_lossy(raw)) {
            SseLine::Ignore => {}
            SseLine::Done => self.finished = true,
            SseLine::Items(items) => {
                for item in items {
                    let failed = item.is_err();
                    self.pending.push_back(item);
                    if failed {
                        self.finished = true;
                        break;
                    }
                }
            }
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.feed_line(&line);
        }
    }
}

fn sse_stream(response: reqwest::Response, cancel: CancellationToken) -> FragmentStream {
    let state = SseState {
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
        cancel,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => None,
                next = state.bytes.next() => Some(next),
            };
            match next {
                None => {
                    state.finished = true;
                    return Some((Err(GenerationError::Cancelled), state));
                }
                Some(None) => {
                    // 最后一行可能没有换行符
                    let rest = std::mem::take(&mut state.buffer);
                    state.feed_line(&rest);
                    state.finished = true;
                }
                Some(Some(Err(e))) => {
                    state.finished = true;
                    return Some((Err(map_reqwest_error(e)), state));
                }
                Some(Some(Ok(chunk))) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_lines();
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl TextGeneratorPort for OpenAiCompatClient {
    async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<FragmentStream, GenerationError> {
        let body = self.request_body(&request, true);
        tracing::debug!(
            url = %self.completions_url(),
            prompt_len = request.prompt.len(),
            context_len = request.context.len(),
            "Opening generation stream"
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            response = self.post(&body, None) => response?,
        };
        Ok(sse_stream(response, cancel))
    }

    async fn complete(&self, request: GenerationRequest) -> Result<Completion, GenerationError> {
        let body = self.request_body(&request, false);
        let response = self
            .post(&body, Some(Duration::from_secs(self.config.timeout_secs)))
            .await?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(format!("Invalid JSON: {e}")))?;

        if let Some(message) = error_from_value(&value) {
            return Err(from_message(message));
        }
        let choice = value
            .get("choices")
            .and_then(|c| c.get(0))
            .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".into()))?;
        if choice.get("finish_reason").and_then(Value::as_str) == Some("content_filter") {
            return Err(GenerationError::ContentPolicy(
                "finish_reason: content_filter".to_string(),
            ));
        }
        let text = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| GenerationError::InvalidResponse("response has no content".into()))?
            .to_string();

        Ok(Completion {
            text,
            usage: parse_usage(&value),
        })
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.models_url())
            .bearer_auth(&self.config.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
