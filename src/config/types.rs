//! Configuration Types
//!
//! 定义所有配置结构体

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::generation::{GenerationConfig, RetryPolicy};
use crate::infrastructure::adapters::OpenAiClientConfig;
use crate::infrastructure::worker::AutosaveConfig;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 生成后端配置
    #[serde(default)]
    pub llm: LlmConfig,

    /// 生成流水线配置
    #[serde(default)]
    pub generation: GenerationSettings,

    /// 自动保存配置
    #[serde(default)]
    pub autosave: AutosaveSettings,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    /// 可安全输出的副本（隐藏 API Key）
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.llm.api_key.is_empty() {
            config.llm.api_key = "***".to_string();
        }
        config
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 生成后端类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// OpenAI 兼容的 /chat/completions 接口
    #[default]
    OpenAi,
    /// 离线脚本后端（不发起网络请求）
    Scripted,
}

/// 生成后端配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    /// 接口基础 URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// 单次请求超时（秒）
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.8
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: default_llm_base_url(),
            api_key: String::new(),
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

impl LlmConfig {
    /// 转换为 HTTP 客户端配置
    pub fn client_config(&self) -> OpenAiClientConfig {
        OpenAiClientConfig {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
            ..OpenAiClientConfig::default()
        }
    }
}

/// 生成流水线配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationSettings {
    /// 上下文中前一章正文尾部的字符预算
    #[serde(default = "default_context_budget")]
    pub context_budget_chars: usize,

    /// 每章最多续写次数
    #[serde(default = "default_max_extensions")]
    pub max_extension_iterations: u32,

    /// 单章目标字数下限
    #[serde(default = "default_min_chapter_words")]
    pub min_chapter_words: u32,

    /// 批量生成时章节间隔（秒）
    #[serde(default = "default_inter_chapter_delay")]
    pub inter_chapter_delay_secs: u64,

    /// 可重试错误的最大重试次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 限流后的退避时间（秒）
    #[serde(default = "default_rate_limit_backoff")]
    pub rate_limit_backoff_secs: u64,

    /// 网络错误后的退避时间（秒）
    #[serde(default = "default_network_backoff")]
    pub network_backoff_secs: u64,

    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

fn default_context_budget() -> usize {
    10_000
}

fn default_max_extensions() -> u32 {
    5
}

fn default_min_chapter_words() -> u32 {
    1500
}

fn default_inter_chapter_delay() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    1
}

fn default_rate_limit_backoff() -> u64 {
    60
}

fn default_network_backoff() -> u64 {
    10
}

fn default_summary_max_chars() -> usize {
    300
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            context_budget_chars: default_context_budget(),
            max_extension_iterations: default_max_extensions(),
            min_chapter_words: default_min_chapter_words(),
            inter_chapter_delay_secs: default_inter_chapter_delay(),
            max_retries: default_max_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff(),
            network_backoff_secs: default_network_backoff(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

impl GenerationSettings {
    /// 转换为流水线配置（采样参数来自 llm 段）
    pub fn pipeline_config(&self, llm: &LlmConfig) -> GenerationConfig {
        GenerationConfig {
            context_budget_chars: self.context_budget_chars,
            max_extension_iterations: self.max_extension_iterations,
            min_chapter_words: self.min_chapter_words,
            inter_chapter_delay: Duration::from_secs(self.inter_chapter_delay_secs),
            retry: RetryPolicy {
                max_retries: self.max_retries,
                rate_limit_backoff: Duration::from_secs(self.rate_limit_backoff_secs),
                network_backoff: Duration::from_secs(self.network_backoff_secs),
            },
            summary_max_chars: self.summary_max_chars,
            temperature: Some(llm.temperature),
            max_tokens: llm.max_tokens,
        }
    }
}

/// 自动保存配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AutosaveSettings {
    #[serde(default = "default_autosave_enabled")]
    pub enabled: bool,

    /// 防抖时长（秒）
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,
}

fn default_autosave_enabled() -> bool {
    true
}

fn default_debounce() -> u64 {
    3
}

impl Default for AutosaveSettings {
    fn default() -> Self {
        Self {
            enabled: default_autosave_enabled(),
            debounce_secs: default_debounce(),
        }
    }
}

impl AutosaveSettings {
    pub fn worker_config(&self) -> AutosaveConfig {
        AutosaveConfig {
            enabled: self.enabled,
            debounce: Duration::from_secs(self.debounce_secs),
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/inkstone.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.addr(), "0.0.0.0:5070");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.generation.max_extension_iterations, 5);
        assert_eq!(config.autosave.debounce_secs, 3);
        assert_eq!(config.database.database_url(), "sqlite:data/inkstone.db?mode=rwc");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [llm]
            provider = "scripted"
            max_tokens = 4096

            [generation]
            rate_limit_backoff_secs = 30
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Scripted);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.generation.rate_limit_backoff_secs, 30);
        assert_eq!(config.generation.network_backoff_secs, 10);
        assert_eq!(config.server.port, 5070);
    }

    #[test]
    fn test_pipeline_config() {
        let settings = GenerationSettings {
            inter_chapter_delay_secs: 2,
            max_retries: 3,
            ..GenerationSettings::default()
        };
        let llm = LlmConfig {
            max_tokens: Some(2048),
            ..LlmConfig::default()
        };

        let pipeline = settings.pipeline_config(&llm);
        assert_eq!(pipeline.inter_chapter_delay, Duration::from_secs(2));
        assert_eq!(pipeline.retry.max_retries, 3);
        assert_eq!(pipeline.retry.rate_limit_backoff, Duration::from_secs(60));
        assert_eq!(pipeline.temperature, Some(0.8));
        assert_eq!(pipeline.max_tokens, Some(2048));
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let mut config = AppConfig::default();
        config.llm.api_key = "sk-secret".to_string();
        assert_eq!(config.redacted().llm.api_key, "***");
        assert_eq!(config.llm.api_key, "sk-secret");
    }
}
