//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, LlmProvider};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `INKSTONE_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `INKSTONE_SERVER__PORT=8080`
/// - `INKSTONE_LLM__BASE_URL=http://localhost:11434/v1`
/// - `INKSTONE_LLM__API_KEY=sk-...`
/// - `INKSTONE_GENERATION__INTER_CHAPTER_DELAY_SECS=0`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default("llm.provider", "open_ai")?
        .set_default("llm.base_url", "https://api.openai.com/v1")?
        .set_default("llm.api_key", "")?
        .set_default("llm.model", "gpt-4o-mini")?
        .set_default("llm.timeout_secs", 120)?
        .set_default("llm.temperature", 0.8)?
        .set_default("generation.context_budget_chars", 10_000)?
        .set_default("generation.max_extension_iterations", 5)?
        .set_default("generation.min_chapter_words", 1500)?
        .set_default("generation.inter_chapter_delay_secs", 5)?
        .set_default("generation.max_retries", 1)?
        .set_default("generation.rate_limit_backoff_secs", 60)?
        .set_default("generation.network_backoff_secs", 10)?
        .set_default("generation.summary_max_chars", 300)?
        .set_default("autosave.enabled", true)?
        .set_default("autosave.debounce_secs", 3)?
        .set_default("database.path", "data/inkstone.db")?
        .set_default("database.max_connections", 5)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 例如: INKSTONE_LLM__MODEL=gpt-4o
    builder = builder.add_source(
        Environment::with_prefix("INKSTONE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| Err(ConfigError::ValidationError(message.to_string()));

    if config.server.port == 0 {
        return invalid("Server port cannot be 0");
    }

    if config.llm.provider == LlmProvider::OpenAi && config.llm.base_url.trim().is_empty() {
        return invalid("LLM base URL cannot be empty");
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return invalid("LLM temperature must be between 0 and 2");
    }

    if config.generation.max_extension_iterations == 0 {
        return invalid("max_extension_iterations must be at least 1");
    }

    if config.database.path.is_empty() {
        return invalid("Database path cannot be empty");
    }

    if config.autosave.enabled && config.autosave.debounce_secs == 0 {
        return invalid("Autosave debounce cannot be 0 when autosave is enabled");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}", config.server.addr());
    tracing::info!("LLM Provider: {:?}", config.llm.provider);
    tracing::info!("LLM Base URL: {}", config.llm.base_url);
    tracing::info!("LLM Model: {}", config.llm.model);
    tracing::info!("LLM API Key: {}", if config.llm.api_key.is_empty() { "(none)" } else { "(set)" });
    tracing::info!(
        "Chapter Words >= {}, Extensions <= {}",
        config.generation.min_chapter_words,
        config.generation.max_extension_iterations
    );
    tracing::info!(
        "Retries: {} (rate limit {}s, network {}s)",
        config.generation.max_retries,
        config.generation.rate_limit_backoff_secs,
        config.generation.network_backoff_secs
    );
    tracing::info!("Inter-chapter Delay: {}s", config.generation.inter_chapter_delay_secs);
    tracing::info!("Autosave Enabled: {}", config.autosave.enabled);
    if config.autosave.enabled {
        tracing::info!("Autosave Debounce: {}s", config.autosave.debounce_secs);
    }
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_base_url() {
        let mut config = AppConfig::default();
        config.llm.base_url = String::new();
        assert!(validate_config(&config).is_err());

        // 离线后端不需要 URL
        config.llm.provider = LlmProvider::Scripted;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_iterations() {
        let mut config = AppConfig::default();
        config.generation.max_extension_iterations = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_zero_debounce() {
        let mut config = AppConfig::default();
        config.autosave.debounce_secs = 0;
        assert!(validate_config(&config).is_err());

        config.autosave.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_empty_db_path() {
        let mut config = AppConfig::default();
        config.database.path = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 6001

[llm]
model = "local-model"
temperature = 0.5

[generation]
inter_chapter_delay_secs = 0
"#
        )
        .unwrap();

        let config = load_config_from_path(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 6001);
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.generation.inter_chapter_delay_secs, 0);
        assert_eq!(config.generation.min_chapter_words, 1500);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[generation]\nmax_extension_iterations = 0").unwrap();

        let err = load_config_from_path(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
