//! Inkstone - AI 协作小说创作后端
//!
//! - Domain: novel/ (Bounded Context), 上下文窗口, 字数估算
//! - Application: generation, commands, queries, ports
//! - Infrastructure: http, memory, worker, persistence, adapters, events

use std::sync::Arc;

use inkstone::application::{GenerationEventPort, TextGeneratorPort};
use inkstone::config::{load_config, print_config, AppConfig, LlmProvider};
use inkstone::infrastructure::adapters::{OpenAiCompatClient, ScriptedTextGenerator};
use inkstone::infrastructure::events::EventPublisher;
use inkstone::infrastructure::http::{AppState, HttpServer, ServerConfig};
use inkstone::infrastructure::memory::InMemoryNovelStore;
use inkstone::infrastructure::persistence::sqlite::{
    create_pool, run_migrations, DatabaseConfig, SqliteNovelRepository,
};
use inkstone::infrastructure::worker::AutosaveWorker;
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},inkstone={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_generator(config: &AppConfig) -> anyhow::Result<Arc<dyn TextGeneratorPort>> {
    match config.llm.provider {
        LlmProvider::OpenAi => {
            let client = OpenAiCompatClient::new(config.llm.client_config())?;
            if !client.health_check().await {
                // 后端暂时不可达不影响启动，生成时会按错误分类处理
                tracing::warn!(base_url = %config.llm.base_url, "LLM backend health check failed");
            }
            Ok(Arc::new(client))
        }
        LlmProvider::Scripted => {
            tracing::warn!("Using scripted generator, no text will be produced");
            Ok(Arc::new(ScriptedTextGenerator::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    if std::env::args().any(|arg| arg == "--print-config") {
        println!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    init_tracing(&config);

    tracing::info!("Inkstone - AI 协作小说创作后端");
    print_config(&config);

    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    };
    let pool = create_pool(&db_config).await?;
    run_migrations(&pool).await?;

    let novel_repo = Arc::new(SqliteNovelRepository::new(pool));
    let generator = build_generator(&config).await?;

    // 启动时是一份空白文档，由前端新建或加载
    let store = InMemoryNovelStore::blank().arc();
    let event_publisher = EventPublisher::new().arc();
    let events: Arc<dyn GenerationEventPort> = event_publisher.clone();

    // 启动自动保存 Worker
    let (autosave_worker, autosave) = AutosaveWorker::new(
        config.autosave.worker_config(),
        store.clone(),
        novel_repo.clone(),
        events,
    );
    tokio::spawn(autosave_worker.run());

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        store,
        novel_repo,
        generator,
        Arc::new(autosave),
        event_publisher,
        config.generation.pipeline_config(&config.llm),
    );

    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
