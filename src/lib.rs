//! Inkstone - AI 协作小说创作后端
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Novel Context: 文档、章节、变更 reducer
//! - 上下文窗口与字数估算
//!
//! 应用层 (application/):
//! - Ports: 端口定义（TextGenerator, NovelStore, Repository, Events, Autosave）
//! - Generation: 流式消费、续写、单章状态机、批量生成、大纲、一致性
//! - Commands: CQRS 命令处理器
//! - Queries: CQRS 查询处理器
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - Adapters: OpenAI 兼容客户端、脚本后端
//! - Memory: 当前文档状态容器
//! - Worker: 自动保存
//! - Persistence: SQLite 存储
//! - Events: WebSocket 事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
