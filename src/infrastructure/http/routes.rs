//! HTTP Routes
//!
//! API Endpoints:
//! - /api/ping                      GET   健康检查
//! - /api/novel/create              POST  新建文档（替换当前文档）
//! - /api/novel/load                POST  加载已保存文档
//! - /api/novel/current             GET   获取当前文档
//! - /api/novel/list                GET   列出已保存文档
//! - /api/novel/delete              POST  删除已保存文档
//! - /api/novel/save                POST  手动保存
//! - /api/novel/settings            POST  修改标题 / 创作设置
//! - /api/novel/chapter/select      POST  切换当前章节
//! - /api/novel/chapter/edit        POST  手动编辑章节
//! - /api/generate/outline          POST  规划大纲与人物（后台）
//! - /api/generate/chapter          POST  生成单章 / 强制重写（后台）
//! - /api/generate/auto             POST  顺序生成所有章节（后台）
//! - /api/generate/stop             POST  停止当前生成
//! - /api/consistency/analyze       POST  一致性分析（后台）
//! - /api/consistency/repair        POST  按分析重写章节（后台）
//! - /ws/events                     WS    生成事件推送（?novel_id= 过滤）

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/api", api_routes())
        .route("/ws/events", get(handlers::events_websocket_handler))
}

/// API 路由
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .nest("/novel", novel_routes())
        .nest("/generate", generate_routes())
        .nest("/consistency", consistency_routes())
}

/// Novel 路由
fn novel_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(handlers::create_novel))
        .route("/load", post(handlers::load_novel))
        .route("/current", get(handlers::current_novel))
        .route("/list", get(handlers::list_novels))
        .route("/delete", post(handlers::delete_novel))
        .route("/save", post(handlers::save_novel))
        .route("/settings", post(handlers::update_settings))
        .route("/chapter/select", post(handlers::select_chapter))
        .route("/chapter/edit", post(handlers::edit_chapter))
}

/// Generate 路由
fn generate_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/outline", post(handlers::plan_outline))
        .route("/chapter", post(handlers::generate_chapter))
        .route("/auto", post(handlers::auto_generate))
        .route("/stop", post(handlers::stop_generation))
}

/// Consistency 路由
fn consistency_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze", post(handlers::analyze_consistency))
        .route("/repair", post(handlers::repair_consistency))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use crate::application::{GenerationConfig, GenerationEvent};
    use crate::infrastructure::adapters::ScriptedTextGenerator;
    use crate::infrastructure::events::EventPublisher;
    use crate::infrastructure::memory::{InMemoryNovelRepository, InMemoryNovelStore};
    use crate::infrastructure::worker::{AutosaveConfig, AutosaveWorker};

    struct TestApp {
        router: Router,
        generator: Arc<ScriptedTextGenerator>,
        events: Arc<EventPublisher>,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(InMemoryNovelStore::blank());
        let repo = Arc::new(InMemoryNovelRepository::new());
        let generator = Arc::new(ScriptedTextGenerator::new());
        let events = EventPublisher::new().arc();

        let (worker, autosave) = AutosaveWorker::new(
            AutosaveConfig::default(),
            store.clone(),
            repo.clone(),
            events.clone(),
        );
        tokio::spawn(worker.run());

        let state = AppState::new(
            store,
            repo,
            generator.clone(),
            Arc::new(autosave),
            events.clone(),
            GenerationConfig::default(),
        );

        TestApp {
            router: create_routes().with_state(Arc::new(state)),
            generator,
            events,
        }
    }

    impl TestApp {
        async fn get(&self, uri: &str) -> Value {
            self.send(Method::GET, uri, None).await
        }

        async fn post(&self, uri: &str, body: Value) -> Value {
            self.send(Method::POST, uri, Some(body)).await
        }

        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> Value {
            let builder = Request::builder().method(method).uri(uri);
            let request = match body {
                Some(body) => builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string())),
                None => builder.body(Body::empty()),
            }
            .unwrap();

            let response = self.router.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            serde_json::from_slice(&bytes).unwrap()
        }
    }

    #[tokio::test]
    async fn test_ping() {
        let app = test_app();
        let body = app.get("/api/ping").await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_operation"], Value::Null);
    }

    #[tokio::test]
    async fn test_create_update_and_read_current() {
        let app = test_app();

        let created = app
            .post("/api/novel/create", json!({ "title": "Night Train" }))
            .await;
        assert_eq!(created["errno"], 0);
        let id = created["data"]["id"].clone();

        let updated = app
            .post(
                "/api/novel/settings",
                json!({ "title": "Night Train to Lisbon", "settings": { "genre": "noir", "chapter_count": 4 } }),
            )
            .await;
        assert_eq!(updated["errno"], 0);

        let current = app.get("/api/novel/current").await;
        assert_eq!(current["data"]["id"], id);
        assert_eq!(current["data"]["title"], "Night Train to Lisbon");
        assert_eq!(current["data"]["settings"]["genre"], "noir");
        assert_eq!(current["data"]["status"], "idle");
    }

    #[tokio::test]
    async fn test_errors_use_envelope() {
        let app = test_app();

        let missing = app
            .post(
                "/api/novel/chapter/edit",
                json!({ "chapter_id": 9, "content": "text" }),
            )
            .await;
        assert_eq!(missing["errno"], 404);
        assert_eq!(missing["data"], Value::Null);

        let generate = app
            .post("/api/generate/chapter", json!({ "chapter_id": 1 }))
            .await;
        assert_eq!(generate["errno"], 404);

        let auto = app.post("/api/generate/auto", json!({})).await;
        assert_eq!(auto["errno"], 409);

        let empty = app
            .post("/api/generate/outline", json!({ "premise": "  " }))
            .await;
        assert_eq!(empty["errno"], 400);

        let stop = app.post("/api/generate/stop", json!({})).await;
        assert_eq!(stop["data"]["stopped"], false);
    }

    #[tokio::test]
    async fn test_manual_save_and_list() {
        let app = test_app();

        app.post("/api/novel/create", json!({ "title": "" })).await;
        let skipped = app.post("/api/novel/save", json!({})).await;
        assert_eq!(skipped["data"]["saved"], false);

        app.post("/api/novel/settings", json!({ "title": "Harbour Lights" }))
            .await;
        let saved = app.post("/api/novel/save", json!({})).await;
        assert_eq!(saved["data"]["saved"], true);

        let list = app.get("/api/novel/list").await;
        assert_eq!(list["data"].as_array().unwrap().len(), 1);
        assert_eq!(list["data"][0]["title"], "Harbour Lights");
    }

    #[tokio::test]
    async fn test_outline_runs_in_background() {
        let app = test_app();
        let mut events = app.events.subscribe_global();
        app.generator.push_keyed_completion(
            "JSON array",
            r#"[{"title": "Arrival", "summary": "She lands."}, {"title": "Storm", "summary": "The power fails."}]"#,
        );
        app.generator
            .push_keyed_completion("character cast", "Mara: a stubborn engineer.");

        let started = app
            .post("/api/generate/outline", json!({ "premise": "A lighthouse keeper's last winter" }))
            .await;
        assert_eq!(started["data"]["operation"], "outline");

        let ready = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let GenerationEvent::OutlineReady { chapters, .. } = events.recv().await.unwrap() {
                    return chapters;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(ready, 2);

        let current = app.get("/api/novel/current").await;
        assert_eq!(current["data"]["status"], "ready");
        assert_eq!(current["data"]["chapters"][1]["title"], "Storm");
        assert_eq!(current["data"]["characters"], "Mara: a stubborn engineer.");
    }
}
