//! 大纲规划
//!
//! 大纲（JSON 数组）与人物设定两个请求并发执行，必须都成功

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::{prompts, GenerationConfig};
use crate::application::error::ApplicationError;
use crate::application::ports::{
    Completion, GenerationError, GenerationEvent, GenerationEventPort, NovelStorePort,
    TextGeneratorPort,
};
use crate::domain::novel::{NovelError, NovelId, NovelMutation, OutlineEntry, Volume};

/// 规划结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlineOutcome {
    Ready { chapters: usize },
    Cancelled,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    volume: Option<serde_json::Value>,
}

/// 从模型回复中解析大纲
///
/// 取第一个 `[` 到最后一个 `]` 之间的内容，容忍代码块包裹和前后说明文字。
/// 卷可以是对象、编号或卷名
pub fn parse_outline(text: &str) -> Result<Vec<OutlineEntry>, NovelError> {
    let start = text.find('[');
    let end = text.rfind(']');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(NovelError::InvalidOutline(
                "reply contains no JSON array".into(),
            ))
        }
    };

    let raw: Vec<RawEntry> = serde_json::from_str(json)
        .map_err(|e| NovelError::InvalidOutline(format!("malformed outline JSON: {e}")))?;

    let mut named_volumes: HashMap<String, u32> = HashMap::new();
    let entries: Vec<OutlineEntry> = raw
        .into_iter()
        .filter(|entry| !entry.title.trim().is_empty())
        .map(|entry| OutlineEntry {
            title: entry.title.trim().to_string(),
            summary: entry.summary.trim().to_string(),
            volume: entry
                .volume
                .and_then(|value| parse_volume(value, &mut named_volumes)),
        })
        .collect();

    if entries.is_empty() {
        return Err(NovelError::InvalidOutline("outline has no chapters".into()));
    }
    Ok(entries)
}

fn parse_volume(value: serde_json::Value, named: &mut HashMap<String, u32>) -> Option<Volume> {
    match value {
        serde_json::Value::Number(n) => {
            let id = u32::try_from(n.as_u64()?).ok()?;
            Some(Volume {
                id,
                title: format!("Volume {id}"),
            })
        }
        serde_json::Value::String(title) if !title.trim().is_empty() => {
            let next = named.len() as u32 + 1;
            let id = *named.entry(title.trim().to_string()).or_insert(next);
            Some(Volume {
                id,
                title: title.trim().to_string(),
            })
        }
        serde_json::Value::Object(_) => serde_json::from_value(value).ok(),
        _ => None,
    }
}

/// 大纲规划器
#[derive(Clone)]
pub struct OutlinePlanner {
    generator: Arc<dyn TextGeneratorPort>,
    store: Arc<dyn NovelStorePort>,
    events: Arc<dyn GenerationEventPort>,
    config: GenerationConfig,
}

impl OutlinePlanner {
    pub fn new(
        generator: Arc<dyn TextGeneratorPort>,
        store: Arc<dyn NovelStorePort>,
        events: Arc<dyn GenerationEventPort>,
        config: GenerationConfig,
    ) -> Self {
        Self {
            generator,
            store,
            events,
            config,
        }
    }

    /// 为当前文档规划大纲
    pub async fn plan(
        &self,
        premise: String,
        cancel: CancellationToken,
    ) -> Result<OutlineOutcome, ApplicationError> {
        let novel = self.store.snapshot();
        let novel_id = novel.id();
        let settings = novel.settings().clone();

        self.store.apply(NovelMutation::BeginPlanning {
            premise: premise.clone(),
        })?;
        tracing::info!(novel_id = %novel_id, "Outline planning started");

        let outline_request = self.config.tune(prompts::outline(&settings, &premise));
        let cast_request = self.config.tune(prompts::characters(&settings, &premise));

        let replies = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            replies = async {
                tokio::try_join!(
                    self.generator.complete(outline_request),
                    self.generator.complete(cast_request),
                )
            } => Some(replies),
        };

        let (outline, cast) = match replies {
            None | Some(Err(GenerationError::Cancelled)) => {
                self.store.apply(NovelMutation::AbandonPlanning)?;
                tracing::info!(novel_id = %novel_id, "Outline planning cancelled");
                return Ok(OutlineOutcome::Cancelled);
            }
            Some(Err(e)) => {
                let err = ApplicationError::ExternalServiceError(e.to_string());
                return Err(self.fail(novel_id, err));
            }
            Some(Ok(replies)) => replies,
        };

        self.record_usage(&outline)?;
        self.record_usage(&cast)?;

        let entries = match parse_outline(&outline.text) {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail(novel_id, e.into())),
        };
        let chapters = entries.len();

        self.store.apply(NovelMutation::CompleteOutline {
            entries,
            characters: cast.text.trim().to_string(),
        })?;

        tracing::info!(novel_id = %novel_id, chapters, "Outline ready");
        self.events
            .publish(GenerationEvent::OutlineReady { novel_id, chapters });
        Ok(OutlineOutcome::Ready { chapters })
    }

    fn record_usage(&self, completion: &Completion) -> Result<(), ApplicationError> {
        if let Some(usage) = completion.usage {
            self.store.apply(NovelMutation::RecordUsage(usage))?;
        }
        Ok(())
    }

    fn fail(&self, novel_id: NovelId, err: ApplicationError) -> ApplicationError {
        if let Err(abandon_err) = self.store.apply(NovelMutation::AbandonPlanning) {
            tracing::warn!(error = %abandon_err, "Failed to leave planning state");
        }
        tracing::error!(novel_id = %novel_id, error = %err, "Outline planning failed");
        self.events.publish(GenerationEvent::OutlineFailed {
            novel_id,
            error: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::generation::test_support::Harness;
    use crate::domain::novel::{ChapterId, NovelStatus};

    const OUTLINE_REPLY: &str = r#"Here is the plan:
```json
[
  {"title": "The Letter", "summary": "A letter arrives", "volume": "Book One"},
  {"title": "The Road", "summary": "She leaves home", "volume": "Book One"},
  {"title": "The City", "summary": "Arrival", "volume": {"id": 2, "title": "Book Two"}}
]
```"#;

    #[test]
    fn test_parse_outline_lenient() {
        let entries = parse_outline(OUTLINE_REPLY).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].title, "The Letter");
        assert_eq!(entries[1].volume.as_ref().map(|v| v.id), Some(1));
        assert_eq!(entries[2].volume.as_ref().map(|v| v.title.as_str()), Some("Book Two"));
    }

    #[test]
    fn test_parse_outline_rejects_garbage() {
        assert!(parse_outline("no json here").is_err());
        assert!(parse_outline("[]").is_err());
        assert!(parse_outline("[{\"title\": ").is_err());
    }

    #[tokio::test]
    async fn test_plan_creates_chapters() {
        let harness = Harness::empty();
        harness.generator.push_keyed_completion("JSON array", OUTLINE_REPLY);
        harness
            .generator
            .push_keyed_completion("character cast", "Mara: a courier.");

        let outcome = harness
            .outline_planner()
            .plan("A courier crosses the desert".into(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, OutlineOutcome::Ready { chapters: 3 });
        let novel = harness.store.snapshot();
        assert_eq!(novel.status(), NovelStatus::Ready);
        assert_eq!(novel.characters(), "Mara: a courier.");
        assert_eq!(novel.premise(), "A courier crosses the desert");
        assert_eq!(novel.chapter(ChapterId::new(2)).unwrap().title(), "The Road");
        assert!(novel.chapters().iter().all(|c| c.content().is_empty()));
    }

    #[tokio::test]
    async fn test_plan_fails_when_either_request_fails() {
        let harness = Harness::empty();
        harness.generator.push_keyed_completion("JSON array", OUTLINE_REPLY);
        harness.generator.push_keyed_completion_error(
            "character cast",
            GenerationError::ServiceError("HTTP 500".into()),
        );

        let err = harness
            .outline_planner()
            .plan("premise".into(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ApplicationError::ExternalServiceError(_)));
        let novel = harness.store.snapshot();
        assert_eq!(novel.status(), NovelStatus::Idle);
        assert!(novel.chapters().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_plan_returns_to_idle() {
        let harness = Harness::empty();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = harness
            .outline_planner()
            .plan("premise".into(), cancel)
            .await
            .unwrap();

        assert_eq!(outcome, OutlineOutcome::Cancelled);
        assert_eq!(harness.store.snapshot().status(), NovelStatus::Idle);
    }
}
