//! 生成流水线测试夹具

use std::sync::{Arc, Mutex};

use super::{
    BatchSequencer, ChapterBuffer, ChapterGenerator, ConsistencyChecker, GenerationConfig,
    OutlinePlanner, StreamConsumer,
};
use crate::application::ports::{
    ChapterPhase, GenerationEvent, GenerationEventPort, NovelStorePort,
};
use crate::domain::novel::{Chapter, ChapterId, Novel, NovelMutation, NovelSettings};
use crate::infrastructure::adapters::ScriptedTextGenerator;
use crate::infrastructure::memory::InMemoryNovelStore;

/// `n` 个英文单词
pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}

/// 记录所有事件
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<GenerationEvent>>,
}

impl EventLog {
    pub fn all(&self) -> Vec<GenerationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl GenerationEventPort for EventLog {
    fn publish(&self, event: GenerationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub struct Harness {
    pub store: Arc<InMemoryNovelStore>,
    pub generator: Arc<ScriptedTextGenerator>,
    pub events: Arc<EventLog>,
    pub config: GenerationConfig,
}

impl Harness {
    /// 没有章节的空文档
    pub fn empty() -> Self {
        Self::from_novel(Novel::new("Test Novel", NovelSettings::default()), GenerationConfig::default())
    }

    pub fn with_chapters(count: u32) -> Self {
        Self::with_settings(count, NovelSettings::default())
    }

    pub fn with_settings(count: u32, settings: NovelSettings) -> Self {
        Self::with_config(count, settings, GenerationConfig::default())
    }

    pub fn with_config(count: u32, settings: NovelSettings, config: GenerationConfig) -> Self {
        let chapters = (1..=count)
            .map(|i| Chapter::new(ChapterId::new(i), format!("Title {i}"), format!("Summary {i}")))
            .collect();
        Self::from_novel(Novel::with_chapters("Test Novel", settings, chapters), config)
    }

    fn from_novel(novel: Novel, config: GenerationConfig) -> Self {
        Self {
            store: Arc::new(InMemoryNovelStore::new(novel)),
            generator: Arc::new(ScriptedTextGenerator::new()),
            events: Arc::new(EventLog::default()),
            config,
        }
    }

    pub fn consumer(&self) -> StreamConsumer {
        StreamConsumer::new(self.generator.clone(), self.store.clone(), self.events.clone())
    }

    pub fn chapter_generator(&self) -> ChapterGenerator {
        ChapterGenerator::new(
            self.generator.clone(),
            self.store.clone(),
            self.events.clone(),
            self.config.clone(),
        )
    }

    pub fn batch(&self) -> BatchSequencer {
        BatchSequencer::new(self.chapter_generator(), self.store.clone(), self.events.clone())
    }

    pub fn outline_planner(&self) -> OutlinePlanner {
        OutlinePlanner::new(
            self.generator.clone(),
            self.store.clone(),
            self.events.clone(),
            self.config.clone(),
        )
    }

    pub fn consistency_checker(&self) -> ConsistencyChecker {
        ConsistencyChecker::new(
            self.generator.clone(),
            self.store.clone(),
            self.events.clone(),
            self.chapter_generator(),
        )
    }

    pub fn buffer(&self, id: ChapterId, target_words: u32) -> ChapterBuffer {
        ChapterBuffer::new(self.store.snapshot().id(), id, target_words)
    }

    pub fn begin(&self, id: ChapterId) {
        self.store.apply(NovelMutation::BeginChapter(id)).unwrap();
    }

    /// 直接写入一章完成的内容
    pub fn complete_chapter(&self, id: ChapterId, content: &str) {
        self.begin(id);
        self.store
            .apply(NovelMutation::AppendContent {
                chapter: id,
                delta: content.to_string(),
            })
            .unwrap();
        self.store
            .apply(NovelMutation::FinishChapter {
                chapter: id,
                summary: None,
            })
            .unwrap();
    }

    pub fn chapter(&self, id: ChapterId) -> Chapter {
        self.store.snapshot().chapter(id).unwrap().clone()
    }

    pub fn content(&self, id: ChapterId) -> String {
        self.chapter(id).content().to_string()
    }

    /// (delta, word_count, progress)
    pub fn deltas(&self) -> Vec<(String, usize, u8)> {
        self.events
            .all()
            .into_iter()
            .filter_map(|event| match event {
                GenerationEvent::ChapterDelta {
                    delta,
                    word_count,
                    progress,
                    ..
                } => Some((delta, word_count, progress)),
                _ => None,
            })
            .collect()
    }

    pub fn phases(&self, id: ChapterId) -> Vec<ChapterPhase> {
        self.events
            .all()
            .into_iter()
            .filter_map(|event| match event {
                GenerationEvent::ChapterPhaseChanged {
                    chapter_id, phase, ..
                } if chapter_id == id => Some(phase),
                _ => None,
            })
            .collect()
    }

    /// (chapter, attempt, delay_secs)
    pub fn retries(&self) -> Vec<(ChapterId, u32, u64)> {
        self.events
            .all()
            .into_iter()
            .filter_map(|event| match event {
                GenerationEvent::RetryScheduled {
                    chapter_id,
                    attempt,
                    delay_secs,
                    ..
                } => Some((chapter_id, attempt, delay_secs)),
                _ => None,
            })
            .collect()
    }

    pub fn halts(&self) -> usize {
        self.events
            .all()
            .iter()
            .filter(|event| matches!(event, GenerationEvent::BatchHalted { .. }))
            .count()
    }
}
