//! 提示构造
//!
//! 所有请求都由文档设定生成同一份系统提示，各步骤只替换指令部分

use crate::application::ports::GenerationRequest;
use crate::domain::context_window::tail_chars;
use crate::domain::novel::{Chapter, LengthMode, Novel, NovelSettings};
use crate::domain::ContextWindow;

/// 续写提示附带的本章尾部长度
const CONTINUATION_TAIL_CHARS: usize = 4_000;

/// 一致性分析附带的章节正文上限
const ANALYSIS_CHAPTER_CHARS: usize = 20_000;

fn system_prompt(settings: &NovelSettings) -> String {
    let mut system = format!(
        "You are a professional novelist co-writing a {} novel. Write in {}.",
        non_empty(&settings.genre, "general fiction"),
        non_empty(&settings.language, "English"),
    );
    if !settings.style.trim().is_empty() {
        system.push_str(&format!(" Prose style: {}.", settings.style.trim()));
    }
    if !settings.instructions.trim().is_empty() {
        system.push_str("\nAuthor instructions: ");
        system.push_str(settings.instructions.trim());
    }
    system
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value.trim()
    }
}

fn render_context(novel: &Novel, context: &ContextWindow) -> String {
    let mut sections = Vec::new();
    if !novel.characters().trim().is_empty() {
        sections.push(format!("Characters:\n{}", novel.characters().trim()));
    }
    if !context.summaries.is_empty() {
        sections.push(format!("Story so far:\n{}", context.summaries));
    }
    if !context.recent_text.is_empty() {
        sections.push(format!("Most recent prose:\n{}", context.recent_text));
    }
    sections.join("\n\n")
}

/// 章节初稿
pub fn chapter(
    novel: &Novel,
    chapter: &Chapter,
    context: &ContextWindow,
    target_words: u32,
    guidance: Option<&str>,
) -> GenerationRequest {
    let mut prompt = format!(
        "Write {}.\nPlanned summary: {}\nAim for about {} words. Output only the chapter prose, without a heading.",
        chapter.display_title(),
        non_empty(chapter.summary(), "(none)"),
        target_words,
    );
    if novel.settings().length_mode == LengthMode::ShortForm {
        prompt.push_str("\nThis is a complete short story; give it a beginning, middle and end.");
    }
    if let Some(guidance) = guidance.filter(|g| !g.trim().is_empty()) {
        prompt.push_str("\nRevise with these consistency notes in mind:\n");
        prompt.push_str(guidance.trim());
    }

    GenerationRequest {
        system: system_prompt(novel.settings()),
        context: render_context(novel, context),
        prompt,
        ..Default::default()
    }
}

/// 续写到目标字数
pub fn continuation(
    novel: &Novel,
    chapter: &Chapter,
    context: &ContextWindow,
    written: &str,
    word_count: usize,
    target_words: u32,
) -> GenerationRequest {
    let mut sections = vec![render_context(novel, context)];
    sections.retain(|section| !section.is_empty());
    sections.push(format!(
        "{} so far (ending):\n{}",
        chapter.display_title(),
        tail_chars(written, CONTINUATION_TAIL_CHARS)
    ));

    GenerationRequest {
        system: system_prompt(novel.settings()),
        context: sections.join("\n\n"),
        prompt: format!(
            "Continue {} seamlessly from where it stops. It has about {} words; the goal is {}. \
             Do not repeat earlier text and do not conclude the whole novel.",
            chapter.display_title(),
            word_count,
            target_words,
        ),
        ..Default::default()
    }
}

/// 章节摘要
pub fn summary(novel: &Novel, chapter: &Chapter, content: &str, max_chars: usize) -> GenerationRequest {
    GenerationRequest {
        system: system_prompt(novel.settings()),
        context: content.to_string(),
        prompt: format!(
            "Summarize the events of {} in at most {} characters. \
             Keep names and plot facts needed to write later chapters.",
            chapter.display_title(),
            max_chars,
        ),
        ..Default::default()
    }
}

/// 章节大纲（JSON 数组）
pub fn outline(settings: &NovelSettings, premise: &str) -> GenerationRequest {
    let chapters = match settings.length_mode {
        LengthMode::ShortForm => 1,
        LengthMode::LongForm => settings.chapter_count.max(1),
    };
    GenerationRequest {
        system: system_prompt(settings),
        context: format!("Premise:\n{}", premise.trim()),
        prompt: format!(
            "Plan {} chapters for this novel, about {} words in total. \
             Reply with a JSON array only, each element shaped like \
             {{\"title\": \"...\", \"summary\": \"...\", \"volume\": {{\"id\": 1, \"title\": \"...\"}}}}. \
             The volume field is optional.",
            chapters, settings.total_target_words,
        ),
        ..Default::default()
    }
}

/// 人物设定
pub fn characters(settings: &NovelSettings, premise: &str) -> GenerationRequest {
    GenerationRequest {
        system: system_prompt(settings),
        context: format!("Premise:\n{}", premise.trim()),
        prompt: "Describe the main character cast: for each person give the name, role, \
                 personality, appearance and relationships. Plain text."
            .to_string(),
        ..Default::default()
    }
}

/// 一致性分析
pub fn consistency(novel: &Novel, chapter: &Chapter, context: &ContextWindow) -> GenerationRequest {
    let mut background = Vec::new();
    if !novel.characters().trim().is_empty() {
        background.push(format!("Characters:\n{}", novel.characters().trim()));
    }
    if !context.summaries.is_empty() {
        background.push(format!("Earlier chapters:\n{}", context.summaries));
    }
    background.push(format!(
        "{}:\n{}",
        chapter.display_title(),
        tail_chars(chapter.content(), ANALYSIS_CHAPTER_CHARS)
    ));

    GenerationRequest {
        system: system_prompt(novel.settings()),
        context: background.join("\n\n"),
        prompt: format!(
            "Review {} for inconsistencies with the characters and earlier chapters: \
             names, personalities, timeline, locations and facts. List each problem with a \
             suggested fix. Reply \"No issues found.\" if it is consistent.",
            chapter.display_title()
        ),
        ..Default::default()
    }
}
