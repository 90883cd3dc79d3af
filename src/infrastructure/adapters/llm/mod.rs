//! LLM Adapter - 文本生成后端实现

mod openai_client;
mod scripted;

pub use openai_client::{OpenAiClientConfig, OpenAiCompatClient};
pub use scripted::{ScriptedStep, ScriptedTextGenerator};
