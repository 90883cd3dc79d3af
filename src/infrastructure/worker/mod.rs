//! Worker Layer - Background Task Processing
//!
//! 实现 AutosaveWorker，防抖保存当前文档

mod autosave;

pub use autosave::{AutosaveConfig, AutosaveHandle, AutosaveWorker};
