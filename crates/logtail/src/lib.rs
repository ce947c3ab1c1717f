#![doc = include_str!("../README.md")]

pub mod batcher;
pub mod discover;
pub mod error;
pub mod tailer;

// --- 주요 타입 re-export ---

pub use batcher::LogBatcher;
pub use discover::discover_targets;
pub use error::TailError;
pub use tailer::FileTailer;
