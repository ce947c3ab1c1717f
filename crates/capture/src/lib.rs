#![doc = include_str!("../README.md")]

pub mod batcher;
pub mod dissect;
pub mod dns;
pub mod error;
pub mod worker;

// --- 주요 타입 re-export ---

pub use batcher::PacketBatcher;
pub use dissect::dissect;
pub use error::CaptureError;
pub use worker::{CaptureWorker, enumerate_interfaces};
