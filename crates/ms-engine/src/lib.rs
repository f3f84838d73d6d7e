//! Morningstar engine — the reflection cycle and the file-backed pieces it
//! reads from and writes to.

pub mod config;
pub mod episode_upload;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prompt;
pub mod reflection;
pub mod snapshot;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use llm::{LlmClient, TextGenerator};
pub use memory::MemoryLog;
pub use reflection::{run_cycle, CycleOutcome};
