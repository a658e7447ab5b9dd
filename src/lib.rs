// DeepSearch Library
// Client for the DeepSearch task API: polling, local cache, answer rendering

pub mod cache;
pub mod cli;
pub mod client;
pub mod core;
pub mod render;
pub mod search;
pub mod utils;

// Re-export commonly used types
pub use cache::{LocalCache, LocalMirror};
pub use client::{ApiError, DeepSearchClient, TaskBackend};
pub use crate::core::{Config, HistoryItem, Id, Session, TaskSnapshot, TaskStatus};
pub use render::{render_markdown, render_terminal};
pub use search::{SearchHandle, SubmitMode};

// Error handling
pub use anyhow::{Error, Result};
