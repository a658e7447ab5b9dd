pub mod config;
pub mod session;
pub mod task;

pub use config::Config;
pub use session::{HistoryItem, Id, Session};
pub use task::{TaskCreated, TaskSnapshot, TaskStatus};
