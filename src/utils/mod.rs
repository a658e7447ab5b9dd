pub mod debounce;
pub mod time;

pub use debounce::Debouncer;
pub use time::{format_timestamp, normalize_epoch_ms, now_ms};
