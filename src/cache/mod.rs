pub mod mirror;
pub mod store;

pub use mirror::{session_key, CachedHistory, CachedSession, LocalMirror, SESSIONS_KEY};
pub use store::{FileStore, KeyValueStore, LocalCache, MemoryStore};
