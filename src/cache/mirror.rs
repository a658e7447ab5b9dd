use serde::{Deserialize, Serialize};

use super::store::LocalCache;
use crate::core::{Id, Session};
use crate::utils::time::normalize_epoch_ms;

/// Key of the sessions index.
pub const SESSIONS_KEY: &str = "ds:sessions";

/// Key of a session's history list.
pub fn session_key(session_id: &Id) -> String {
    format!("ds:session:{}", session_id)
}

/// Entry of the sessions index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedSession {
    pub id: Id,
    /// Milliseconds since the epoch.
    pub created_at: i64,
    #[serde(rename = "abstract", default)]
    pub summary: String,
    pub last_updated: i64,
}

/// Entry of a per-session history list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedHistory {
    pub id: Id,
    pub timestamp: i64,
    pub user_input: String,
    pub answer: String,
}

/// Local mirror of sessions and their histories.
#[derive(Clone)]
pub struct LocalMirror {
    cache: LocalCache,
}

impl LocalMirror {
    pub fn new(cache: LocalCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Upsert a session into the index: replaced in place when known, prepended otherwise.
    pub fn save_session(&self, session: &Session, now_ms: i64) {
        let mut list = self.raw_sessions();
        let item = CachedSession {
            id: session.id.clone(),
            created_at: session.created_at.map(normalize_epoch_ms).unwrap_or(now_ms),
            summary: session.summary.clone().unwrap_or_default(),
            last_updated: now_ms,
        };

        match list.iter_mut().find(|x| x.id == item.id) {
            Some(existing) => *existing = item,
            None => list.insert(0, item),
        }
        self.cache.set(SESSIONS_KEY, &list);
    }

    /// Append a resolved query to a session's history and touch its index entry.
    pub fn save_history(&self, session_id: &Id, entry: CachedHistory) {
        let key = session_key(session_id);
        let now = entry.timestamp;
        let user_input = entry.user_input.clone();

        let mut history: Vec<CachedHistory> = self.cache.get(&key).unwrap_or_default();
        history.push(entry);
        self.cache.set(&key, &history);

        let mut sessions = self.raw_sessions();
        let mut touched = false;
        for session in sessions.iter_mut().filter(|s| &s.id == session_id) {
            if session.summary.is_empty() {
                session.summary = user_input.clone();
            }
            session.last_updated = now;
            touched = true;
        }
        if touched {
            self.cache.set(SESSIONS_KEY, &sessions);
        }
    }

    /// Cached sessions, newest first.
    pub fn sessions(&self) -> Vec<CachedSession> {
        let mut list = self.raw_sessions();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        list
    }

    pub fn histories(&self, session_id: &Id) -> Vec<CachedHistory> {
        self.cache.get(&session_key(session_id)).unwrap_or_default()
    }

    pub fn forget_session(&self, session_id: &Id) {
        self.cache.remove(&session_key(session_id));
        let mut list = self.raw_sessions();
        let before = list.len();
        list.retain(|s| &s.id != session_id);
        if list.len() != before {
            self.cache.set(SESSIONS_KEY, &list);
        }
    }

    pub fn forget_history(&self, session_id: &Id, history_id: &Id) {
        let key = session_key(session_id);
        let mut history = self.histories(session_id);
        let before = history.len();
        history.retain(|h| &h.id != history_id);
        if history.len() != before {
            self.cache.set(&key, &history);
        }
    }

    fn raw_sessions(&self) -> Vec<CachedSession> {
        self.cache.get(SESSIONS_KEY).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: i64, created_at: Option<i64>) -> Session {
        Session {
            id: Id::from(id),
            created_at,
            summary: None,
        }
    }

    fn entry(id: &str, ts: i64, input: &str, answer: &str) -> CachedHistory {
        CachedHistory {
            id: Id::from(id),
            timestamp: ts,
            user_input: input.to_string(),
            answer: answer.to_string(),
        }
    }

    #[test]
    fn test_save_session_prepends_and_replaces() {
        let mirror = LocalMirror::new(LocalCache::in_memory());
        mirror.save_session(&session(1, Some(1_700_000_000)), 10);
        mirror.save_session(&session(2, None), 20);
        mirror.save_session(&session(1, Some(1_700_000_000)), 30);

        let raw = mirror.raw_sessions();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].id, Id::from(2));
        assert_eq!(raw[1].last_updated, 30);
        assert_eq!(raw[1].created_at, 1_700_000_000_000);
        assert_eq!(raw[0].created_at, 20);
    }

    #[test]
    fn test_sessions_sorted_on_read() {
        let mirror = LocalMirror::new(LocalCache::in_memory());
        mirror.save_session(&session(1, Some(1_800_000_000)), 0);
        mirror.save_session(&session(2, Some(1_600_000_000)), 0);
        mirror.save_session(&session(3, Some(1_700_000_000)), 0);

        let ids: Vec<_> = mirror.sessions().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![Id::from(1), Id::from(3), Id::from(2)]);
    }

    #[test]
    fn test_save_history_backfills_abstract_once() {
        let mirror = LocalMirror::new(LocalCache::in_memory());
        let id = Id::from(4);
        mirror.save_session(&session(4, None), 1);

        mirror.save_history(&id, entry("a", 5, "first question", "one"));
        mirror.save_history(&id, entry("b", 9, "second question", "two"));

        let sessions = mirror.sessions();
        assert_eq!(sessions[0].summary, "first question");
        assert_eq!(sessions[0].last_updated, 9);

        let history = mirror.histories(&id);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].answer, "two");
    }

    #[test]
    fn test_forget_session_and_history() {
        let mirror = LocalMirror::new(LocalCache::in_memory());
        let id = Id::from(8);
        mirror.save_session(&session(8, None), 1);
        mirror.save_history(&id, entry("h1", 2, "q1", "a1"));
        mirror.save_history(&id, entry("h2", 3, "q2", "a2"));

        mirror.forget_history(&id, &Id::from("h1"));
        assert_eq!(mirror.histories(&id).len(), 1);

        mirror.forget_session(&id);
        assert!(mirror.sessions().is_empty());
        assert!(mirror.histories(&id).is_empty());
    }

    #[test]
    fn test_cached_layout_uses_camel_case() {
        let json = serde_json::to_value(entry("1", 2, "q", "a")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "1", "timestamp": 2, "userInput": "q", "answer": "a"})
        );
    }
}
