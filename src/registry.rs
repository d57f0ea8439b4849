//! Session Registry
//!
//! In-memory index of active sessions, shared by the request path
//! (create/read) and the cleanup path (invalidate). The filesystem store
//! stays the single source of truth; the registry is rebuilt from it at
//! startup via [`SessionRegistry::hydrate`].
//!
//! Sessions are identified by cryptographic UUIDs to prevent enumeration.
//! No component other than the cleanup pass and the targeted
//! delete-session operation removes entries.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::store::{ArtifactStore, SessionId};

/// What the registry remembers about one session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub original_filename: String,
    pub has_chart: bool,
}

/// Thread-safe index of active sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh session ID
    pub fn new_session_id() -> SessionId {
        uuid::Uuid::new_v4().to_string()
    }

    /// Register a newly created session
    pub fn insert(&self, record: SessionRecord) {
        self.sessions
            .write()
            .insert(record.session_id.clone(), record);
    }

    /// Mark a session as having a chart artifact
    pub fn set_has_chart(&self, session_id: &str) {
        if let Some(record) = self.sessions.write().get_mut(session_id) {
            record.has_chart = true;
        }
    }

    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    /// Remove a session from the index; returns whether it was present
    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    /// All session IDs, sorted for deterministic output
    pub fn list(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Rebuild the index from the artifact store.
    ///
    /// Called once at startup so sessions written by a previous process
    /// stay reachable (and reapable). Returns the number of entries.
    pub fn hydrate(&self, store: &dyn ArtifactStore) -> crate::error::Result<usize> {
        let entries = store.list()?;
        let mut sessions = self.sessions.write();
        sessions.clear();
        for entry in entries {
            let filename = store
                .get(&entry.session_id)
                .ok()
                .and_then(|data| data.meta.map(|m| m.original_filename))
                .unwrap_or_default();
            sessions.insert(
                entry.session_id.clone(),
                SessionRecord {
                    session_id: entry.session_id,
                    created_at: entry.created_at,
                    original_filename: filename,
                    has_chart: entry.has_chart,
                },
            );
        }
        Ok(sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ArtifactPayload, FsArtifactStore};
    use std::sync::Arc;

    fn record(id: &str) -> SessionRecord {
        SessionRecord {
            session_id: id.to_string(),
            created_at: Utc::now(),
            original_filename: "data.csv".to_string(),
            has_chart: false,
        }
    }

    #[test]
    fn insert_get_remove() {
        let registry = SessionRegistry::new();
        registry.insert(record("s1"));
        assert!(registry.contains("s1"));
        assert_eq!(registry.count(), 1);

        assert!(registry.remove("s1"));
        assert!(!registry.remove("s1"));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn list_is_sorted() {
        let registry = SessionRegistry::new();
        registry.insert(record("b"));
        registry.insert(record("a"));
        registry.insert(record("c"));
        assert_eq!(registry.list(), vec!["a", "b", "c"]);
    }

    #[test]
    fn set_has_chart_updates_record() {
        let registry = SessionRegistry::new();
        registry.insert(record("s1"));
        registry.set_has_chart("s1");
        assert!(registry.get("s1").unwrap().has_chart);
        // Unknown session is a no-op
        registry.set_has_chart("nope");
    }

    #[test]
    fn hydrate_rebuilds_from_store() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path()).unwrap();
        let now = Utc::now();
        store
            .put(
                "s1",
                ArtifactPayload::Upload {
                    filename: "report.xlsx",
                    bytes: b"x",
                },
                now,
            )
            .unwrap();
        store
            .put("s1", ArtifactPayload::Chart(&serde_json::json!([])), now)
            .unwrap();

        let registry = SessionRegistry::new();
        let count = registry.hydrate(&store).unwrap();
        assert_eq!(count, 1);
        let rec = registry.get("s1").unwrap();
        assert_eq!(rec.original_filename, "report.xlsx");
        assert!(rec.has_chart);
        assert_eq!(rec.created_at, now);
    }

    #[test]
    fn concurrent_inserts() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = vec![];
        for i in 0..10 {
            let registry = Arc::clone(&registry);
            handles.push(std::thread::spawn(move || {
                registry.insert(record(&format!("s{i}")));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.count(), 10);
    }
}
