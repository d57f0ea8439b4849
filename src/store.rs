//! Artifact Store
//!
//! Filesystem-backed storage for session artifacts, keyed by session ID.
//! Layout under the configured temp root:
//!
//! ```text
//! temp/
//! ├── uploads/{session_id}/     original file + meta.json
//! └── charts/{session_id}.json  derived chart configuration
//! ```
//!
//! Every artifact carries an explicitly stored `created_at` (in
//! `meta.json`, mirrored into the chart record) rather than relying on
//! filesystem ctime, which is not portable across filesystems and is
//! vulnerable to clock skew. All artifacts of one session share a single
//! `created_at`; expiry is time-based only, never completeness-based, so
//! a session whose chart generation failed ages out exactly like a
//! complete one.
//!
//! `delete` is idempotent: deleting a session that is already gone is a
//! no-op success, because the cleanup pass, manual deletion, and retries
//! may race on the same session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub type SessionId = String;

/// Stored alongside the uploaded file as `meta.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub original_filename: String,
    pub stored_filename: String,
    pub size_bytes: u64,
}

/// Chart configuration record persisted at `charts/{session_id}.json`.
///
/// `created_at` is inherited from the session's upload metadata so that
/// both artifacts expire together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRecord {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub charts: serde_json::Value,
}

/// One artifact to write
pub enum ArtifactPayload<'a> {
    Upload {
        filename: &'a str,
        bytes: &'a [u8],
    },
    Chart(&'a serde_json::Value),
}

/// Reference to a written artifact
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
}

/// Everything currently stored for one session
#[derive(Debug, Clone)]
pub struct SessionData {
    pub meta: Option<SessionMeta>,
    pub charts: Option<ChartRecord>,
}

impl SessionData {
    /// The session-wide creation timestamp
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.meta
            .as_ref()
            .map(|m| m.created_at)
            .or_else(|| self.charts.as_ref().map(|c| c.created_at))
    }
}

/// One row of `list()`: enough for the retention policy to decide
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub has_upload: bool,
    pub has_chart: bool,
}

/// What a `delete` actually removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub upload: bool,
    pub chart: bool,
}

impl Removed {
    pub fn any(&self) -> bool {
        self.upload || self.chart
    }
}

/// Aggregate statistics over the backing directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileStats {
    pub active_sessions: usize,
    pub total_chart_files: usize,
    pub temp_dir: String,
}

/// Durable storage and enumeration of session artifacts.
///
/// Implementations must be safe to call concurrently from the request
/// path and the cleanup pass; in particular `list` must tolerate a
/// session being deleted mid-enumeration (treat it as gone, not as an
/// error).
pub trait ArtifactStore: Send + Sync {
    /// Write an artifact. `created_at` is set once at session creation;
    /// a chart written for an existing session inherits the session's
    /// stored timestamp instead.
    fn put(
        &self,
        session_id: &str,
        payload: ArtifactPayload<'_>,
        created_at: DateTime<Utc>,
    ) -> Result<ArtifactRef>;

    /// Fetch everything stored for a session
    fn get(&self, session_id: &str) -> Result<SessionData>;

    /// Remove all artifacts for a session. Idempotent.
    fn delete(&self, session_id: &str) -> Result<Removed>;

    /// Enumerate all current sessions with their creation timestamps
    fn list(&self) -> Result<Vec<SessionEntry>>;

    /// Current counts over the backing directory
    fn stats(&self) -> FileStats;
}

/// Filesystem implementation of [`ArtifactStore`]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Open (and create if needed) the store under `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store = Self { root };
        fs::create_dir_all(store.uploads_dir())
            .map_err(|e| Error::storage(store.uploads_dir(), e))?;
        fs::create_dir_all(store.charts_dir())
            .map_err(|e| Error::storage(store.charts_dir(), e))?;
        debug!(root = %store.root.display(), "artifact store ready");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    fn charts_dir(&self) -> PathBuf {
        self.root.join("charts")
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.uploads_dir().join(session_id)
    }

    fn meta_path(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("meta.json")
    }

    fn chart_path(&self, session_id: &str) -> PathBuf {
        self.charts_dir().join(format!("{session_id}.json"))
    }

    fn read_meta(&self, session_id: &str) -> Result<Option<SessionMeta>> {
        let path = self.meta_path(session_id);
        match fs::read(&path) {
            Ok(bytes) => {
                let meta =
                    serde_json::from_slice(&bytes).map_err(|e| Error::CorruptMetadata {
                        session_id: session_id.to_string(),
                        source: e,
                    })?;
                Ok(Some(meta))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    fn read_chart(&self, session_id: &str) -> Result<Option<ChartRecord>> {
        let path = self.chart_path(session_id);
        match fs::read(&path) {
            Ok(bytes) => {
                let record =
                    serde_json::from_slice(&bytes).map_err(|e| Error::CorruptMetadata {
                        session_id: session_id.to_string(),
                        source: e,
                    })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(path, e)),
        }
    }
}

/// Strip path separators and control characters from an uploaded
/// filename so it can never escape the session directory.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect();
    let trimmed = cleaned.trim_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put(
        &self,
        session_id: &str,
        payload: ArtifactPayload<'_>,
        created_at: DateTime<Utc>,
    ) -> Result<ArtifactRef> {
        match payload {
            ArtifactPayload::Upload { filename, bytes } => {
                let dir = self.session_dir(session_id);
                fs::create_dir_all(&dir).map_err(|e| Error::storage(&dir, e))?;

                let stored_filename = sanitize_filename(filename);
                let file_path = dir.join(&stored_filename);

                // meta.json goes first: a session directory is only
                // ever observed with its timestamp already on disk.
                let meta = SessionMeta {
                    session_id: session_id.to_string(),
                    created_at,
                    original_filename: filename.to_string(),
                    stored_filename,
                    size_bytes: bytes.len() as u64,
                };
                let meta_path = self.meta_path(session_id);
                let encoded = serde_json::to_vec_pretty(&meta).map_err(|e| {
                    Error::CorruptMetadata {
                        session_id: session_id.to_string(),
                        source: e,
                    }
                })?;
                fs::write(&meta_path, encoded).map_err(|e| Error::storage(&meta_path, e))?;

                fs::write(&file_path, bytes).map_err(|e| Error::storage(&file_path, e))?;

                debug!(session_id, path = %file_path.display(), "upload stored");
                Ok(ArtifactRef {
                    session_id: session_id.to_string(),
                    created_at,
                    path: dir,
                })
            }
            ArtifactPayload::Chart(charts) => {
                // Inherit the session's stored timestamp; a chart write
                // never restarts the TTL clock, even when only a prior
                // chart record survives.
                let created_at = match self.read_meta(session_id)? {
                    Some(meta) => meta.created_at,
                    None => match self.read_chart(session_id)? {
                        Some(existing) => existing.created_at,
                        None => created_at,
                    },
                };
                let record = ChartRecord {
                    session_id: session_id.to_string(),
                    created_at,
                    charts: charts.clone(),
                };
                let path = self.chart_path(session_id);
                let encoded = serde_json::to_vec_pretty(&record).map_err(|e| {
                    Error::CorruptMetadata {
                        session_id: session_id.to_string(),
                        source: e,
                    }
                })?;
                fs::write(&path, encoded).map_err(|e| Error::storage(&path, e))?;

                debug!(session_id, "chart record stored");
                Ok(ArtifactRef {
                    session_id: session_id.to_string(),
                    created_at,
                    path,
                })
            }
        }
    }

    fn get(&self, session_id: &str) -> Result<SessionData> {
        let meta = self.read_meta(session_id)?;
        let charts = self.read_chart(session_id)?;
        if meta.is_none() && charts.is_none() {
            return Err(Error::NotFound(session_id.to_string()));
        }
        Ok(SessionData { meta, charts })
    }

    fn delete(&self, session_id: &str) -> Result<Removed> {
        let mut removed = Removed::default();

        let dir = self.session_dir(session_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => removed.upload = true,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage(dir, e)),
        }

        let chart = self.chart_path(session_id);
        match fs::remove_file(&chart) {
            Ok(()) => removed.chart = true,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage(chart, e)),
        }

        if removed.any() {
            debug!(session_id, ?removed, "session artifacts deleted");
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<SessionEntry>> {
        let mut entries: Vec<SessionEntry> = Vec::new();

        let uploads = self.uploads_dir();
        let read_dir = fs::read_dir(&uploads).map_err(|e| Error::storage(&uploads, e))?;
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                // Entry vanished mid-enumeration: gone, not an error
                Err(_) => continue,
            };
            let session_id = dirent.file_name().to_string_lossy().to_string();
            match self.read_meta(&session_id) {
                Ok(Some(meta)) => entries.push(SessionEntry {
                    session_id,
                    created_at: meta.created_at,
                    has_upload: true,
                    has_chart: false,
                }),
                Ok(None) => {
                    // Directory without metadata: a crashed half-written
                    // upload. Fall back to the directory's mtime so it
                    // still ages out instead of leaking forever.
                    match dirent.metadata().and_then(|m| m.modified()) {
                        Ok(modified) => {
                            warn!(session_id, "upload directory without meta.json, using mtime");
                            entries.push(SessionEntry {
                                session_id,
                                created_at: DateTime::<Utc>::from(modified),
                                has_upload: true,
                                has_chart: false,
                            });
                        }
                        Err(e) => {
                            warn!(
                                session_id,
                                error = %e,
                                "upload directory without meta.json or readable mtime, skipping"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(session_id, error = %e, "unreadable session metadata, skipping");
                }
            }
        }

        let charts = self.charts_dir();
        let read_dir = fs::read_dir(&charts).map_err(|e| Error::storage(&charts, e))?;
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(d) => d,
                Err(_) => continue,
            };
            let name = dirent.file_name().to_string_lossy().to_string();
            let Some(session_id) = name.strip_suffix(".json").map(str::to_string) else {
                continue;
            };
            if let Some(existing) = entries.iter_mut().find(|e| e.session_id == session_id) {
                existing.has_chart = true;
                continue;
            }
            // Orphan chart record (upload already swept or never made):
            // still enumerable via its embedded timestamp.
            match self.read_chart(&session_id) {
                Ok(Some(record)) => entries.push(SessionEntry {
                    session_id,
                    created_at: record.created_at,
                    has_upload: false,
                    has_chart: true,
                }),
                Ok(None) => {}
                Err(e) => {
                    warn!(session_id, error = %e, "unreadable chart record, skipping");
                }
            }
        }

        Ok(entries)
    }

    fn stats(&self) -> FileStats {
        let active_sessions = fs::read_dir(self.uploads_dir())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .count()
            })
            .unwrap_or(0);
        let total_chart_files = fs::read_dir(self.charts_dir())
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".json"))
                    .count()
            })
            .unwrap_or(0);
        FileStats {
            active_sessions,
            total_chart_files,
            temp_dir: self.root.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (FsArtifactStore, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(tmp.path()).unwrap();
        (store, tmp)
    }

    #[test]
    fn put_then_get_upload() {
        let (store, _tmp) = store();
        let now = Utc::now();
        store
            .put(
                "s1",
                ArtifactPayload::Upload {
                    filename: "data.csv",
                    bytes: b"a,b\n1,2\n",
                },
                now,
            )
            .unwrap();

        let data = store.get("s1").unwrap();
        let meta = data.meta.unwrap();
        assert_eq!(meta.original_filename, "data.csv");
        assert_eq!(meta.size_bytes, 8);
        assert_eq!(meta.created_at, now);
        assert!(data.charts.is_none());
    }

    #[test]
    fn get_missing_session_is_not_found() {
        let (store, _tmp) = store();
        let err = store.get("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn chart_inherits_session_created_at() {
        let (store, _tmp) = store();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(120);
        store
            .put(
                "s1",
                ArtifactPayload::Upload {
                    filename: "data.csv",
                    bytes: b"x",
                },
                t0,
            )
            .unwrap();
        // The chart is written later but must not restart the TTL clock
        let charts = json!([{"type": "bar"}]);
        let chart_ref = store
            .put("s1", ArtifactPayload::Chart(&charts), t1)
            .unwrap();
        assert_eq!(chart_ref.created_at, t0);

        let data = store.get("s1").unwrap();
        assert_eq!(data.charts.unwrap().created_at, t0);
    }

    #[test]
    fn chart_rewrite_inherits_prior_chart_created_at() {
        let (store, _tmp) = store();
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(600);
        // Chart-only session, e.g. after a half-failed delete removed
        // the upload directory but left the chart record behind
        store
            .put("ghost", ArtifactPayload::Chart(&json!([{"type": "bar"}])), t0)
            .unwrap();

        let rewritten = store
            .put("ghost", ArtifactPayload::Chart(&json!([{"type": "line"}])), t1)
            .unwrap();
        assert_eq!(rewritten.created_at, t0);

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].created_at, t0);
    }

    #[test]
    fn list_falls_back_to_mtime_for_meta_less_directories() {
        let (store, tmp) = store();
        let half = tmp.path().join("uploads").join("half-written");
        fs::create_dir_all(&half).unwrap();
        fs::write(half.join("data.csv"), b"a,b\n").unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "half-written");
        assert!(entries[0].has_upload);
        // mtime is "just now", so the entry is young but enumerable
        let age = Utc::now() - entries[0].created_at;
        assert!(age < chrono::Duration::seconds(60));
    }

    #[test]
    fn delete_is_idempotent() {
        let (store, _tmp) = store();
        store
            .put(
                "s1",
                ArtifactPayload::Upload {
                    filename: "a.csv",
                    bytes: b"x",
                },
                Utc::now(),
            )
            .unwrap();

        let first = store.delete("s1").unwrap();
        assert!(first.any());
        let second = store.delete("s1").unwrap();
        assert!(!second.any());
    }

    #[test]
    fn list_merges_upload_and_chart() {
        let (store, _tmp) = store();
        let now = Utc::now();
        store
            .put(
                "s1",
                ArtifactPayload::Upload {
                    filename: "a.csv",
                    bytes: b"x",
                },
                now,
            )
            .unwrap();
        store
            .put("s1", ArtifactPayload::Chart(&json!([])), now)
            .unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].has_upload);
        assert!(entries[0].has_chart);
    }

    #[test]
    fn list_includes_orphan_chart_records() {
        let (store, _tmp) = store();
        let now = Utc::now();
        store
            .put("ghost", ArtifactPayload::Chart(&json!([])), now)
            .unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "ghost");
        assert!(!entries[0].has_upload);
        assert!(entries[0].has_chart);
        assert_eq!(entries[0].created_at, now);
    }

    #[test]
    fn list_skips_corrupt_metadata() {
        let (store, tmp) = store();
        store
            .put(
                "good",
                ArtifactPayload::Upload {
                    filename: "a.csv",
                    bytes: b"x",
                },
                Utc::now(),
            )
            .unwrap();
        let bad_dir = tmp.path().join("uploads").join("bad");
        fs::create_dir_all(&bad_dir).unwrap();
        fs::write(bad_dir.join("meta.json"), b"{not json").unwrap();

        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].session_id, "good");
    }

    #[test]
    fn stats_counts_directories_and_chart_files() {
        let (store, _tmp) = store();
        let now = Utc::now();
        for id in ["s1", "s2"] {
            store
                .put(
                    id,
                    ArtifactPayload::Upload {
                        filename: "a.csv",
                        bytes: b"x",
                    },
                    now,
                )
                .unwrap();
        }
        store
            .put("s1", ArtifactPayload::Chart(&json!([])), now)
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_chart_files, 1);
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("my report.xlsx"), "my report.xlsx");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename(""), "upload");
    }
}
