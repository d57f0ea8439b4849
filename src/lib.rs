//! chartflow
//!
//! Web service that accepts spreadsheet/CSV uploads, stores per-session
//! artifacts (the uploaded file plus a derived chart-configuration
//! record), and guarantees their deletion within a bounded time window.
//!
//! ## Architecture
//!
//! ```text
//! Handler
//! ├── ArtifactStore   filesystem: uploads/{id}/ + charts/{id}.json
//! ├── SessionRegistry in-memory index, rebuilt from disk at startup
//! └── CleanupScheduler
//!     ├── RetentionPolicy  pure expiry rule (now - created_at >= ttl)
//!     ├── periodic loop    interval tick → one pass
//!     └── control surface  status / config / force / delete-session
//! ```
//!
//! The request path (upload, read, attach charts) and the cleanup loop
//! run concurrently over the shared store. Deletion passes are
//! serialized by a single pass token, deletes are idempotent, and every
//! artifact carries an explicitly stored creation timestamp.

pub mod cleanup;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod retention;
pub mod store;

pub use cleanup::{CleanupRun, CleanupScheduler, CleanupStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use registry::{SessionRecord, SessionRegistry};
pub use retention::RetentionPolicy;
pub use store::{ArtifactPayload, ArtifactStore, FileStats, FsArtifactStore};
