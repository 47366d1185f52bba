//! SQLite-backed prescription storage.

mod audit;
mod prescriptions;
mod schema;

pub use audit::{verify_chain, ChainError, GENESIS_HASH};
pub use schema::SCHEMA;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

use crate::models::{AuditEntry, AuditEventKind, Prescription, PrescriptionSummary};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Parse a stored RFC 3339 timestamp back into UTC.
fn parse_timestamp(s: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Constraint(format!("Bad timestamp {s:?}: {e}")))
}

/// Storage collaborator for the lifecycle manager.
///
/// `commit_transition` is the only way state changes reach storage: the
/// prescription row, the optional artifact, and the audit entry land in one
/// transaction or not at all.
pub trait PrescriptionStore: Send + Sync {
    fn save_prescription(&self, prescription: &Prescription) -> DbResult<()>;
    fn load_prescription(&self, id: &str) -> DbResult<Option<Prescription>>;
    fn list_prescriptions(&self) -> DbResult<Vec<PrescriptionSummary>>;

    /// Append an audit entry outside a transition (failure records).
    fn append_audit(
        &self,
        prescription_id: &str,
        event_kind: AuditEventKind,
        detail: &str,
    ) -> DbResult<AuditEntry>;
    fn list_audit(&self, prescription_id: &str) -> DbResult<Vec<AuditEntry>>;

    fn load_artifact(&self, artifact_ref: &str) -> DbResult<Option<Vec<u8>>>;

    /// Atomically persist a state transition: the updated prescription, an
    /// optional rendered artifact, and exactly one audit entry.
    fn commit_transition(
        &self,
        prescription: &Prescription,
        artifact: Option<(&str, &[u8])>,
        event_kind: AuditEventKind,
        detail: &str,
    ) -> DbResult<AuditEntry>;
}

/// SQLite implementation of [`PrescriptionStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

impl PrescriptionStore for SqliteStore {
    fn save_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        let conn = self.lock()?;
        prescriptions::upsert(&conn, prescription)
    }

    fn load_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        let conn = self.lock()?;
        prescriptions::get(&conn, id)
    }

    fn list_prescriptions(&self) -> DbResult<Vec<PrescriptionSummary>> {
        let conn = self.lock()?;
        prescriptions::list_summaries(&conn)
    }

    fn append_audit(
        &self,
        prescription_id: &str,
        event_kind: AuditEventKind,
        detail: &str,
    ) -> DbResult<AuditEntry> {
        let conn = self.lock()?;
        audit::append_entry(&conn, prescription_id, event_kind, detail)
    }

    fn list_audit(&self, prescription_id: &str) -> DbResult<Vec<AuditEntry>> {
        let conn = self.lock()?;
        audit::list_entries(&conn, prescription_id)
    }

    fn load_artifact(&self, artifact_ref: &str) -> DbResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        prescriptions::get_artifact(&conn, artifact_ref)
    }

    fn commit_transition(
        &self,
        prescription: &Prescription,
        artifact: Option<(&str, &[u8])>,
        event_kind: AuditEventKind,
        detail: &str,
    ) -> DbResult<AuditEntry> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        prescriptions::upsert(&tx, prescription)?;
        if let Some((artifact_ref, content)) = artifact {
            prescriptions::put_artifact(&tx, artifact_ref, &prescription.id, content)?;
        }
        let entry = audit::append_entry(&tx, &prescription.id, event_kind, detail)?;
        tx.commit()?;
        Ok(entry)
    }
}
