//! Append-only audit ledger with a per-prescription hash chain.
//!
//! Every entry hashes its own contents together with the previous entry's
//! hash; the first entry chains from a fixed genesis sentinel. Verification
//! recomputes the chain, so editing any stored entry invalidates everything
//! recorded after it.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{parse_timestamp, DbResult};
use crate::models::{AuditEntry, AuditEventKind};

/// `prev_hash` of the first entry in every chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A verification failure, pointing at the first broken entry.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("audit chain broken at seq {seq}: {reason}")]
pub struct ChainError {
    pub seq: u64,
    pub reason: String,
}

/// SHA-256 over the entry contents and the previous hash, hex-encoded.
fn entry_hash(
    prescription_id: &str,
    seq: u64,
    timestamp: &str,
    event_kind: AuditEventKind,
    detail: &str,
    prev_hash: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{prescription_id}|{seq}|{timestamp}|{}|{detail}|{prev_hash}",
            event_kind.as_str()
        )
        .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Canonical timestamp form used for hashing and storage.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Truncate to the stored microsecond precision.
fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

/// Append one entry to a prescription's chain.
///
/// Timestamps are strictly increasing within a chain: a clock reading at or
/// before the previous entry is bumped one microsecond past it.
pub(super) fn append_entry(
    conn: &Connection,
    prescription_id: &str,
    event_kind: AuditEventKind,
    detail: &str,
) -> DbResult<AuditEntry> {
    let last: Option<(u64, String, String)> = conn
        .query_row(
            "SELECT seq, timestamp, this_hash FROM audit_log
             WHERE prescription_id = ? ORDER BY seq DESC LIMIT 1",
            [prescription_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (seq, prev_hash, prev_ts) = match last {
        Some((prev_seq, ts, hash)) => (prev_seq + 1, hash, Some(parse_timestamp(&ts)?)),
        None => (0, GENESIS_HASH.to_string(), None),
    };

    let mut timestamp = truncate_micros(Utc::now());
    if let Some(prev) = prev_ts {
        if timestamp <= prev {
            timestamp = prev + chrono::Duration::microseconds(1);
        }
    }

    let ts_str = format_timestamp(timestamp);
    let this_hash = entry_hash(prescription_id, seq, &ts_str, event_kind, detail, &prev_hash);

    conn.execute(
        "INSERT INTO audit_log (prescription_id, seq, timestamp, event_kind,
         detail, prev_hash, this_hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            prescription_id,
            seq,
            ts_str,
            event_kind.as_str(),
            detail,
            prev_hash,
            this_hash,
        ],
    )?;

    Ok(AuditEntry {
        prescription_id: prescription_id.to_string(),
        seq,
        timestamp,
        event_kind,
        detail: detail.to_string(),
        prev_hash,
        this_hash,
    })
}

/// All entries for a prescription in chain order.
pub(super) fn list_entries(conn: &Connection, prescription_id: &str) -> DbResult<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT prescription_id, seq, timestamp, event_kind, detail, prev_hash, this_hash
         FROM audit_log
         WHERE prescription_id = ?
         ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map([prescription_id], |row| {
        Ok(EntryRow {
            prescription_id: row.get(0)?,
            seq: row.get(1)?,
            timestamp: row.get(2)?,
            event_kind: row.get(3)?,
            detail: row.get(4)?,
            prev_hash: row.get(5)?,
            this_hash: row.get(6)?,
        })
    })?;

    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.try_into()?);
    }
    Ok(entries)
}

/// Verify a prescription's chain as read from storage.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainError> {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut prev_ts: Option<DateTime<Utc>> = None;

    for (index, entry) in entries.iter().enumerate() {
        if entry.seq != index as u64 {
            return Err(ChainError {
                seq: entry.seq,
                reason: format!("expected seq {index}"),
            });
        }
        if entry.prev_hash != expected_prev {
            return Err(ChainError {
                seq: entry.seq,
                reason: "prev_hash does not match previous entry".into(),
            });
        }
        let recomputed = entry_hash(
            &entry.prescription_id,
            entry.seq,
            &format_timestamp(entry.timestamp),
            entry.event_kind,
            &entry.detail,
            &entry.prev_hash,
        );
        if recomputed != entry.this_hash {
            return Err(ChainError {
                seq: entry.seq,
                reason: "entry contents do not match this_hash".into(),
            });
        }
        if let Some(prev) = prev_ts {
            if entry.timestamp <= prev {
                return Err(ChainError {
                    seq: entry.seq,
                    reason: "timestamp not strictly increasing".into(),
                });
            }
        }
        prev_ts = Some(entry.timestamp);
        expected_prev = entry.this_hash.clone();
    }
    Ok(())
}

/// Intermediate row struct for database mapping.
struct EntryRow {
    prescription_id: String,
    seq: u64,
    timestamp: String,
    event_kind: String,
    detail: String,
    prev_hash: String,
    this_hash: String,
}

impl TryFrom<EntryRow> for AuditEntry {
    type Error = super::DbError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let event_kind = AuditEventKind::parse(&row.event_kind).ok_or_else(|| {
            super::DbError::Constraint(format!("Unknown audit event kind: {}", row.event_kind))
        })?;
        Ok(AuditEntry {
            prescription_id: row.prescription_id,
            seq: row.seq,
            timestamp: parse_timestamp(&row.timestamp)?,
            event_kind,
            detail: row.detail,
            prev_hash: row.prev_hash,
            this_hash: row.this_hash,
        })
    }
}
