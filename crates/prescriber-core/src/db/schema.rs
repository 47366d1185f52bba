//! SQLite schema definition.

/// Complete database schema for the prescriber store.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Prescriptions (Mutable until approved)
-- ============================================================================

CREATE TABLE IF NOT EXISTS prescriptions (
    id TEXT PRIMARY KEY,
    raw_transcript TEXT NOT NULL,
    clean_transcript TEXT NOT NULL,
    structured_data TEXT NOT NULL,               -- JSON StructuredRecord
    warnings TEXT NOT NULL DEFAULT '[]',         -- JSON array of Warning
    state TEXT NOT NULL DEFAULT 'draft'
        CHECK (state IN ('draft', 'previewed', 'approved')),
    preview_pdf_ref TEXT,
    final_pdf_ref TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    approved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_prescriptions_state ON prescriptions(state);
CREATE INDEX IF NOT EXISTS idx_prescriptions_created ON prescriptions(created_at);

-- ============================================================================
-- Audit Log (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_log (
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    seq INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    event_kind TEXT NOT NULL
        CHECK (event_kind IN ('created', 'rendered_preview', 'approved', 'failed')),
    detail TEXT NOT NULL DEFAULT '',
    prev_hash TEXT NOT NULL,                     -- SHA-256 of previous entry
    this_hash TEXT NOT NULL,                     -- SHA-256 over contents + prev_hash
    PRIMARY KEY (prescription_id, seq)
);

-- Rewriting history is forbidden at the engine level
CREATE TRIGGER IF NOT EXISTS audit_log_no_update BEFORE UPDATE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_log_no_delete BEFORE DELETE ON audit_log
BEGIN
    SELECT RAISE(ABORT, 'audit_log is append-only');
END;

-- ============================================================================
-- Rendered Artifacts
-- ============================================================================

CREATE TABLE IF NOT EXISTS artifacts (
    artifact_ref TEXT PRIMARY KEY,
    prescription_id TEXT NOT NULL REFERENCES prescriptions(id),
    content BLOB NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_artifacts_prescription ON artifacts(prescription_id);
"#;
