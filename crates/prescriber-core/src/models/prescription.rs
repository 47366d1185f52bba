//! Prescription lifecycle record and audit entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{StructuredRecord, Warning};

/// Lifecycle state of a prescription.
///
/// `Draft` → `Previewed` (re-entrant across edits) → `Approved` (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionState {
    Draft,
    Previewed,
    Approved,
}

impl PrescriptionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrescriptionState::Draft => "draft",
            PrescriptionState::Previewed => "previewed",
            PrescriptionState::Approved => "approved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PrescriptionState::Draft),
            "previewed" => Some(PrescriptionState::Previewed),
            "approved" => Some(PrescriptionState::Approved),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrescriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prescription and everything needed to trace it back to its transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    /// Opaque unique id
    pub id: String,
    /// Transcript exactly as submitted
    pub raw_transcript: String,
    /// Whitespace-normalized transcript the extractor ran on
    pub clean_transcript: String,
    pub structured_data: StructuredRecord,
    /// Extraction warnings from the original submission
    pub warnings: Vec<Warning>,
    pub state: PrescriptionState,
    /// Reference to the latest preview artifact, if any
    pub preview_pdf_ref: Option<String>,
    /// Reference to the final artifact; set exactly once, on approval
    pub final_pdf_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Prescription {
    /// Create a new draft from a submitted transcript.
    pub fn new_draft(
        raw_transcript: String,
        clean_transcript: String,
        structured_data: StructuredRecord,
        warnings: Vec<Warning>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            raw_transcript,
            clean_transcript,
            structured_data,
            warnings,
            state: PrescriptionState::Draft,
            preview_pdf_ref: None,
            final_pdf_ref: None,
            created_at: now,
            updated_at: now,
            approved_at: None,
        }
    }

    /// True while edits and preview renders are still permitted.
    pub fn is_editable(&self) -> bool {
        matches!(
            self.state,
            PrescriptionState::Draft | PrescriptionState::Previewed
        )
    }
}

/// Lightweight listing row (id plus display metadata).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionSummary {
    pub id: String,
    pub patient_name: String,
    pub state: PrescriptionState,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Kind of lifecycle event an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// Draft created from a transcript
    Created,
    /// Preview artifact rendered and committed
    RenderedPreview,
    /// Final artifact rendered and the prescription approved
    Approved,
    /// A transition was attempted and did not complete
    Failed,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Created => "created",
            AuditEventKind::RenderedPreview => "rendered_preview",
            AuditEventKind::Approved => "approved",
            AuditEventKind::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(AuditEventKind::Created),
            "rendered_preview" => Some(AuditEventKind::RenderedPreview),
            "approved" => Some(AuditEventKind::Approved),
            "failed" => Some(AuditEventKind::Failed),
            _ => None,
        }
    }
}

/// One immutable record of a lifecycle event.
///
/// Entries for a prescription form a hash chain: `this_hash` covers the
/// entry contents and `prev_hash`, so rewriting any stored entry breaks
/// verification of everything after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub prescription_id: String,
    /// Position in the per-prescription ledger, starting at 0
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub event_kind: AuditEventKind,
    pub detail: String,
    pub prev_hash: String,
    pub this_hash: String,
}

/// Which artifact slot a rendered document occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Preview,
    Final,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Preview => "preview",
            ArtifactKind::Final => "final",
        }
    }

    /// Deterministic artifact reference for a prescription. Previews reuse
    /// the same ref so each render overwrites the last.
    pub fn artifact_ref(&self, prescription_id: &str) -> String {
        format!("{}_{}.pdf", prescription_id, self.as_str())
    }
}
