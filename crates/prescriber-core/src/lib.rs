//! Prescriber Core Library
//!
//! Transcript-to-prescription pipeline with an approval-gated lifecycle
//! and a tamper-evident audit trail.
//!
//! # Architecture
//!
//! ```text
//! Consultation transcript
//!         │
//!         ▼
//! Rule-based extraction ──► StructuredRecord + Warnings
//!         │
//! [Draft prescription]
//!         │
//!   Clinician edits ◄──────────────┐
//!         │                        │
//!         ▼                        │
//! Normalize → Template → Convert ──┘  (preview, repeatable)
//!         │
//!   Clinician approves
//!         │
//! ┌───────▼────────────────────────┐
//! │  Final render + approval stamp │
//! │  state := approved (terminal)  │
//! └───────┬────────────────────────┘
//!         │
//!   Append-only audit chain (every transition, hash-linked)
//! ```
//!
//! # Core Principle
//!
//! **No prescription is finalized without explicit approval.** Extraction
//! never invents values, and every lifecycle event leaves an immutable
//! audit entry.
//!
//! # Modules
//!
//! - [`extract`]: rule-based transcript field extraction
//! - [`models`]: domain types (Prescription, StructuredRecord, AuditEntry, ...)
//! - [`render`]: normalization, template binding, document conversion seam
//! - [`db`]: SQLite store with append-only audit enforcement
//! - [`lifecycle`]: the Draft → Previewed → Approved state machine

pub mod db;
pub mod extract;
pub mod lifecycle;
pub mod models;
pub mod render;

// Re-export commonly used types
pub use db::{verify_chain, DbError, PrescriptionStore, SqliteStore};
pub use extract::{extract, Extraction};
pub use lifecycle::{LifecycleError, LifecycleManager};
pub use models::{
    AuditEntry, AuditEventKind, Medication, Prescription, PrescriptionState, PrescriptionSummary,
    Sex, StructuredRecord, Warning, WarningKind,
};
pub use render::{
    normalize, ConvertError, DocumentConverter, RenderMode, TemplateError, TemplateRenderer,
};
