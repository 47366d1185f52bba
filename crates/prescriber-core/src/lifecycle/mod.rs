//! Prescription lifecycle state machine.
//!
//! Drives `Draft` → `Previewed` → `Approved` over an injected store and
//! document converter. Every successful transition commits the prescription
//! row, any rendered artifact, and exactly one audit entry atomically;
//! failed render or conversion attempts leave the stored state untouched
//! and are recorded as `failed` audit entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;

use crate::db::{DbError, PrescriptionStore};
use crate::extract;
use crate::models::{
    ArtifactKind, AuditEntry, AuditEventKind, Prescription, PrescriptionState,
    PrescriptionSummary, StructuredRecord,
};
use crate::render::{
    normalize, ConvertError, DocumentConverter, RenderMode, TemplateError, TemplateRenderer,
};

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Prescription not found: {0}")]
    NotFound(String),

    #[error("Cannot {action} a prescription in state '{from}'")]
    InvalidStateTransition {
        from: PrescriptionState,
        action: &'static str,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Conversion(#[from] ConvertError),

    #[error(transparent)]
    Storage(#[from] DbError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Orchestrates the prescription lifecycle.
///
/// Transitions on the same prescription are serialized through a per-id
/// lock; transitions on different prescriptions proceed independently.
pub struct LifecycleManager {
    store: Arc<dyn PrescriptionStore>,
    renderer: TemplateRenderer,
    converter: Arc<dyn DocumentConverter>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn PrescriptionStore>,
        renderer: TemplateRenderer,
        converter: Arc<dyn DocumentConverter>,
    ) -> Self {
        Self {
            store,
            renderer,
            converter,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create a draft from a transcript.
    ///
    /// Extraction warnings never block draft creation; they travel with the
    /// prescription for the reviewer. The prescription date is stamped here,
    /// the one field not taken from the transcript.
    pub fn submit(&self, transcript: &str) -> LifecycleResult<Prescription> {
        let extraction = extract::extract(transcript);

        let mut record = extraction.record;
        record.date = Utc::now().format("%Y-%m-%d").to_string();

        let prescription = Prescription::new_draft(
            transcript.to_string(),
            extraction.clean_transcript,
            record,
            extraction.warnings,
        );

        self.store.commit_transition(
            &prescription,
            None,
            AuditEventKind::Created,
            "draft created from transcript",
        )?;

        tracing::info!(
            id = %prescription.id,
            warnings = prescription.warnings.len(),
            "prescription draft created"
        );
        Ok(prescription)
    }

    /// Replace the structured data and render a fresh preview.
    ///
    /// Allowed from `Draft` and `Previewed`; an `Approved` prescription can
    /// no longer be edited. The preview artifact overwrites the previous
    /// one under the same ref.
    pub fn update_and_preview(
        &self,
        id: &str,
        record: StructuredRecord,
    ) -> LifecycleResult<Prescription> {
        let lock = self.transition_lock(id)?;
        let _guard = lock.lock().map_err(|_| DbError::Poisoned)?;

        let mut prescription = self.load(id)?;
        if !prescription.is_editable() {
            return Err(LifecycleError::InvalidStateTransition {
                from: prescription.state,
                action: "edit",
            });
        }

        prescription.structured_data = record;
        let pdf = match self.render_pdf(&prescription, RenderMode::Preview) {
            Ok(pdf) => pdf,
            Err(e) => {
                self.record_failure(id, "preview", &e);
                return Err(e);
            }
        };

        let artifact_ref = ArtifactKind::Preview.artifact_ref(id);
        prescription.state = PrescriptionState::Previewed;
        prescription.preview_pdf_ref = Some(artifact_ref.clone());
        prescription.updated_at = Utc::now();

        self.store.commit_transition(
            &prescription,
            Some((&artifact_ref, &pdf)),
            AuditEventKind::RenderedPreview,
            &format!("preview rendered to {artifact_ref}"),
        )?;

        tracing::info!(id = %prescription.id, %artifact_ref, "preview rendered");
        Ok(prescription)
    }

    /// Approve a previewed prescription and render the final document.
    ///
    /// The sole path that sets `final_pdf_ref` and `approved_at`. Fails
    /// from `Draft` (nothing was reviewed) and from `Approved` (no
    /// re-approval), leaving the prescription untouched in both cases.
    pub fn approve(&self, id: &str) -> LifecycleResult<Prescription> {
        let lock = self.transition_lock(id)?;
        let _guard = lock.lock().map_err(|_| DbError::Poisoned)?;

        let mut prescription = self.load(id)?;
        if prescription.state != PrescriptionState::Previewed {
            return Err(LifecycleError::InvalidStateTransition {
                from: prescription.state,
                action: "approve",
            });
        }

        let approved_at = Utc::now();
        let pdf = match self.render_pdf(&prescription, RenderMode::Final { approved_at }) {
            Ok(pdf) => pdf,
            Err(e) => {
                self.record_failure(id, "approve", &e);
                return Err(e);
            }
        };

        let artifact_ref = ArtifactKind::Final.artifact_ref(id);
        prescription.state = PrescriptionState::Approved;
        prescription.final_pdf_ref = Some(artifact_ref.clone());
        prescription.approved_at = Some(approved_at);
        prescription.updated_at = approved_at;

        self.store.commit_transition(
            &prescription,
            Some((&artifact_ref, &pdf)),
            AuditEventKind::Approved,
            &format!("final rendered to {artifact_ref}"),
        )?;

        tracing::info!(id = %prescription.id, %artifact_ref, "prescription approved");

        // terminal state: no further transitions contend for this id
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(id);
        }
        Ok(prescription)
    }

    pub fn prescription(&self, id: &str) -> LifecycleResult<Prescription> {
        self.load(id)
    }

    pub fn list_prescriptions(&self) -> LifecycleResult<Vec<PrescriptionSummary>> {
        Ok(self.store.list_prescriptions()?)
    }

    /// The prescription's audit trail in chain order.
    pub fn audit_trail(&self, id: &str) -> LifecycleResult<Vec<AuditEntry>> {
        Ok(self.store.list_audit(id)?)
    }

    /// Latest preview document bytes.
    pub fn preview_pdf(&self, id: &str) -> LifecycleResult<Vec<u8>> {
        self.artifact(id, ArtifactKind::Preview)
    }

    /// Final approved document bytes.
    pub fn final_pdf(&self, id: &str) -> LifecycleResult<Vec<u8>> {
        self.artifact(id, ArtifactKind::Final)
    }

    fn artifact(&self, id: &str, kind: ArtifactKind) -> LifecycleResult<Vec<u8>> {
        let prescription = self.load(id)?;
        let artifact_ref = match kind {
            ArtifactKind::Preview => prescription.preview_pdf_ref,
            ArtifactKind::Final => prescription.final_pdf_ref,
        }
        .ok_or_else(|| LifecycleError::NotFound(format!("{} artifact for {id}", kind.as_str())))?;

        self.store
            .load_artifact(&artifact_ref)?
            .ok_or(LifecycleError::NotFound(artifact_ref))
    }

    fn load(&self, id: &str) -> LifecycleResult<Prescription> {
        self.store
            .load_prescription(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    fn render_pdf(
        &self,
        prescription: &Prescription,
        mode: RenderMode,
    ) -> LifecycleResult<Vec<u8>> {
        let normalized = normalize(&prescription.structured_data);
        let document = self.renderer.render(&normalized, mode)?;
        Ok(self.converter.convert(&document)?)
    }

    /// Best-effort `failed` audit entry; the original error still propagates.
    fn record_failure(&self, id: &str, action: &str, error: &LifecycleError) {
        let detail = format!("{action} failed: {error}");
        if let Err(e) = self.store.append_audit(id, AuditEventKind::Failed, &detail) {
            tracing::warn!(id, error = %e, "could not record failed transition");
        } else {
            tracing::warn!(id, %detail, "transition failed");
        }
    }

    fn transition_lock(&self, id: &str) -> LifecycleResult<Arc<Mutex<()>>> {
        let mut locks = self.locks.lock().map_err(|_| DbError::Poisoned)?;
        Ok(locks.entry(id.to_string()).or_default().clone())
    }
}
