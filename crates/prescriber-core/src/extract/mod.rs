//! Rule-based transcript extraction.
//!
//! Turns a free-text consultation transcript into a [`StructuredRecord`]
//! plus the warnings a reviewer needs to see. Extraction is pure and
//! deterministic: the same transcript always yields the same record and
//! the same warning list, and no field is ever filled with a value the
//! transcript does not contain.

mod matchers;
mod text;

use crate::models::{StructuredRecord, Warning};

pub use text::clean;

/// Fields the downstream template cannot do without; their absence is
/// always surfaced as a `missing` warning.
const REQUIRED_FIELDS: [&str; 4] = ["patient_name", "diagnosis", "medications", "allergies"];

/// Everything extraction produces for one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Whitespace-normalized transcript the matchers ran on
    pub clean_transcript: String,
    pub record: StructuredRecord,
    /// Warnings in field order: demographics, diagnosis, duration,
    /// allergies, medications
    pub warnings: Vec<Warning>,
}

/// Extract a structured record from a transcript.
///
/// The prescription date is left blank here; stamping it is a lifecycle
/// concern, not an extraction one.
pub fn extract(transcript: &str) -> Extraction {
    let clean_transcript = text::clean(transcript);

    let mut record = StructuredRecord::default();
    let mut warnings = Vec::new();

    if clean_transcript.is_empty() {
        for field in REQUIRED_FIELDS {
            warnings.push(Warning::missing(field));
        }
        return Extraction {
            clean_transcript,
            record,
            warnings,
        };
    }

    let name = matchers::patient_name(&clean_transcript);
    if name.value.is_empty() {
        warnings.push(Warning::missing("patient_name"));
    }
    record.patient_name = name.value;
    warnings.extend(name.warnings);

    let age = matchers::age_years(&clean_transcript);
    record.age_years = age.value;
    warnings.extend(age.warnings);

    record.sex = matchers::sex(&clean_transcript);

    let diagnosis = matchers::diagnosis(&clean_transcript);
    if diagnosis.value.is_empty() {
        warnings.push(Warning::missing("diagnosis"));
    }
    record.diagnosis = diagnosis.value;
    warnings.extend(diagnosis.warnings);

    let duration = matchers::symptom_duration(&clean_transcript);
    record.symptom_duration = duration.value;
    warnings.extend(duration.warnings);

    record.presenting_symptoms = matchers::presenting_symptoms(&clean_transcript);

    let allergies = matchers::allergies(&clean_transcript);
    if allergies.value.is_empty() {
        warnings.push(Warning::missing("allergies"));
    }
    record.allergies = allergies.value;
    warnings.extend(allergies.warnings);

    let current = matchers::current_medications(&clean_transcript);
    record.current_medications = current.value;
    warnings.extend(current.warnings);

    let history = matchers::past_medical_history(&clean_transcript);
    record.past_medical_history = history.value;
    warnings.extend(history.warnings);

    record.medications = matchers::medications(&clean_transcript);
    if record.medications.is_empty() {
        warnings.push(Warning::missing("medications"));
    }

    record.followup_text = matchers::followup(&clean_transcript);

    tracing::debug!(
        fields_matched = field_count(&record),
        warnings = warnings.len(),
        "extracted transcript"
    );

    Extraction {
        clean_transcript,
        record,
        warnings,
    }
}

fn field_count(record: &StructuredRecord) -> usize {
    [
        !record.patient_name.is_empty(),
        !record.age_years.is_empty(),
        !record.sex.as_str().is_empty(),
        !record.diagnosis.is_empty(),
        !record.symptom_duration.is_empty(),
        !record.presenting_symptoms.is_empty(),
        !record.allergies.is_empty(),
        !record.current_medications.is_empty(),
        !record.past_medical_history.is_empty(),
        !record.medications.is_empty(),
        !record.followup_text.is_empty(),
    ]
    .iter()
    .filter(|b| **b)
    .count()
}
