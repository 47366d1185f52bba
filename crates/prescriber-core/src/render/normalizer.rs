//! Flattens a structured record into the strings the template binds.

use crate::models::StructuredRecord;

/// Block text when no symptoms were extracted.
pub const EMPTY_SYMPTOMS_BLOCK: &str = "None reported";
/// Block text when no medications were extracted.
pub const EMPTY_TREATMENT_BLOCK: &str = "No medications prescribed";

/// One string per template placeholder, computed blocks included.
///
/// Scalar fields pass through as-is (blank stays blank); only the two
/// computed blocks substitute fallback text when their source list is
/// empty, so the rendered document never shows a bare heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub patient_name: String,
    pub age_years: String,
    pub sex: String,
    pub diagnosis: String,
    pub symptom_duration: String,
    pub presenting_symptoms_block: String,
    pub allergies: String,
    pub current_medications: String,
    pub past_medical_history: String,
    pub treatment_plan_block: String,
    pub followup_text: String,
    pub date: String,
}

/// Normalize a record for rendering. Idempotent: depends only on the
/// current field contents and order.
pub fn normalize(record: &StructuredRecord) -> NormalizedRecord {
    NormalizedRecord {
        patient_name: record.patient_name.clone(),
        age_years: record.age_years.clone(),
        sex: record.sex.as_str().to_string(),
        diagnosis: record.diagnosis.clone(),
        symptom_duration: record.symptom_duration.clone(),
        presenting_symptoms_block: symptoms_block(record),
        allergies: record.allergies.clone(),
        current_medications: record.current_medications.clone(),
        past_medical_history: record.past_medical_history.clone(),
        treatment_plan_block: treatment_block(record),
        followup_text: record.followup_text.clone(),
        date: record.date.clone(),
    }
}

fn symptoms_block(record: &StructuredRecord) -> String {
    if record.presenting_symptoms.is_empty() {
        return EMPTY_SYMPTOMS_BLOCK.to_string();
    }
    record
        .presenting_symptoms
        .iter()
        .map(|s| format!("• {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn treatment_block(record: &StructuredRecord) -> String {
    if record.medications.is_empty() {
        return EMPTY_TREATMENT_BLOCK.to_string();
    }
    record
        .medications
        .iter()
        .map(|med| {
            let mut lines = vec![med.title.clone()];
            for instruction in &med.instructions {
                lines.push(format!("  • {instruction}"));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
