//! Structured prescription record and extraction warnings.

use serde::{Deserialize, Serialize};

/// Patient sex as stated in the transcript.
///
/// `Unknown` is the blank marker used when the transcript never states a
/// sex; it renders as an empty string rather than a guessed value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
    Other,
    #[default]
    Unknown,
}

impl Sex {
    /// Template/display form. `Unknown` is deliberately blank.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Other => "Other",
            Sex::Unknown => "",
        }
    }
}

impl std::fmt::Display for Sex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prescribed medication: a title line plus zero or more instruction clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    /// Drug name and dose as stated, e.g. "Lisinopril 10mg"
    pub title: String,
    /// Instruction clauses in transcript order
    pub instructions: Vec<String>,
}

/// Typed representation of the prescription-relevant fields of a transcript.
///
/// Every field holds either text explicitly derived from the transcript or
/// the deterministic blank marker (empty string / empty list). Nothing here
/// is ever inferred or invented.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecord {
    pub patient_name: String,
    pub age_years: String,
    pub sex: Sex,
    pub diagnosis: String,
    pub symptom_duration: String,
    pub presenting_symptoms: Vec<String>,
    pub allergies: String,
    pub current_medications: String,
    pub past_medical_history: String,
    pub medications: Vec<Medication>,
    pub followup_text: String,
    /// Prescription date (YYYY-MM-DD). Left blank by extraction; the
    /// lifecycle manager fills it when the draft is created.
    pub date: String,
}

/// Why a warning was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A required pattern set produced zero matches
    Missing,
    /// A single-valued field matched multiple conflicting values
    Ambiguous,
    /// A rule-flagged low-confidence match was kept
    LowConfidence,
}

/// How much attention a warning deserves during review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// A non-fatal extraction issue surfaced to the reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Record field the warning applies to, e.g. "allergies"
    pub field: String,
    pub kind: WarningKind,
    pub severity: Severity,
    pub message: String,
}

impl Warning {
    pub fn missing(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: WarningKind::Missing,
            severity: Severity::Warning,
            message: format!("No {} found in transcript", field.replace('_', " ")),
        }
    }

    pub fn ambiguous(field: &str, candidates: &[String]) -> Self {
        Self {
            field: field.to_string(),
            kind: WarningKind::Ambiguous,
            severity: Severity::Warning,
            message: format!(
                "Conflicting values for {}: {}; kept the first",
                field.replace('_', " "),
                candidates.join(", ")
            ),
        }
    }

    pub fn low_confidence(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            kind: WarningKind::LowConfidence,
            severity: Severity::Info,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sex_display() {
        assert_eq!(Sex::Male.to_string(), "Male");
        assert_eq!(Sex::Female.to_string(), "Female");
        assert_eq!(Sex::Unknown.to_string(), "");
        assert_eq!(Sex::default(), Sex::Unknown);
    }

    #[test]
    fn test_default_record_is_blank() {
        let record = StructuredRecord::default();
        assert!(record.patient_name.is_empty());
        assert!(record.presenting_symptoms.is_empty());
        assert!(record.medications.is_empty());
        assert_eq!(record.sex, Sex::Unknown);
    }

    #[test]
    fn test_warning_constructors() {
        let w = Warning::missing("patient_name");
        assert_eq!(w.kind, WarningKind::Missing);
        assert_eq!(w.severity, Severity::Warning);
        assert!(w.message.contains("patient name"));

        let w = Warning::ambiguous("age_years", &["45".into(), "54".into()]);
        assert_eq!(w.kind, WarningKind::Ambiguous);
        assert!(w.message.contains("45, 54"));

        let w = Warning::low_confidence("symptom_duration", "relative duration");
        assert_eq!(w.severity, Severity::Info);
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = StructuredRecord {
            patient_name: "John Doe".into(),
            sex: Sex::Male,
            medications: vec![Medication {
                title: "Lisinopril 10mg".into(),
                instructions: vec!["once daily".into()],
            }],
            ..Default::default()
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: StructuredRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
