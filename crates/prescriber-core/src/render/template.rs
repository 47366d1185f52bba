//! Placeholder-substitution template renderer.
//!
//! Templates are UTF-8 documents with `{{name}}` placeholders (a spaced
//! `{{ name }}` form is also accepted). Substitution is exact and runs in
//! a single pass over the template: everything that is not a known
//! placeholder passes through byte-for-byte, substituted values are never
//! re-scanned (placeholder-like text inside a record field is emitted
//! verbatim), and identical inputs always yield byte-identical output.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::normalizer::NormalizedRecord;

/// Placeholders every template must carry, one per record field.
pub const REQUIRED_PLACEHOLDERS: [&str; 12] = [
    "patient_name",
    "age_years",
    "sex",
    "diagnosis",
    "symptom_duration",
    "presenting_symptoms_block",
    "allergies",
    "current_medications",
    "past_medical_history",
    "treatment_plan_block",
    "followup_text",
    "date",
];

/// Optional placeholder stamped only on final renders.
pub const APPROVAL_STAMP_PLACEHOLDER: &str = "approval_stamp";

/// Built-in prescription layout used when no custom template is supplied.
pub const DEFAULT_TEMPLATE: &str = "\
PRESCRIPTION

Date: {{date}}

PATIENT INFORMATION
Name: {{patient_name}}
Age: {{age_years}}
Sex: {{sex}}

CLINICAL SUMMARY
Diagnosis: {{diagnosis}}
Symptom duration: {{symptom_duration}}

Presenting symptoms:
{{presenting_symptoms_block}}

Allergies: {{allergies}}
Current medications: {{current_medications}}
Past medical history: {{past_medical_history}}

TREATMENT PLAN
{{treatment_plan_block}}

FOLLOW-UP
{{followup_text}}

{{approval_stamp}}
";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template is missing required placeholder {{{{{name}}}}}")]
    MissingPlaceholder { name: String },
    #[error("template is not valid UTF-8")]
    InvalidEncoding,
}

/// Whether a render is a review copy or the approved final document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Preview,
    Final { approved_at: DateTime<Utc> },
}

/// A validated template ready to render records.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    /// Validate template bytes. Fails when the bytes are not UTF-8 or any
    /// required placeholder is absent.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let template = std::str::from_utf8(bytes)
            .map_err(|_| TemplateError::InvalidEncoding)?
            .to_string();
        let present = placeholder_names(&template);
        for name in REQUIRED_PLACEHOLDERS {
            if !present.contains(&name) {
                return Err(TemplateError::MissingPlaceholder {
                    name: name.to_string(),
                });
            }
        }
        Ok(Self { template })
    }

    /// Substitute a normalized record into the template.
    ///
    /// `Final` renders stamp the approval line into `{{approval_stamp}}`;
    /// `Preview` renders substitute the empty string there, so a template
    /// without that placeholder still renders. Only spans that are
    /// placeholders in the template itself are substituted; unknown spans
    /// and placeholder syntax arriving through record values stay as-is.
    pub fn render(
        &self,
        record: &NormalizedRecord,
        mode: RenderMode,
    ) -> Result<Vec<u8>, TemplateError> {
        let stamp = match mode {
            RenderMode::Preview => String::new(),
            RenderMode::Final { approved_at } => approval_stamp(approved_at),
        };
        let bindings = bindings(record);

        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                // unterminated braces, not a placeholder
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let name = after[..end].trim();
            if name == APPROVAL_STAMP_PLACEHOLDER {
                out.push_str(&stamp);
            } else if let Some((_, value)) = bindings.iter().find(|(n, _)| *n == name) {
                out.push_str(value);
            } else {
                out.push_str(&rest[start..start + 2 + end + 2]);
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(out.into_bytes())
    }
}

impl Default for TemplateRenderer {
    /// The built-in layout. `DEFAULT_TEMPLATE` carries every required
    /// placeholder, so validation cannot fail here.
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

fn bindings(record: &NormalizedRecord) -> [(&'static str, &str); 12] {
    [
        ("patient_name", record.patient_name.as_str()),
        ("age_years", record.age_years.as_str()),
        ("sex", record.sex.as_str()),
        ("diagnosis", record.diagnosis.as_str()),
        ("symptom_duration", record.symptom_duration.as_str()),
        (
            "presenting_symptoms_block",
            record.presenting_symptoms_block.as_str(),
        ),
        ("allergies", record.allergies.as_str()),
        ("current_medications", record.current_medications.as_str()),
        ("past_medical_history", record.past_medical_history.as_str()),
        ("treatment_plan_block", record.treatment_plan_block.as_str()),
        ("followup_text", record.followup_text.as_str()),
        ("date", record.date.as_str()),
    ]
}

/// Names of every `{{...}}` span in the template, in order.
fn placeholder_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                names.push(after[..end].trim());
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    names
}

fn approval_stamp(approved_at: DateTime<Utc>) -> String {
    format!("APPROVED {}", approved_at.format("%Y-%m-%d %H:%M UTC"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StructuredRecord;
    use crate::render::normalize;
    use chrono::TimeZone;

    fn sample() -> NormalizedRecord {
        normalize(&StructuredRecord {
            patient_name: "John Doe".into(),
            age_years: "45".into(),
            diagnosis: "hypertension".into(),
            date: "2024-03-01".into(),
            ..Default::default()
        })
    }

    #[test]
    fn test_default_template_validates() {
        assert!(TemplateRenderer::from_bytes(DEFAULT_TEMPLATE.as_bytes()).is_ok());
    }

    #[test]
    fn test_missing_placeholder_is_rejected() {
        let broken = DEFAULT_TEMPLATE.replace("{{diagnosis}}", "");
        let err = TemplateRenderer::from_bytes(broken.as_bytes()).unwrap_err();
        assert_eq!(
            err,
            TemplateError::MissingPlaceholder {
                name: "diagnosis".into()
            }
        );
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let err = TemplateRenderer::from_bytes(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert_eq!(err, TemplateError::InvalidEncoding);
    }

    #[test]
    fn test_preview_render_substitutes_fields() {
        let rendered = TemplateRenderer::default()
            .render(&sample(), RenderMode::Preview)
            .unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("Name: John Doe"));
        assert!(text.contains("Diagnosis: hypertension"));
        assert!(text.contains("Date: 2024-03-01"));
        assert!(text.contains("None reported"));
        assert!(!text.contains("{{"));
        assert!(!text.contains("APPROVED"));
    }

    #[test]
    fn test_final_render_carries_approval_stamp() {
        let approved_at = Utc.with_ymd_and_hms(2024, 3, 2, 14, 30, 0).unwrap();
        let rendered = TemplateRenderer::default()
            .render(&sample(), RenderMode::Final { approved_at })
            .unwrap();
        let text = String::from_utf8(rendered).unwrap();
        assert!(text.contains("APPROVED 2024-03-02 14:30 UTC"));
    }

    #[test]
    fn test_spaced_placeholder_form() {
        let template = DEFAULT_TEMPLATE.replace("{{patient_name}}", "{{ patient_name }}");
        let renderer = TemplateRenderer::from_bytes(template.as_bytes()).unwrap();
        let text =
            String::from_utf8(renderer.render(&sample(), RenderMode::Preview).unwrap()).unwrap();
        assert!(text.contains("Name: John Doe"));
    }

    #[test]
    fn test_record_values_are_not_reinterpreted() {
        let mut record = sample();
        record.patient_name = "{{approval_stamp}} {{date}}".into();

        let approved_at = Utc.with_ymd_and_hms(2024, 3, 2, 14, 30, 0).unwrap();
        let rendered = TemplateRenderer::default()
            .render(&record, RenderMode::Final { approved_at })
            .unwrap();
        let text = String::from_utf8(rendered).unwrap();

        // the field value lands verbatim, never expanded
        assert!(text.contains("Name: {{approval_stamp}} {{date}}"));
        // the real stamp slot still renders
        assert!(text.contains("\nAPPROVED 2024-03-02 14:30 UTC"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = TemplateRenderer::default();
        let a = renderer.render(&sample(), RenderMode::Preview).unwrap();
        let b = renderer.render(&sample(), RenderMode::Preview).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_placeholder_text_passes_through() {
        let template = format!("{DEFAULT_TEMPLATE}\nliteral {{curly}} stays\n");
        let renderer = TemplateRenderer::from_bytes(template.as_bytes()).unwrap();
        let text =
            String::from_utf8(renderer.render(&sample(), RenderMode::Preview).unwrap()).unwrap();
        assert!(text.contains("literal {curly} stays"));
    }
}
