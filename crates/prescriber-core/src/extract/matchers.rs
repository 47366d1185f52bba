//! Per-field matcher units for transcript extraction.
//!
//! Each field family has its own ordered rule list, most-specific rule
//! first. The first rule with at least one match wins; later rules are not
//! consulted. A winning rule that matches several distinct values keeps the
//! first-encountered one and reports the conflict as an `ambiguous`
//! warning. Fields with no match stay blank — values are never invented.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Medication, Sex, Warning};

use super::text;

/// Result of matching one single-valued field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Extracted span (original casing), or empty when nothing matched
    pub value: String,
    pub warnings: Vec<Warning>,
}

/// One pattern in a field family's ordered rule list.
struct Rule {
    regex: Regex,
    /// Present when a match from this rule is only a weak signal
    low_confidence: Option<&'static str>,
}

impl Rule {
    fn plain(pattern: &str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("invalid matcher pattern"),
            low_confidence: None,
        }
    }

    fn low(pattern: &str, message: &'static str) -> Self {
        Self {
            regex: Regex::new(pattern).expect("invalid matcher pattern"),
            low_confidence: Some(message),
        }
    }
}

/// Run an ordered rule list against the text. First rule with a match wins.
fn first_rule_match(field: &'static str, rules: &[Rule], clean_text: &str) -> FieldMatch {
    for rule in rules {
        let mut values: Vec<String> = Vec::new();
        for caps in rule.regex.captures_iter(clean_text) {
            let m = caps.get(1).or_else(|| caps.get(0));
            if let Some(m) = m {
                let value = m.as_str().trim().trim_end_matches(',').trim().to_string();
                if !value.is_empty() {
                    values.push(value);
                }
            }
        }

        // De-duplicate while preserving first-seen order; duplicates of the
        // same value are repetition, not conflict.
        let mut distinct: Vec<String> = Vec::new();
        for value in values {
            if !distinct.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                distinct.push(value);
            }
        }

        if let Some(first) = distinct.first().cloned() {
            let mut warnings = Vec::new();
            if distinct.len() > 1 {
                warnings.push(Warning::ambiguous(field, &distinct));
            }
            if let Some(message) = rule.low_confidence {
                warnings.push(Warning::low_confidence(field, message));
            }
            return FieldMatch {
                value: first,
                warnings,
            };
        }
    }

    FieldMatch {
        value: String::new(),
        warnings: Vec::new(),
    }
}

/// Collect every match from every rule (list-valued fields), split into
/// clause items, de-duplicated case-insensitively in first-seen order.
fn all_rule_matches(rules: &[Rule], clean_text: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for rule in rules {
        for caps in rule.regex.captures_iter(clean_text) {
            if let Some(m) = caps.get(1) {
                for item in text::split_clauses(m.as_str()) {
                    if !items.iter().any(|v| v.eq_ignore_ascii_case(&item)) {
                        items.push(item);
                    }
                }
            }
        }
    }
    items
}

// ── Demographics ──────────────────────────────────────────────────────────

// Case-insensitivity is scoped to the lead-in phrase: the captured name
// itself must be capitalized, so prose after "patient is" never passes
// for a name.
static NAME_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i:\bpatient(?:'s)?\s+name\s+is)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)"),
        Rule::plain(r"(?i:\bpatient\s+is)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)+)"),
        Rule::plain(r"(?i:\b(?:mr|mrs|ms|miss)\.?)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)"),
    ]
});

static AGE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\b(\d{1,3})[-\s]?years?[-\s]?old\b"),
        Rule::plain(r"(?i)\bage(?:d)?\s*:?\s*(\d{1,3})\b"),
    ]
});

static SEX_OTHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:non-?binary|intersex)\b").unwrap());
static SEX_FEMALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:female|woman|girl)\b").unwrap());
static SEX_MALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:male|man|boy)\b").unwrap());

pub fn patient_name(clean_text: &str) -> FieldMatch {
    first_rule_match("patient_name", &NAME_RULES, clean_text)
}

pub fn age_years(clean_text: &str) -> FieldMatch {
    first_rule_match("age_years", &AGE_RULES, clean_text)
}

/// Sex keyword scan. "female" is checked before "male" because its keyword
/// set is the more specific one; no match yields `Unknown`, never a guess.
pub fn sex(clean_text: &str) -> Sex {
    if SEX_OTHER.is_match(clean_text) {
        Sex::Other
    } else if SEX_FEMALE.is_match(clean_text) {
        Sex::Female
    } else if SEX_MALE.is_match(clean_text) {
        Sex::Male
    } else {
        Sex::Unknown
    }
}

// ── Diagnosis ─────────────────────────────────────────────────────────────

static DIAGNOSIS_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\bdiagnosed\s+with\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bdiagnosis(?:\s+(?:is|of)|:)\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bpresenting\s+with\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bassessment:?\s+([^.;!?]+)"),
    ]
});

pub fn diagnosis(clean_text: &str) -> FieldMatch {
    first_rule_match("diagnosis", &DIAGNOSIS_RULES, clean_text)
}

// ── Symptom duration ──────────────────────────────────────────────────────

static DURATION_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(
            r"(?i)\b(?:for|over)\s+the\s+(?:past|last)\s+(\d+\s+(?:days?|weeks?|months?|years?))\b",
        ),
        Rule::plain(r"(?i)\bfor\s+(\d+\s+(?:days?|weeks?|months?|years?))\b"),
        Rule::plain(r"(?i)\b(\d+\s+(?:days?|weeks?|months?))\b"),
        Rule::low(
            r"(?i)\bsince\s+((?:last|this)\s+\w+|yesterday)\b",
            "Relative symptom duration without an explicit unit",
        ),
    ]
});

pub fn symptom_duration(clean_text: &str) -> FieldMatch {
    first_rule_match("symptom_duration", &DURATION_RULES, clean_text)
}

// ── Presenting symptoms ───────────────────────────────────────────────────

static SYMPTOM_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\b(?:presenting\s+)?symptoms\s+include[sd]?\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bcomplain(?:s|ing|ed)?\s+of\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bexperiencing\s+([^.;!?]+)"),
    ]
});

pub fn presenting_symptoms(clean_text: &str) -> Vec<String> {
    all_rule_matches(&SYMPTOM_RULES, clean_text)
}

// ── Allergies ─────────────────────────────────────────────────────────────

static ALLERGY_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\bno\s+known\s+(?:drug\s+)?allergies\b"),
        Rule::plain(r"(?i)\ballergic\s+to\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\ballergies(?:\s+include|:)\s+([^.;!?]+)"),
    ]
});

pub fn allergies(clean_text: &str) -> FieldMatch {
    first_rule_match("allergies", &ALLERGY_RULES, clean_text)
}

// ── Current medications ───────────────────────────────────────────────────

static CURRENT_MED_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\b(?:not\s+(?:currently\s+)?taking\s+any\s+medications?|no\s+current\s+medications?)\b"),
        Rule::plain(r"(?i)\bcurrently\s+taking\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bcurrent\s+medications?(?:\s+include|:)\s+([^.;!?]+)"),
    ]
});

pub fn current_medications(clean_text: &str) -> FieldMatch {
    first_rule_match("current_medications", &CURRENT_MED_RULES, clean_text)
}

// ── Past medical history ──────────────────────────────────────────────────

static HISTORY_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::plain(r"(?i)\bno\s+significant\s+past\s+medical\s+history\b"),
        Rule::plain(r"(?i)\bpast\s+medical\s+history(?:\s+(?:of|includes?)|:)\s+([^.;!?]+)"),
        Rule::plain(r"(?i)\bhistory\s+of\s+([^.;!?]+)"),
    ]
});

pub fn past_medical_history(clean_text: &str) -> FieldMatch {
    first_rule_match("past_medical_history", &HISTORY_RULES, clean_text)
}

// ── Prescribed medications ────────────────────────────────────────────────

/// A prescribing verb followed by the drug-name/dose segment.
static PRESCRIBE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:prescrib(?:e|ing|ed)|start(?:ing|ed)?\s+(?:him|her|them|the\s+patient)\s+on|put(?:ting)?\s+(?:him|her|them)\s+on)\s+([^.;!?]+)",
    )
    .unwrap()
});

/// Connective splitting the title from inline instructions.
static CONNECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+to\s+be\s+taken\s+").unwrap());

/// Dosage-frequency wording that starts an instruction clause.
static INSTRUCTION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:once|twice|three\s+times|four\s+times)\s+(?:a\s+day|daily|per\s+day|nightly)|every\s+\d+(?:\s*-\s*\d+)?\s+hours?|as\s+needed|with\s+food|before\s+meals?|after\s+meals?|at\s+bedtime|for\s+\d+\s+(?:days?|weeks?))",
    )
    .unwrap()
});

/// Instruction-only follow-on sentences ("Take twice daily with food").
static FOLLOWON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:to\s+be\s+taken|take|continue|use|apply)\b").unwrap());

/// Extract prescribed medications with their instruction clauses.
///
/// Each prescribing verb opens a medication; the segment after it is split
/// into title and instructions at a "to be taken" connective or the first
/// dosage-frequency phrase. Instruction-only sentences that follow attach
/// to the nearest preceding medication.
pub fn medications(clean_text: &str) -> Vec<Medication> {
    let mut found: Vec<(usize, Medication)> = Vec::new();

    for caps in PRESCRIBE.captures_iter(clean_text) {
        if let Some(segment) = caps.get(1) {
            let med = parse_segment(segment.as_str());
            if med.title.is_empty() {
                continue;
            }
            match found
                .iter_mut()
                .find(|(_, m)| m.title.eq_ignore_ascii_case(&med.title))
            {
                // Repeated mention of the same drug merges instructions
                Some((_, existing)) => {
                    for instruction in med.instructions {
                        push_instruction(existing, instruction);
                    }
                }
                None => found.push((segment.start(), med)),
            }
        }
    }

    for (offset, sentence) in text::sentences(clean_text) {
        if !FOLLOWON.is_match(sentence) || PRESCRIBE.is_match(sentence) {
            continue;
        }
        if let Some((_, med)) = found.iter_mut().filter(|(pos, _)| *pos < offset).last() {
            for clause in text::split_clauses(sentence) {
                push_instruction(med, clause);
            }
        }
    }

    found.into_iter().map(|(_, med)| med).collect()
}

fn parse_segment(segment: &str) -> Medication {
    let (title, rest) = if let Some(m) = CONNECTIVE.find(segment) {
        (&segment[..m.start()], &segment[m.end()..])
    } else if let Some(m) = INSTRUCTION_START.find(segment) {
        (&segment[..m.start()], &segment[m.start()..])
    } else {
        (segment, "")
    };

    let mut med = Medication {
        title: title.trim().trim_end_matches(',').trim().to_string(),
        instructions: Vec::new(),
    };
    for clause in text::split_clauses(rest) {
        push_instruction(&mut med, clause);
    }
    med
}

fn push_instruction(med: &mut Medication, clause: String) {
    if !med
        .instructions
        .iter()
        .any(|i| i.eq_ignore_ascii_case(&clause))
    {
        med.instructions.push(clause);
    }
}

// ── Follow-up ─────────────────────────────────────────────────────────────

static FOLLOWUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(follow[\s-]?up\s+[^.;!?]+)").unwrap());
static RETURN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(return\s+(?:immediately\s+)?(?:if|for|in|to)\s+[^.;!?]+)").unwrap()
});

/// Follow-up and return-precaution phrases, joined in transcript order.
pub fn followup(clean_text: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(caps) = FOLLOWUP_RE.captures(clean_text) {
        parts.push(caps[1].trim().to_string());
    }
    if let Some(caps) = RETURN_RE.captures(clean_text) {
        parts.push(caps[1].trim().to_string());
    }
    parts.join(". ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WarningKind;

    #[test]
    fn test_patient_name_variants() {
        assert_eq!(patient_name("Patient is John Doe, 45 year old").value, "John Doe");
        assert_eq!(patient_name("The patient's name is Jane Smith.").value, "Jane Smith");
        assert_eq!(patient_name("Saw Mr. Alan Turing.").value, "Alan Turing");
        assert_eq!(patient_name("no name here").value, "");
    }

    #[test]
    fn test_lowercase_prose_is_not_a_name() {
        assert_eq!(patient_name("Patient is feeling unwell today.").value, "");
        assert_eq!(
            patient_name("The patient is not taking any medications.").value,
            ""
        );
    }

    #[test]
    fn test_age_variants() {
        assert_eq!(age_years("a 45 year old male").value, "45");
        assert_eq!(age_years("a 45-year-old male").value, "45");
        assert_eq!(age_years("aged 72, presenting with").value, "72");
        assert_eq!(age_years("age: 8").value, "8");
        assert_eq!(age_years("no age stated").value, "");
    }

    #[test]
    fn test_conflicting_ages_keep_first_and_warn() {
        let m = age_years("a 45 year old male, later described as 54 years old");
        assert_eq!(m.value, "45");
        assert_eq!(m.warnings.len(), 1);
        assert_eq!(m.warnings[0].kind, WarningKind::Ambiguous);
        assert!(m.warnings[0].message.contains("45"));
        assert!(m.warnings[0].message.contains("54"));
    }

    #[test]
    fn test_repeated_identical_age_is_not_ambiguous() {
        let m = age_years("45 year old male, the 45 year old reports");
        assert_eq!(m.value, "45");
        assert!(m.warnings.is_empty());
    }

    #[test]
    fn test_sex_detection() {
        assert_eq!(sex("45 year old male"), Sex::Male);
        assert_eq!(sex("a 34 year old female patient"), Sex::Female);
        assert_eq!(sex("patient identifies as non-binary"), Sex::Other);
        assert_eq!(sex("patient presents with cough"), Sex::Unknown);
        // "woman" must not trip the male keyword
        assert_eq!(sex("a 60 year old woman"), Sex::Female);
    }

    #[test]
    fn test_diagnosis_rules_in_order() {
        assert_eq!(
            diagnosis("Patient diagnosed with acute bacterial sinusitis.").value,
            "acute bacterial sinusitis"
        );
        assert_eq!(
            diagnosis("presenting with hypertension. Diagnosis is type 2 diabetes.").value,
            "type 2 diabetes"
        );
        assert_eq!(
            diagnosis("presenting with seasonal allergies.").value,
            "seasonal allergies"
        );
        assert_eq!(diagnosis("nothing clinical here").value, "");
    }

    #[test]
    fn test_symptom_duration() {
        assert_eq!(symptom_duration("congestion for 5 days now").value, "5 days");
        assert_eq!(
            symptom_duration("over the past 2 weeks the cough worsened").value,
            "2 weeks"
        );
        // more specific "for N unit" wins over the bare number rule,
        // so the later "2 weeks" (follow-up) is never consulted
        assert_eq!(
            symptom_duration("coughing for 3 days. Follow up in 2 weeks.").value,
            "3 days"
        );
    }

    #[test]
    fn test_relative_duration_is_low_confidence() {
        let m = symptom_duration("feeling unwell since last Tuesday");
        assert_eq!(m.value, "last Tuesday");
        assert_eq!(m.warnings.len(), 1);
        assert_eq!(m.warnings[0].kind, WarningKind::LowConfidence);
    }

    #[test]
    fn test_presenting_symptoms_list() {
        let symptoms = presenting_symptoms(
            "Symptoms include nasal congestion, facial pain and headache. \
             Also complains of fatigue.",
        );
        assert_eq!(
            symptoms,
            vec!["nasal congestion", "facial pain", "headache", "fatigue"]
        );
    }

    #[test]
    fn test_symptoms_deduplicate_case_insensitively() {
        let symptoms =
            presenting_symptoms("Symptoms include headache and nausea. Complains of Headache.");
        assert_eq!(symptoms, vec!["headache", "nausea"]);
    }

    #[test]
    fn test_allergies() {
        assert_eq!(allergies("Patient has no known allergies.").value, "no known allergies");
        assert_eq!(allergies("She is allergic to penicillin.").value, "penicillin");
        assert_eq!(allergies("Allergies include sulfa drugs.").value, "sulfa drugs");
        assert_eq!(allergies("nothing noted").value, "");
    }

    #[test]
    fn test_current_medications() {
        assert_eq!(
            current_medications("currently taking ibuprofen 400mg as needed.").value,
            "ibuprofen 400mg as needed"
        );
        assert_eq!(
            current_medications("Patient is not taking any medications.").value,
            "not taking any medications"
        );
    }

    #[test]
    fn test_past_medical_history() {
        assert_eq!(
            past_medical_history("No significant past medical history.").value,
            "No significant past medical history"
        );
        assert_eq!(
            past_medical_history("History of asthma in childhood.").value,
            "asthma in childhood"
        );
    }

    #[test]
    fn test_medication_with_inline_frequency() {
        let meds = medications("I am prescribing Lisinopril 10mg once daily.");
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].title, "Lisinopril 10mg");
        assert_eq!(meds[0].instructions, vec!["once daily"]);
    }

    #[test]
    fn test_medication_with_connective() {
        let meds = medications(
            "Prescribing Amoxicillin 875mg to be taken twice daily with food, and continue for 10 days.",
        );
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].title, "Amoxicillin 875mg");
        assert_eq!(
            meds[0].instructions,
            vec!["twice daily with food", "continue for 10 days"]
        );
    }

    #[test]
    fn test_followon_sentence_attaches_to_nearest_medication() {
        let meds = medications(
            "Prescribing Metformin 500mg. Take twice daily with meals. \
             Also prescribing Atorvastatin 20mg at bedtime. Continue for 30 days.",
        );
        assert_eq!(meds.len(), 2);
        assert_eq!(meds[0].title, "Metformin 500mg");
        assert_eq!(meds[0].instructions, vec!["Take twice daily with meals"]);
        assert_eq!(meds[1].title, "Atorvastatin 20mg");
        assert_eq!(
            meds[1].instructions,
            vec!["at bedtime", "Continue for 30 days"]
        );
    }

    #[test]
    fn test_medication_without_instructions() {
        let meds = medications("Prescribed saline nasal rinses.");
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0].title, "saline nasal rinses");
        assert!(meds[0].instructions.is_empty());
    }

    #[test]
    fn test_no_prescription_no_medications() {
        assert!(medications("Patient looks well. No treatment needed.").is_empty());
    }

    #[test]
    fn test_followup_phrases() {
        assert_eq!(followup("Please follow up in 2 weeks."), "follow up in 2 weeks");
        assert_eq!(
            followup("Follow up in 7 days. Return immediately if fever develops."),
            "Follow up in 7 days. Return immediately if fever develops"
        );
        assert_eq!(followup("nothing else"), "");
    }
}
