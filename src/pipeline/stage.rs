//! Stage definitions: names, schemas, requests, results, and the
//! deterministic fallback value each stage substitutes on failure.

use std::fmt;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::prompts;

/// Timestamp format used for prescription date back-fill.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The six extraction stages.
///
/// Stages 1-5 form the assessment chain; `Prescription` is a separate
/// workflow sharing only the transcription step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    ChiefComplaints,
    StructuredIntake,
    PresentingIllness,
    DifferentialDiagnosis,
    PatientSummary,
    Prescription,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::ChiefComplaints => "chief_complaints",
            StageName::StructuredIntake => "structured_intake",
            StageName::PresentingIllness => "presenting_illness",
            StageName::DifferentialDiagnosis => "differential_diagnosis",
            StageName::PatientSummary => "patient_summary",
            StageName::Prescription => "prescription",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected shape of a stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Top-level JSON object.
    Object,
    /// Top-level JSON array.
    Array,
    /// Raw trimmed text, no JSON parsing.
    Freeform,
}

/// Immutable description of one stage invocation: prompt, persona,
/// schema, and sampling parameters.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub stage: StageName,
    /// Separate system persona. When absent, the prompt itself is sent
    /// as the system message.
    pub system: Option<String>,
    pub prompt: String,
    pub schema: SchemaKind,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl ExtractionRequest {
    /// Stage 1: chief complaints from the transcript alone.
    pub fn chief_complaints(transcript: &str) -> Self {
        Self {
            stage: StageName::ChiefComplaints,
            system: None,
            prompt: prompts::build_chief_complaints_prompt(transcript),
            schema: SchemaKind::Array,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Stage 2: fixed-shape intake record from transcript + prior history.
    pub fn structured_intake(transcript: &str, prior_history: &str) -> Self {
        Self {
            stage: StageName::StructuredIntake,
            system: None,
            prompt: prompts::build_structured_intake_prompt(transcript, prior_history),
            schema: SchemaKind::Object,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Stage 3: presenting-illness narrative, freeform text with a token cap.
    pub fn presenting_illness(transcript: &str) -> Self {
        Self {
            stage: StageName::PresentingIllness,
            system: Some(prompts::MEDICAL_HISTORIAN_SYSTEM_PROMPT.to_string()),
            prompt: prompts::build_presenting_illness_prompt(transcript),
            schema: SchemaKind::Freeform,
            temperature: 0.3,
            max_tokens: Some(1000),
        }
    }

    /// Stage 4: differential diagnosis from the serialized intake result.
    pub fn differential_diagnosis(intake: &Value) -> Self {
        Self {
            stage: StageName::DifferentialDiagnosis,
            system: Some(prompts::DIAGNOSIS_SYSTEM_PROMPT.to_string()),
            prompt: prompts::build_differential_diagnosis_prompt(intake),
            schema: SchemaKind::Object,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Stage 5: patient summary from all four upstream results.
    pub fn patient_summary(
        intake: &Value,
        chief_complaints: &Value,
        differential_diagnosis: &Value,
        presenting_illness: &Value,
    ) -> Self {
        Self {
            stage: StageName::PatientSummary,
            system: None,
            prompt: prompts::build_patient_summary_prompt(
                intake,
                chief_complaints,
                differential_diagnosis,
                presenting_illness,
            ),
            schema: SchemaKind::Object,
            temperature: 0.2,
            max_tokens: None,
        }
    }

    /// Stage 6: prescription from the transcript alone.
    pub fn prescription(transcript: &str) -> Self {
        Self {
            stage: StageName::Prescription,
            system: Some(prompts::PRESCRIPTION_SYSTEM_PROMPT.to_string()),
            prompt: prompts::build_prescription_prompt(transcript),
            schema: SchemaKind::Object,
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

/// Result of one stage invocation. Every invocation produces one of
/// these; there is no silent-failure path out of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionResult {
    /// The service returned data conforming to the stage's schema.
    Ok { value: Value },
    /// The call failed or returned a malformed shape; `value` is the
    /// stage's deterministic placeholder and `reason` records why.
    Fallback { value: Value, reason: String },
}

impl ExtractionResult {
    pub fn ok(value: Value) -> Self {
        ExtractionResult::Ok { value }
    }

    pub fn fallback(value: Value, reason: impl Into<String>) -> Self {
        ExtractionResult::Fallback {
            value,
            reason: reason.into(),
        }
    }

    /// The stage's value, conforming or placeholder.
    pub fn value(&self) -> &Value {
        match self {
            ExtractionResult::Ok { value } => value,
            ExtractionResult::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ExtractionResult::Ok { value } => value,
            ExtractionResult::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ExtractionResult::Fallback { .. })
    }

    /// Failure reason when the fallback branch was taken.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ExtractionResult::Ok { .. } => None,
            ExtractionResult::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Deterministic placeholder for a failed stage.
///
/// The same value is substituted on service failure and on malformed
/// responses; the two paths are distinguished only by the result's
/// `reason` string. The presenting-illness placeholder embeds `reason`
/// directly, since its consumers expect reviewable text rather than a
/// structured shape.
pub fn fallback_value(stage: StageName, reason: &str) -> Value {
    match stage {
        StageName::ChiefComplaints => json!([
            {"Complaint": "Unable to extract", "Duration": "N/A"}
        ]),
        StageName::StructuredIntake => json!({
            "Error": "Unable to extract structured intake"
        }),
        StageName::PresentingIllness => Value::String(format!(
            "Unable to extract presenting illness: {reason}. \
Please review the conversation manually or retry."
        )),
        StageName::DifferentialDiagnosis => json!({
            "DifferentialDiagnosis": [
                "Acute Coronary Syndrome (ACS)",
                "Unstable Angina",
                "Myocardial Infarction",
                "Hypertensive Emergency"
            ],
            "Recommendations": {
                "AdditionalHistory": [
                    "Detailed cardiovascular history",
                    "Previous cardiac evaluations",
                    "Current BP medication details"
                ],
                "ClinicalExamination": [
                    "Detailed cardiovascular examination",
                    "Regular BP monitoring",
                    "Continuous ECG monitoring"
                ],
                "Investigations": [
                    "Immediate ECG",
                    "Cardiac enzymes (Troponin)",
                    "Complete blood count",
                    "Chest X-ray"
                ]
            }
        }),
        StageName::PatientSummary => json!({
            "Error": "Could not generate summary"
        }),
        StageName::Prescription => json!({
            "Date": Local::now().format(TIMESTAMP_FORMAT).to_string(),
            "Medications": [
                {
                    "Medicine Name": "Generic Medicine",
                    "Dosage": "1 tablet",
                    "Frequency": "Twice daily",
                    "Duration": "7 days",
                    "Special Instructions": "Take with food"
                }
            ]
        }),
    }
}

/// One medication row of a prescription. Field names mirror the wire
/// schema the prescription stage is prompted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Medication {
    #[serde(rename = "Medicine Name", default)]
    pub name: String,
    #[serde(rename = "Dosage", default)]
    pub dosage: String,
    #[serde(rename = "Frequency", default)]
    pub frequency: String,
    #[serde(rename = "Duration", default)]
    pub duration: String,
    #[serde(rename = "Special Instructions", default)]
    pub instructions: String,
}

/// A formatted prescription, owned solely by the prescription workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Medications")]
    pub medications: Vec<Medication>,
}

impl Prescription {
    /// Build a prescription from the stage-6 result value.
    ///
    /// Lenient on shape: medication rows that do not deserialize are
    /// skipped, and a missing or empty `Date` is back-filled with the
    /// current timestamp.
    pub fn from_value(value: &Value) -> Self {
        let date = match value.get("Date").and_then(Value::as_str) {
            Some(d) if !d.trim().is_empty() => d.to_string(),
            _ => Local::now().format(TIMESTAMP_FORMAT).to_string(),
        };

        let medications = match value.get("Medications").and_then(Value::as_array) {
            Some(rows) => rows
                .iter()
                .filter_map(|row| serde_json::from_value(row.clone()).ok())
                .collect(),
            None => Vec::new(),
        };

        Self { date, medications }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chief_complaints_request_uses_transcript_only() {
        let request = ExtractionRequest::chief_complaints("patient has fever");
        assert_eq!(request.stage, StageName::ChiefComplaints);
        assert_eq!(request.schema, SchemaKind::Array);
        assert!(request.system.is_none());
        assert!(request.prompt.contains("patient has fever"));
        assert!((request.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn presenting_illness_caps_tokens_and_raises_temperature() {
        let request = ExtractionRequest::presenting_illness("transcript");
        assert_eq!(request.schema, SchemaKind::Freeform);
        assert_eq!(request.max_tokens, Some(1000));
        assert!((request.temperature - 0.3).abs() < f32::EPSILON);
        assert!(request.system.as_deref().unwrap().contains("medical historian"));
    }

    #[test]
    fn all_stage_temperatures_stay_in_deterministic_band() {
        let value = json!({});
        let requests = [
            ExtractionRequest::chief_complaints(""),
            ExtractionRequest::structured_intake("", ""),
            ExtractionRequest::presenting_illness(""),
            ExtractionRequest::differential_diagnosis(&value),
            ExtractionRequest::patient_summary(&value, &value, &value, &value),
            ExtractionRequest::prescription(""),
        ];
        for request in &requests {
            assert!(
                (0.2..=0.3).contains(&request.temperature),
                "stage {} temperature {} out of band",
                request.stage,
                request.temperature
            );
        }
    }

    #[test]
    fn chief_complaints_fallback_is_fixed_placeholder_row() {
        let value = fallback_value(StageName::ChiefComplaints, "whatever");
        assert_eq!(
            value,
            json!([{"Complaint": "Unable to extract", "Duration": "N/A"}])
        );
    }

    #[test]
    fn diagnosis_fallback_is_single_well_formed_list() {
        let value = fallback_value(StageName::DifferentialDiagnosis, "timeout");
        let diagnoses = value["DifferentialDiagnosis"].as_array().unwrap();
        assert_eq!(diagnoses.len(), 4);
        for d in diagnoses {
            assert!(d.is_string());
        }
        let recs = value["Recommendations"].as_object().unwrap();
        assert_eq!(recs.len(), 3);
    }

    #[test]
    fn presenting_illness_fallback_embeds_reason() {
        let value = fallback_value(StageName::PresentingIllness, "connection refused");
        let text = value.as_str().unwrap();
        assert!(text.contains("connection refused"));
        assert!(text.contains("manually"));
    }

    #[test]
    fn prescription_fallback_has_one_generic_row() {
        let value = fallback_value(StageName::Prescription, "bad json");
        let meds = value["Medications"].as_array().unwrap();
        assert_eq!(meds.len(), 1);
        assert_eq!(meds[0]["Medicine Name"], "Generic Medicine");
        assert!(!value["Date"].as_str().unwrap().is_empty());
    }

    #[test]
    fn result_accessors_distinguish_fallback() {
        let ok = ExtractionResult::ok(json!({"a": 1}));
        assert!(!ok.is_fallback());
        assert!(ok.reason().is_none());

        let fb = ExtractionResult::fallback(json!([]), "service failure: boom");
        assert!(fb.is_fallback());
        assert_eq!(fb.reason(), Some("service failure: boom"));
        assert_eq!(fb.value(), &json!([]));
    }

    #[test]
    fn prescription_parses_medication_rows() {
        let value = json!({
            "Date": "2026-01-05 10:30:00",
            "Medications": [
                {
                    "Medicine Name": "Amoxicillin",
                    "Dosage": "500mg",
                    "Frequency": "Three times daily",
                    "Duration": "5 days",
                    "Special Instructions": "After meals"
                }
            ]
        });
        let prescription = Prescription::from_value(&value);
        assert_eq!(prescription.date, "2026-01-05 10:30:00");
        assert_eq!(prescription.medications.len(), 1);
        assert_eq!(prescription.medications[0].name, "Amoxicillin");
        assert_eq!(prescription.medications[0].instructions, "After meals");
    }

    #[test]
    fn prescription_backfills_missing_date() {
        let value = json!({"Medications": []});
        let prescription = Prescription::from_value(&value);
        // %Y-%m-%d %H:%M:%S is 19 characters
        assert_eq!(prescription.date.len(), 19);
        assert_eq!(prescription.date.as_bytes()[4], b'-');
        assert_eq!(prescription.date.as_bytes()[13], b':');
    }

    #[test]
    fn prescription_backfills_empty_date() {
        let value = json!({"Date": "  ", "Medications": []});
        let prescription = Prescription::from_value(&value);
        assert_ne!(prescription.date.trim(), "");
        assert_eq!(prescription.date.len(), 19);
    }

    #[test]
    fn prescription_skips_malformed_rows() {
        let value = json!({
            "Date": "2026-01-05 10:30:00",
            "Medications": [
                {"Medicine Name": "Valid"},
                "not an object",
                {"Medicine Name": "Also Valid", "Dosage": "10mg"}
            ]
        });
        let prescription = Prescription::from_value(&value);
        assert_eq!(prescription.medications.len(), 2);
        assert_eq!(prescription.medications[0].name, "Valid");
        assert_eq!(prescription.medications[0].dosage, "");
        assert_eq!(prescription.medications[1].dosage, "10mg");
    }
}
