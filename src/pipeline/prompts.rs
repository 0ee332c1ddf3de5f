//! Prompt templates for the six extraction stages.
//!
//! Each builder binds the stage's named text inputs into a template and
//! returns the finished prompt string. Upstream structured results are
//! serialized as pretty-printed JSON before binding.

use serde_json::Value;

/// System persona for the presenting-illness narrative stage.
pub const MEDICAL_HISTORIAN_SYSTEM_PROMPT: &str =
    "You are a professional medical historian extracting patient history in clear, precise English.";

/// System persona for the differential-diagnosis stage.
pub const DIAGNOSIS_SYSTEM_PROMPT: &str =
    "You are a professional medical assistant providing differential diagnosis based on patient data.";

/// System persona for the prescription stage.
pub const PRESCRIPTION_SYSTEM_PROMPT: &str =
    "You are a professional medical assistant generating a prescription based on patient conversation.";

/// Serialize an upstream stage result for inclusion in a prompt.
pub fn bind_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn build_chief_complaints_prompt(transcript: &str) -> String {
    format!(
        "From the following conversation, extract and list the patient's chief complaints \
and also the duration:\n\n{transcript}\n\n\
Return as a JSON list of objects, each with \"Complaint\" and \"Duration\" fields."
    )
}

/// Fixed-shape IPD (Initial Assessment Form) skeleton. Every field the
/// model cannot source from the conversation must stay an empty string,
/// so absence is represented rather than omitted.
pub fn build_structured_intake_prompt(transcript: &str, prior_history: &str) -> String {
    format!(
        r#"Extract structured patient information from the following conversation and past history, and format it strictly as JSON according to the Hospital Initial Assessment Form (IPD):

Current Conversation:
{transcript}

Past History:
{prior_history}

Format:
{{
    "Patient Information": {{
        "Patient's Name": "",
        "IP No": "",
        "Age": "",
        "Date/Time of Admission": "",
        "Ward/ICU/EM": "",
        "Medico-Legal Case": "",
        "Marital Status": "",
        "Socio-Economic Class": ""
    }},
    "Allergies": {{
        "Has Allergies": "",
        "Details": "",
        "Reaction": ""
    }},
    "Chief Complaints": "",
    "Investigation Reports": "",
    "Past History": {{
        "Hypertension": "",
        "Diabetes": "",
        "Heart Disease": "",
        "Tuberculosis": "",
        "Past Surgeries": "",
        "Hospitalizations": ""
    }},
    "Investigation Findings": {{
        "BP/Sugar": "",
        "HbA1C": "",
        "HIV/HBsAg/HCV": "",
        "Imaging Findings": "",
        "Other Tests": ""
    }},
    "Advice": {{
        "NBM Consent": "",
        "Surgical Risk": "",
        "ASA Risk Grade": "",
        "Plan of Anesthesia": "",
        "Morning Investigations": ""
    }},
    "Family History": {{
        "Hypertension": "",
        "Diabetes": "",
        "Heart Disease": "",
        "Tuberculosis": "",
        "Other Chronic Illnesses": ""
    }},
    "Personal History": {{
        "Diet": "",
        "Appetite": "",
        "Sleep": "",
        "Smoking": "",
        "Alcohol": "",
        "Drugs": "",
        "Tobacco": ""
    }},
    "Physical Examination": {{
        "Vital Signs": {{
            "Temperature": "",
            "Pulse": "",
            "BP": "",
            "SPO2": "",
            "Respiratory Rate": ""
        }},
        "General Examination": {{
            "Anemia": "",
            "Clubbing": "",
            "Cyanosis": "",
            "Jaundice": "",
            "Lymphadenopathy": "",
            "Pedal Edema": ""
        }},
        "Systematic Examination": {{
            "Respiratory": "",
            "Cardiovascular": "",
            "Musculoskeletal": "",
            "Abdomen": "",
            "Neurological": ""
        }}
    }}
}}

Use empty strings for fields not mentioned in the conversation or past history. Return only the JSON object."#
    )
}

pub fn build_presenting_illness_prompt(transcript: &str) -> String {
    format!(
        "Analyze the following medical conversation and extract a comprehensive history \
of presenting illness in clear, professional English:\n\n\
Conversation:\n{transcript}\n\n\
Provide a well-structured, coherent summary focusing on:\n\
- Primary symptoms\n\
- Onset and duration of symptoms\n\
- Specific characteristics of the illness\n\
- Impact on the patient's daily life\n\
- Any previous treatments or interventions\n\n\
Ensure the response is concise yet thorough, resembling a professional medical report."
    )
}

pub fn build_differential_diagnosis_prompt(intake: &Value) -> String {
    format!(
        r#"Based on the following patient data, generate a list of possible differential diagnoses.
Also, provide recommendations for:
- More relevant history to confirm the diagnosis.
- Clinical examination findings that could help.
- Laboratory and radiology investigations needed.

Patient Data:
{patient_data}

Provide a well-structured, professional medical report in the following JSON format:
{{
    "DifferentialDiagnosis": [],
    "Recommendations": {{
        "AdditionalHistory": [],
        "ClinicalExamination": [],
        "Investigations": []
    }}
}}"#,
        patient_data = bind_json(intake)
    )
}

pub fn build_patient_summary_prompt(
    intake: &Value,
    chief_complaints: &Value,
    differential_diagnosis: &Value,
    presenting_illness: &Value,
) -> String {
    format!(
        r#"Create a concise medical summary based on the following patient information:

Patient Data: {intake}
Chief Complaints: {complaints}
Differential Diagnosis: {diagnosis}
Presenting Illness: {illness}

Return a structured JSON summary:
{{
    "Summary": "",
    "KeyFindings": [],
    "NextSteps": []
}}"#,
        intake = bind_json(intake),
        complaints = bind_json(chief_complaints),
        diagnosis = bind_json(differential_diagnosis),
        illness = bind_json(presenting_illness),
    )
}

pub fn build_prescription_prompt(transcript: &str) -> String {
    format!(
        r#"Based on the following medical conversation, generate a detailed prescription:

Conversation:
{transcript}

Please provide a prescription in the following JSON format:
{{
    "Date": "",
    "Medications": [
        {{
            "Medicine Name": "",
            "Dosage": "",
            "Frequency": "",
            "Duration": "",
            "Special Instructions": ""
        }}
    ]
}}"#
    )
}
