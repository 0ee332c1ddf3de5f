//! Workflow orchestrator: sequences transcription, prior-history
//! extraction, and the extraction stages per user workflow.
//!
//! Assessment runs stages 1-5 in dependency order; prescription runs
//! stage 6 and optionally renders the PDF. A stage that fell back keeps
//! feeding its placeholder to later stages, so partial failure never
//! aborts a run. The only fatal condition is a missing audio input,
//! checked before any stage runs.

use thiserror::Error;
use tracing::{info, info_span};
use uuid::Uuid;

use super::llm::ChatClient;
use super::runner::run_stage;
use super::stage::{ExtractionRequest, ExtractionResult, Prescription};
use crate::document;
use crate::render::{self, RenderError};
use crate::speech::TranscriptionAdapter;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("No uploaded or recorded audio input was provided")]
    NoAudioInput,

    #[error("Prescription rendering failed: {0}")]
    Render(#[from] RenderError),
}

/// Audio handed to a workflow, either an uploaded file or a live
/// recording. Absence of both is the one fatal input condition.
#[derive(Debug, Clone)]
pub enum AudioInput {
    Uploaded(Vec<u8>),
    Recorded(Vec<u8>),
}

impl AudioInput {
    pub fn bytes(&self) -> &[u8] {
        match self {
            AudioInput::Uploaded(bytes) => bytes,
            AudioInput::Recorded(bytes) => bytes,
        }
    }
}

/// Aggregate of all assessment-stage results for one run. Each field is
/// independently fallback-capable; a partial record is a valid,
/// displayable end state.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalRecord {
    pub chief_complaints: ExtractionResult,
    pub structured_intake: ExtractionResult,
    pub presenting_illness: ExtractionResult,
    pub differential_diagnosis: ExtractionResult,
    pub summary: ExtractionResult,
}

/// Everything the assessment workflow hands to the display layer.
#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub transcript: String,
    pub prior_history: String,
    pub record: ClinicalRecord,
}

/// Rendering state of the prescription document.
#[derive(Debug, Clone)]
pub enum DocumentState {
    /// PDF bytes ready for direct transfer, with a suggested download name.
    Rendered { bytes: Vec<u8>, filename: String },
    /// Rendering withheld: the doctor's name is required first. This is
    /// a blocked state, not a failure.
    AwaitingDoctorName,
}

/// Everything the prescription workflow hands to the delivery layer.
#[derive(Debug, Clone)]
pub struct PrescriptionOutcome {
    pub transcript: String,
    pub result: ExtractionResult,
    pub prescription: Prescription,
    pub document: DocumentState,
}

/// Owns the service adapters and sequences the two workflows. Stateless
/// across runs; each invocation is independent.
pub struct Orchestrator {
    chat: Box<dyn ChatClient>,
    transcriber: TranscriptionAdapter,
}

impl Orchestrator {
    pub fn new(chat: Box<dyn ChatClient>, transcriber: TranscriptionAdapter) -> Self {
        Self { chat, transcriber }
    }

    /// Production orchestrator wired to the configured remote services.
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(
            Box::new(super::llm::OpenAiChatClient::new(config)),
            TranscriptionAdapter::new(Box::new(crate::speech::OpenAiSpeechClient::new(config))),
        )
    }

    /// Assessment workflow: transcribe, extract optional prior history,
    /// then run stages 1-5 in dependency order.
    pub fn run_assessment(
        &self,
        audio: Option<AudioInput>,
        prior_history_pdf: Option<&[u8]>,
    ) -> Result<AssessmentOutcome, WorkflowError> {
        let audio = audio.ok_or(WorkflowError::NoAudioInput)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("assessment", run_id = %run_id);
        let _guard = span.enter();

        let transcript = self.transcriber.transcribe(audio.bytes());
        let prior_history = prior_history_pdf
            .map(document::extract_text)
            .unwrap_or_default();

        let chief_complaints = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::chief_complaints(&transcript),
        );
        let structured_intake = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::structured_intake(&transcript, &prior_history),
        );
        let presenting_illness = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::presenting_illness(&transcript),
        );
        let differential_diagnosis = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::differential_diagnosis(structured_intake.value()),
        );
        let summary = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::patient_summary(
                structured_intake.value(),
                chief_complaints.value(),
                differential_diagnosis.value(),
                presenting_illness.value(),
            ),
        );

        let record = ClinicalRecord {
            chief_complaints,
            structured_intake,
            presenting_illness,
            differential_diagnosis,
            summary,
        };
        info!(
            fallbacks = record.fallback_count(),
            "assessment run complete"
        );

        Ok(AssessmentOutcome {
            transcript,
            prior_history,
            record,
        })
    }

    /// Prescription workflow: transcribe, run stage 6, and render the
    /// PDF when the doctor's name is available.
    pub fn run_prescription(
        &self,
        audio: Option<AudioInput>,
        doctor_name: Option<&str>,
    ) -> Result<PrescriptionOutcome, WorkflowError> {
        let audio = audio.ok_or(WorkflowError::NoAudioInput)?;
        let run_id = Uuid::new_v4();
        let span = info_span!("prescription", run_id = %run_id);
        let _guard = span.enter();

        let transcript = self.transcriber.transcribe(audio.bytes());
        let result = run_stage(
            self.chat.as_ref(),
            &ExtractionRequest::prescription(&transcript),
        );
        let prescription = Prescription::from_value(result.value());

        let document = match doctor_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => {
                let bytes = render::render_prescription(&prescription, name)?;
                DocumentState::Rendered {
                    bytes,
                    filename: render::suggested_filename(),
                }
            }
            None => {
                info!("doctor name not provided, withholding document rendering");
                DocumentState::AwaitingDoctorName
            }
        };

        info!(
            medications = prescription.medications.len(),
            fallback = result.is_fallback(),
            "prescription run complete"
        );

        Ok(PrescriptionOutcome {
            transcript,
            result,
            prescription,
            document,
        })
    }
}

impl ClinicalRecord {
    /// Number of stages that substituted their fallback value.
    pub fn fallback_count(&self) -> usize {
        [
            &self.chief_complaints,
            &self.structured_intake,
            &self.presenting_illness,
            &self.differential_diagnosis,
            &self.summary,
        ]
        .iter()
        .filter(|r| r.is_fallback())
        .count()
    }
}
