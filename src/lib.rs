//! echomed — clinical conversation documentation pipeline.
//!
//! Turns a recorded doctor-patient conversation into structured medical
//! documentation: a transcript, discrete clinical facts (complaints,
//! history, differential diagnosis, summary), and a formatted
//! prescription PDF.
//!
//! The core is a chain of six model-assisted extraction stages, each with
//! its own prompt, expected output schema, and deterministic fallback
//! value. A failed or malformed stage substitutes its fallback and the
//! run continues; no single stage failure aborts the pipeline.

pub mod config;
pub mod document;
pub mod speech;
pub mod pipeline;
pub mod render;

pub use config::AppConfig;
pub use pipeline::orchestrator::{
    AssessmentOutcome, AudioInput, ClinicalRecord, DocumentState, Orchestrator,
    PrescriptionOutcome, WorkflowError,
};
pub use pipeline::stage::{ExtractionResult, Medication, Prescription};
