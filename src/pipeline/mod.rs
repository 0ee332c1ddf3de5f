//! The multi-stage extraction pipeline.
//!
//! Six independent stages transform the transcript (plus optional
//! prior-history text) into structured clinical records. Each stage is a
//! single model call with a defined prompt, output schema, and
//! deterministic fallback; the orchestrator sequences them and a failed
//! stage never aborts the run.

pub mod llm;
pub mod prompts;
pub mod stage;
pub mod runner;
pub mod flatten;
pub mod orchestrator;

pub use flatten::{flatten, FlattenedTable};
pub use llm::{ChatClient, ChatError, ChatMessage, ChatRequest, Role};
pub use runner::run_stage;
pub use stage::{
    ExtractionRequest, ExtractionResult, Medication, Prescription, SchemaKind, StageName,
};
