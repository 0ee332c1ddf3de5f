//! Command-line entry point: runs one workflow against local files and
//! prints each stage's flattened result.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use echomed::config::{self, AppConfig};
use echomed::pipeline::{flatten, ExtractionResult, FlattenedTable};
use echomed::{AudioInput, DocumentState, Orchestrator};

#[derive(Parser)]
#[command(name = "echomed", version, about = "AI clinical documentation assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the clinical assessment workflow on a recorded consultation
    Assess {
        /// Audio file of the doctor-patient conversation
        audio: PathBuf,

        /// Prior-history PDF to fold into the intake record
        #[arg(long)]
        prior_history: Option<PathBuf>,
    },
    /// Generate a prescription, and a PDF when --doctor is given
    Prescribe {
        /// Audio file of the doctor-patient conversation
        audio: PathBuf,

        /// Prescribing doctor's name, required for PDF rendering
        #[arg(long)]
        doctor: Option<String>,

        /// Directory to write the rendered PDF into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();
    let app_config = AppConfig::from_env().context("loading configuration")?;
    let orchestrator = Orchestrator::from_config(&app_config);

    match cli.command {
        Command::Assess {
            audio,
            prior_history,
        } => {
            let audio_bytes = read_file(&audio)?;
            let prior_bytes = prior_history.as_deref().map(read_file).transpose()?;

            let outcome = orchestrator.run_assessment(
                Some(AudioInput::Uploaded(audio_bytes)),
                prior_bytes.as_deref(),
            )?;

            println!("=== Transcription ===\n{}\n", outcome.transcript);
            if !outcome.prior_history.is_empty() {
                println!("=== Past Medical Records ===\n{}\n", outcome.prior_history);
            }
            print_result("Chief Complaints", &outcome.record.chief_complaints);
            print_result("Patient Data", &outcome.record.structured_intake);
            print_result(
                "History of Presenting Illness",
                &outcome.record.presenting_illness,
            );
            print_result(
                "Differential Diagnosis & Recommendations",
                &outcome.record.differential_diagnosis,
            );
            print_result("Patient Summary", &outcome.record.summary);
        }
        Command::Prescribe {
            audio,
            doctor,
            out_dir,
        } => {
            let audio_bytes = read_file(&audio)?;
            let outcome = orchestrator
                .run_prescription(Some(AudioInput::Uploaded(audio_bytes)), doctor.as_deref())?;

            println!("=== Transcription ===\n{}\n", outcome.transcript);
            print_result("Prescription Details", &outcome.result);

            match outcome.document {
                DocumentState::Rendered { bytes, filename } => {
                    let path = out_dir.join(filename);
                    fs::write(&path, bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Prescription PDF written to {}", path.display());
                }
                DocumentState::AwaitingDoctorName => {
                    println!("Pass --doctor to render the prescription PDF");
                }
            }
        }
    }

    Ok(())
}

fn read_file(path: &std::path::Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn print_result(title: &str, result: &ExtractionResult) {
    println!("=== {title} ===");
    if let Some(reason) = result.reason() {
        println!("(fallback value shown; {reason})");
    }
    print_table(&flatten(result.value()));
    println!();
}

fn print_table(table: &FlattenedTable) {
    match table {
        FlattenedTable::Fields { fields } => {
            for (field, value) in fields {
                println!("{field}: {value}");
            }
        }
        FlattenedTable::Rows { columns, rows } => {
            println!("{}", columns.join(" | "));
            for row in rows {
                println!("{}", row.join(" | "));
            }
        }
        FlattenedTable::Values { values } => {
            for value in values {
                println!("- {value}");
            }
        }
    }
}
