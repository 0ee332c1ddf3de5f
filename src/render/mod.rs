//! Document rendering for download delivery.

pub mod prescription;

pub use prescription::{render_prescription, suggested_filename, table_rows};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("PDF font error: {0}")]
    Font(String),

    #[error("PDF save error: {0}")]
    Save(String),

    #[error("PDF buffer error: {0}")]
    Buffer(String),
}
