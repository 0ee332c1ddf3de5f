//! Plain-text extraction from uploaded reference documents (prior history).
//!
//! Handles digital PDFs with embedded text layers. This module only
//! extracts text; it never validates content. A scanned image without a
//! text layer yields an empty string, which downstream stages treat as
//! "no prior history provided".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("PDF parsing error: {0}")]
    PdfParsing(String),
}

/// Extract the concatenated per-page text of a PDF.
///
/// Never fails at this boundary: any parse error is logged as a warning
/// and reported as an empty string so the pipeline continues without a
/// prior-history input.
pub fn extract_text(pdf_bytes: &[u8]) -> String {
    match try_extract_text(pdf_bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "prior-history extraction failed, continuing without it");
            String::new()
        }
    }
}

/// Fallible inner extraction, one string per page joined with newlines.
pub fn try_extract_text(pdf_bytes: &[u8]) -> Result<String, DocumentError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
        .map_err(|e| DocumentError::PdfParsing(e.to_string()))?;
    Ok(pages.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate a valid PDF with text using lopdf (the library that pdf-extract uses internally).
    fn make_test_pdf(text: &str) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_stream = Stream::new(dictionary! {}, content.into_bytes());
        let content_id = doc.add_object(content_stream);

        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });

        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });

        if let Ok(page) = doc.get_object_mut(page_id) {
            if let Object::Dictionary(ref mut dict) = page {
                dict.set("Parent", pages_id);
            }
        }

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });

        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_text_from_digital_pdf() {
        let pdf_bytes = make_test_pdf("Hypertension diagnosed in 2019");
        let text = extract_text(&pdf_bytes);
        assert!(
            text.contains("Hypertension") || text.contains("2019"),
            "expected extracted text, got: {text}"
        );
    }

    #[test]
    fn invalid_pdf_yields_empty_string() {
        assert_eq!(extract_text(b"not a pdf"), "");
    }

    #[test]
    fn try_extract_reports_parse_error() {
        let result = try_extract_text(b"not a pdf");
        assert!(matches!(result, Err(DocumentError::PdfParsing(_))));
    }
}
