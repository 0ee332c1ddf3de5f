//! Prescription PDF renderer via `printpdf`.
//!
//! Deterministic layout: letter pages, a title block, date/doctor
//! metadata, one bordered medication grid (grey header row, white body
//! rows), and a trailing signature block. The whole document is built in
//! memory and handed back as bytes; nothing touches the disk.

use std::io::BufWriter;

use chrono::Local;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Polygon,
    Rgb,
};

use super::RenderError;
use crate::pipeline::stage::Prescription;

/// Medication table header, in fixed order.
pub const HEADERS: [&str; 5] = [
    "Medicine Name",
    "Dosage",
    "Frequency",
    "Duration",
    "Special Instructions",
];

const PAGE_WIDTH: Mm = Mm(215.9);
const PAGE_HEIGHT: Mm = Mm(279.4);
const MARGIN: Mm = Mm(15.0);
const BOTTOM_MARGIN: Mm = Mm(25.0);

/// Column widths in the original 2 : 1.5 : 1.5 : 1.5 : 2 inch ratio,
/// scaled to fit inside the page margins.
const COLUMN_WIDTHS: [f32; 5] = [43.8, 32.8, 32.8, 32.8, 43.8];

const HEADER_FONT_SIZE: f32 = 12.0;
const BODY_FONT_SIZE: f32 = 10.0;
const BODY_LINE_HEIGHT: f32 = 4.5;
const CELL_PADDING: f32 = 2.0;

/// Suggested download name: `prescription_<timestamp>.pdf`.
pub fn suggested_filename() -> String {
    format!("prescription_{}.pdf", Local::now().format("%Y%m%d_%H%M%S"))
}

/// The table as text: header row followed by one row per medication.
/// Pure view of the data, used by the renderer and directly testable.
pub fn table_rows(prescription: &Prescription) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = vec![HEADERS.iter().map(|h| h.to_string()).collect()];
    for med in &prescription.medications {
        rows.push(vec![
            med.name.clone(),
            med.dosage.clone(),
            med.frequency.clone(),
            med.duration.clone(),
            med.instructions.clone(),
        ]);
    }
    rows
}

/// Render the prescription as a complete in-memory PDF.
pub fn render_prescription(
    prescription: &Prescription,
    doctor_name: &str,
) -> Result<Vec<u8>, RenderError> {
    let (doc, page1, layer1) =
        PdfDocument::new("Medical Prescription", PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Font(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Font(e.to_string()))?;

    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut y = PAGE_HEIGHT - Mm(25.0);

    // Title block
    layer.use_text("MEDICAL PRESCRIPTION", 16.0, Mm(70.0), y, &bold);
    y -= Mm(14.0);

    // Date and doctor metadata
    layer.use_text(format!("Date: {}", prescription.date), 12.0, MARGIN, y, &font);
    y -= Mm(7.0);
    layer.use_text(format!("Doctor: {doctor_name}"), 12.0, MARGIN, y, &font);
    y -= Mm(12.0);

    // Medication grid
    let rows = table_rows(prescription);
    y = draw_header_row(&layer, y, &rows[0], &bold);
    for row in &rows[1..] {
        let height = body_row_height(row);
        if y.0 - height < BOTTOM_MARGIN.0 {
            let (page, page_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT - Mm(25.0);
            y = draw_header_row(&layer, y, &rows[0], &bold);
        }
        y = draw_body_row(&layer, y, row, &font);
    }

    // Signature block
    y -= Mm(15.0);
    if y.0 < BOTTOM_MARGIN.0 {
        let (page, page_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        layer = doc.get_page(page).get_layer(page_layer);
        y = PAGE_HEIGHT - Mm(25.0);
    }
    layer.set_fill_color(black());
    layer.use_text("Doctor's Signature: _________________", 12.0, MARGIN, y, &font);
    y -= Mm(7.0);
    layer.use_text(format!("Dr. {doctor_name}"), 12.0, MARGIN, y, &font);

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| RenderError::Save(e.to_string()))?;
    buf.into_inner()
        .map_err(|e| RenderError::Buffer(e.to_string()))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn header_background() -> Color {
    Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None))
}

fn header_text_color() -> Color {
    Color::Rgb(Rgb::new(0.96, 0.96, 0.96, None))
}

/// Left edge of each column.
fn column_offsets() -> [f32; 5] {
    let mut offsets = [0.0; 5];
    let mut x = MARGIN.0;
    for (i, width) in COLUMN_WIDTHS.iter().enumerate() {
        offsets[i] = x;
        x += width;
    }
    offsets
}

fn table_width() -> f32 {
    COLUMN_WIDTHS.iter().sum()
}

/// Wrap cell text to the column's character budget.
fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.len() + word.len() + 1 > max_chars && !current.is_empty() {
            lines.push(current.clone());
            current.clear();
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Approximate character budget for a column at body size.
fn column_char_budget(column: usize) -> usize {
    (COLUMN_WIDTHS[column] / 1.9) as usize
}

fn body_row_height(row: &[String]) -> f32 {
    let max_lines = row
        .iter()
        .enumerate()
        .map(|(i, cell)| wrap_text(cell, column_char_budget(i)).len())
        .max()
        .unwrap_or(1);
    max_lines as f32 * BODY_LINE_HEIGHT + 2.0 * CELL_PADDING
}

/// Stroke one row's cell borders.
fn draw_row_grid(layer: &PdfLayerReference, top: Mm, height: f32) {
    layer.set_outline_color(black());
    layer.set_outline_thickness(1.0);

    let offsets = column_offsets();
    let bottom = top.0 - height;
    for (i, offset) in offsets.iter().enumerate() {
        let right = offset + COLUMN_WIDTHS[i];
        let cell = Line {
            points: vec![
                (Point::new(Mm(*offset), top), false),
                (Point::new(Mm(right), top), false),
                (Point::new(Mm(right), Mm(bottom)), false),
                (Point::new(Mm(*offset), Mm(bottom)), false),
            ],
            is_closed: true,
        };
        layer.add_line(cell);
    }
}

/// Grey, bordered header row with centered white bold text.
/// Returns the y position below the row.
fn draw_header_row(
    layer: &PdfLayerReference,
    top: Mm,
    header: &[String],
    bold: &IndirectFontRef,
) -> Mm {
    let height = BODY_LINE_HEIGHT + 2.0 * CELL_PADDING + 1.5;

    layer.set_fill_color(header_background());
    layer.add_polygon(Polygon {
        rings: vec![vec![
            (Point::new(MARGIN, top), false),
            (Point::new(Mm(MARGIN.0 + table_width()), top), false),
            (
                Point::new(Mm(MARGIN.0 + table_width()), Mm(top.0 - height)),
                false,
            ),
            (Point::new(MARGIN, Mm(top.0 - height)), false),
        ]],
        mode: PaintMode::Fill,
        winding_order: WindingOrder::NonZero,
    });
    draw_row_grid(layer, top, height);

    layer.set_fill_color(header_text_color());
    let offsets = column_offsets();
    let text_y = Mm(top.0 - CELL_PADDING - BODY_LINE_HEIGHT);
    for (i, cell) in header.iter().enumerate() {
        // Approximate centering from character count.
        let text_width = cell.len() as f32 * HEADER_FONT_SIZE * 0.18;
        let x = (offsets[i] + (COLUMN_WIDTHS[i] - text_width) / 2.0).max(offsets[i] + 1.0);
        layer.use_text(cell, HEADER_FONT_SIZE, Mm(x), text_y, bold);
    }
    layer.set_fill_color(black());

    Mm(top.0 - height)
}

/// Bordered body row with left-aligned wrapped text.
/// Returns the y position below the row.
fn draw_body_row(
    layer: &PdfLayerReference,
    top: Mm,
    row: &[String],
    font: &IndirectFontRef,
) -> Mm {
    let height = body_row_height(row);
    draw_row_grid(layer, top, height);

    layer.set_fill_color(black());
    let offsets = column_offsets();
    for (i, cell) in row.iter().enumerate() {
        let mut line_y = top.0 - CELL_PADDING - BODY_LINE_HEIGHT;
        for line in wrap_text(cell, column_char_budget(i)) {
            layer.use_text(&line, BODY_FONT_SIZE, Mm(offsets[i] + 1.5), Mm(line_y), font);
            line_y -= BODY_LINE_HEIGHT;
        }
    }

    Mm(top.0 - height)
}
