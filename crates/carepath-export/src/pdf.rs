use std::io::BufWriter;

use printpdf::{
    BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
};

use crate::error::ExportError;
use crate::styles::PdfStyles;

/// Writes lines top to bottom, starting a new page when the bottom margin is reached.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    styles: &'a PdfStyles,
    layer: PdfLayerReference,
    y: f32,
}

impl Cursor<'_> {
    fn advance(&mut self, mm: f32) {
        self.y -= mm;
        if self.y < self.styles.margin_mm {
            let (page, layer) = self.doc.add_page(
                Mm(self.styles.page_width_mm),
                Mm(self.styles.page_height_mm),
                "Layer 1",
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = self.styles.page_height_mm - self.styles.margin_mm;
        }
    }

    fn text(&mut self, text: &str, size: f32, indent_mm: f32, font: &IndirectFontRef) {
        self.layer.use_text(
            text,
            size,
            Mm(self.styles.margin_mm + indent_mm),
            Mm(self.y),
            font,
        );
    }
}

/// Lay out report text (see [`crate::render::report_text`]) as PDF bytes.
pub fn generate_pdf(
    title: &str,
    rendered: &str,
    styles: &PdfStyles,
) -> Result<Vec<u8>, ExportError> {
    let (doc, page1, layer1) = PdfDocument::new(
        title,
        Mm(styles.page_width_mm),
        Mm(styles.page_height_mm),
        "Layer 1",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(format!("font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(format!("font: {e}")))?;

    let mut cursor = Cursor {
        doc: &doc,
        styles,
        layer: doc.get_page(page1).get_layer(layer1),
        y: styles.page_height_mm - styles.margin_mm,
    };

    for line in rendered.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            cursor.advance(styles.line_height_mm / 2.0);
        } else if let Some(text) = trimmed.strip_prefix("## ") {
            cursor.advance(styles.line_height_mm);
            cursor.text(text, styles.heading_size, 0.0, &bold);
            cursor.advance(styles.line_height_mm * 1.2);
        } else if let Some(text) = trimmed.strip_prefix("# ") {
            cursor.text(text, styles.title_size, 0.0, &bold);
            cursor.advance(styles.line_height_mm * 2.0);
        } else if let Some(text) = trimmed.strip_prefix("- ") {
            let mut first = true;
            for wrapped in wrap_text(text, styles.wrap_chars.saturating_sub(4).max(1)) {
                let line = if first { format!("- {wrapped}") } else { wrapped };
                let indent = if first { 3.0 } else { 6.0 };
                cursor.text(&line, styles.body_size, indent, &font);
                cursor.advance(styles.line_height_mm);
                first = false;
            }
        } else {
            for wrapped in wrap_text(trimmed, styles.wrap_chars.max(1)) {
                cursor.text(&wrapped, styles.body_size, 0.0, &font);
                cursor.advance(styles.line_height_mm);
            }
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| ExportError::Pdf(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| ExportError::Pdf(format!("buffer: {e}")))
}

/// Greedy word wrap to at most `max_chars` per line (longer words stand alone).
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + 1;
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
