use serde::{Deserialize, Serialize};

/// Page layout for generated report PDFs. Sizes in points, distances in mm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfStyles {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_mm: f32,
    pub title_size: f32,
    pub heading_size: f32,
    pub body_size: f32,
    /// Vertical advance per body line.
    pub line_height_mm: f32,
    /// Characters per wrapped body line.
    pub wrap_chars: usize,
}

impl Default for PdfStyles {
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            margin_mm: 20.0,
            title_size: 16.0,
            heading_size: 12.0,
            body_size: 10.0,
            line_height_mm: 5.0,
            wrap_chars: 90,
        }
    }
}
