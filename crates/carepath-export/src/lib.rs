//! carepath-export
//!
//! Narrative section rendering (Tera) and PDF generation (printpdf) for
//! assessment reports.

pub mod error;
pub mod pdf;
pub mod render;
pub mod styles;
pub mod templates;

pub use crate::error::ExportError;
