//! Conversion results: the document bytes plus per-page and total stats.

use crate::config::ExtractionMode;
use crate::document::DocumentPlan;
use serde::Serialize;

/// Bookkeeping for one converted page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    /// 1-indexed page number (upload order).
    pub page_num: usize,
    /// File name or URL of the source image.
    pub source: String,
    pub mode: ExtractionMode,
    /// Paragraphs this page contributes to the document.
    pub paragraphs: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Model calls made (0 for OCR pages, 2 when the reparse retry fired).
    pub attempts: u32,
    pub duration_ms: u64,
}

impl PageResult {
    pub fn new(page_num: usize, source: impl Into<String>, mode: ExtractionMode) -> Self {
        Self {
            page_num,
            source: source.into(),
            mode,
            paragraphs: 0,
            input_tokens: 0,
            output_tokens: 0,
            attempts: 0,
            duration_ms: 0,
        }
    }
}

/// Aggregate statistics for a conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_paragraphs: usize,
    /// Pages whose first model response had to be re-requested.
    pub retried_pages: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Size of the generated `.docx`.
    pub docx_bytes: usize,
    pub total_duration_ms: u64,
    pub extract_duration_ms: u64,
}

impl ConversionStats {
    pub fn from_pages(pages: &[PageResult]) -> Self {
        Self {
            total_pages: pages.len(),
            total_paragraphs: pages.iter().map(|p| p.paragraphs).sum(),
            retried_pages: pages.iter().filter(|p| p.attempts > 1).count(),
            total_input_tokens: pages.iter().map(|p| p.input_tokens as u64).sum(),
            total_output_tokens: pages.iter().map(|p| p.output_tokens as u64).sum(),
            ..Default::default()
        }
    }
}

/// Everything a conversion produces.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The finished Office Open XML document.
    #[serde(skip)]
    pub docx: Vec<u8>,
    /// The block list the document was written from.
    #[serde(skip)]
    pub plan: DocumentPlan,
    pub pages: Vec<PageResult>,
    pub stats: ConversionStats,
}
