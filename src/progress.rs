//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while pages are extracted. Pages are handled strictly in upload
//! order, so events for page N always arrive before those for page N+1.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2docx::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     paragraphs: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, paragraphs: usize) {
//!         self.paragraphs.fetch_add(paragraphs, Ordering::SeqCst);
//!         eprintln!("Page {}/{}: {} paragraphs", page_num, total_pages, paragraphs);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { paragraphs: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods default to no-ops so callers only override what they need.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first page is extracted.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before the VLM request or OCR run for a page.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page has been extracted.
    ///
    /// # Arguments
    /// * `paragraphs`: number of paragraphs the page will contribute
    fn on_page_complete(&self, page_num: usize, total_pages: usize, paragraphs: usize) {
        let _ = (page_num, total_pages, paragraphs);
    }

    /// Called when a page fails. The conversion stops right after.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the document has been written.
    fn on_conversion_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
