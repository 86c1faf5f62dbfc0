//! Pipeline stages for image-to-DOCX conversion.
//!
//! Each submodule implements one transformation step and is testable on its
//! own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ vision ──▶ (layout)
//!   │                                 │
//!   └────────▶ ocr ──────▶ (text) ────┴──▶ document builder
//! ```
//!
//! 1. [`input`]: canonicalise paths and URLs to decoded RGB images
//! 2. [`encode`]: JPEG data URL for the model, PNG for embedding
//! 3. [`vision`]: the VLM call with its single reparse retry; the only
//!    stage with network I/O
//! 4. [`ocr`]: enhance + Tesseract; runs in `spawn_blocking`, never fails

pub mod encode;
pub mod input;
pub mod ocr;
pub mod vision;
