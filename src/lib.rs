//! # edgequake-img2docx
//!
//! Convert page images (PNG, JPEG, WebP) into a formatted Word document.
//!
//! Two extraction modes are supported:
//!
//! * **Vision** (default): each image is sent to a hosted Vision Language
//!   Model which returns a JSON layout: paragraphs, alignment, and bold/italic
//!   runs. The layout is rendered into real Word formatting.
//! * **OCR**: each image is contrast/sharpness enhanced and read by a local
//!   Tesseract engine; the text lands under the original image, one paragraph
//!   per line. OCR failures never abort a conversion.
//!
//! ## Pipeline Overview
//!
//! ```text
//! images
//!  │
//!  ├─ 1. Input    resolve local files or URLs, decode, normalise to RGB
//!  ├─ 2. Extract  one page at a time, in upload order
//!  │     ├─ vision: JPEG data URL → VLM → JSON layout (one retry on bad JSON)
//!  │     └─ ocr:    enhance → tesseract --oem 2 --psm 11 → clean text
//!  ├─ 3. Plan     headings, page images, paragraphs, page breaks
//!  └─ 4. Output   .docx bytes (docx-rs) + optional HTML preview
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2docx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GROQ_API_KEY from the environment
//!     let config = ConversionConfig::default();
//!     let output = convert_to_file(&["scan1.png", "scan2.jpg"], "notes.docx", &config).await?;
//!     eprintln!("{} paragraphs, {} bytes",
//!         output.stats.total_paragraphs,
//!         output.stats.docx_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2docx` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod docx;
pub mod error;
pub mod layout;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ExtractionMode, OcrOptions};
pub use convert::{convert, convert_images, convert_sync, convert_to_file};
pub use document::{Block, DocumentPlan, PageContent, DOCX_MIME_TYPE};
pub use error::{Img2DocxError, OcrError};
pub use layout::{parse_layout, Alignment, LayoutDocument, LayoutParagraph, TextRun};
pub use output::{ConversionOutput, ConversionStats, PageResult};
pub use pipeline::input::PageImage;
pub use pipeline::ocr::{OcrAvailability, OcrEngine, TesseractEngine};
pub use pipeline::vision::{GroqBackend, ProviderBackend, VisionBackend, VisionRequest, VisionResponse};
pub use preview::render_html;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, extract_stream, PageStream};
