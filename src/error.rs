//! Error types for the edgequake-img2docx library.
//!
//! Two failure modes exist and they are kept apart on purpose:
//!
//! * [`Img2DocxError`]: **Fatal**: the conversion stops and no document is
//!   produced (unreadable input, missing API key, the model returned garbage
//!   twice, the OOXML writer failed). Returned as `Err(Img2DocxError)` from the
//!   top-level `convert*` functions.
//!
//! * [`OcrError`]: **Non-fatal**: the local OCR engine is missing or crashed.
//!   It never leaves [`crate::pipeline::ocr`]; the page simply degrades to
//!   "no text detected".
//!
//! There is no partial-result recovery: a document is either built from every
//! page or not at all.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2docx library.
#[derive(Debug, Error)]
pub enum Img2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file extension is not one of png, jpg, jpeg, webp.
    #[error("Unsupported image '{name}': expected one of png, jpg, jpeg, webp")]
    UnsupportedImage { name: String },

    /// The bytes could not be decoded as an image.
    #[error("Failed to decode image '{name}': {detail}")]
    ImageDecode { name: String, detail: String },

    /// Re-encoding a page (JPEG for the model, PNG for embedding) failed.
    #[error("Failed to encode page {page}: {detail}")]
    ImageEncode { page: usize, detail: String },

    // ── Model errors ──────────────────────────────────────────────────────
    /// No API key for the hosted vision model.
    #[error("Missing {var}. Set it in the environment or pass --api-key.")]
    MissingApiKey { var: String },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The model API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// The model API call timed out.
    #[error("API call timed out after {elapsed_ms}ms on page {page}")]
    ApiTimeout { page: usize, elapsed_ms: u64 },

    /// The model API rejected the credentials (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// Both attempts returned something that is not a layout document.
    #[error("Model returned invalid JSON for page {page} after {attempts} attempts: {detail}")]
    InvalidModelOutput {
        page: usize,
        attempts: u32,
        detail: String,
    },

    // ── Output errors ─────────────────────────────────────────────────────
    /// docx-rs failed to pack the document.
    #[error("Failed to build DOCX: {0}")]
    DocxWriteFailed(String),

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of the local OCR engine. Logged and swallowed by the caller.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary could not be spawned.
    #[error("OCR engine '{command}' is not installed or not on PATH")]
    EngineMissing { command: String },

    /// The engine ran but exited unsuccessfully.
    #[error("OCR engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    /// Preparing the temporary input image failed.
    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR image error: {0}")]
    Image(#[from] image::ImageError),
}
