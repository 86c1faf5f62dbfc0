//! Eager (whole-document) conversion entry points.
//!
//! [`convert`] waits for every page, builds the document and returns its
//! bytes. Any failure (unreadable input, missing key, a page whose model
//! output stayed invalid after the retry, a writer error) aborts the whole
//! conversion; no partial document is ever returned.

use crate::config::{ConversionConfig, ExtractionMode, GROQ_API_KEY_VAR};
use crate::docx::write_docx;
use crate::document::build_plan;
use crate::error::Img2DocxError;
use crate::output::{ConversionOutput, ConversionStats, PageResult};
use crate::pipeline::input::{self, PageImage};
use crate::pipeline::vision::{GroqBackend, ProviderBackend, VisionBackend};
use crate::stream::extract_stream;
use edgequake_llm::ProviderFactory;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert image files or URLs into a single `.docx`.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `inputs`: local paths or HTTP/HTTPS URLs, in page order
/// * `config`: conversion configuration
///
/// # Errors
/// Every error is fatal: the first failing page stops the conversion.
pub async fn convert(
    inputs: &[impl AsRef<str>],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2DocxError> {
    let inputs: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
    info!("Starting conversion of {} images", inputs.len());

    // ── Step 1: Resolve and decode inputs ────────────────────────────────
    let pages = input::resolve_inputs(&inputs, config.download_timeout_secs).await?;

    convert_images(pages, config).await
}

/// Convert already-decoded page images into a `.docx`.
///
/// With zero pages the result is a document holding only the title heading;
/// no vision backend (and so no API key) is needed in that case.
pub async fn convert_images(
    pages: Vec<PageImage>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2DocxError> {
    let total_start = Instant::now();
    let total = pages.len();

    // ── Step 2: Resolve the vision backend (vision mode only) ────────────
    let backend = if config.mode == ExtractionMode::Vision && total > 0 {
        Some(resolve_backend(config)?)
    } else {
        None
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }

    // ── Step 3: Extract pages in order ───────────────────────────────────
    let extract_start = Instant::now();
    let mut stream = extract_stream(pages, config, backend);
    let mut extracted = Vec::with_capacity(total);
    while let Some(page) = stream.next().await {
        extracted.push(page?);
    }
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;

    // ── Step 4: Build and serialise the document ─────────────────────────
    let plan = build_plan(
        &config.title,
        &extracted,
        config.include_page_image,
        config.image_width_inches,
    )?;
    debug!("Document plan has {} blocks", plan.blocks.len());
    let docx = write_docx(&plan)?;

    // ── Step 5: Stats ────────────────────────────────────────────────────
    let pages: Vec<PageResult> = extracted.into_iter().map(|e| e.result).collect();
    let mut stats = ConversionStats::from_pages(&pages);
    stats.docx_bytes = docx.len();
    stats.extract_duration_ms = extract_duration_ms;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Conversion complete: {} pages, {} paragraphs, {} bytes, {}ms",
        stats.total_pages, stats.total_paragraphs, stats.docx_bytes, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total, pages.len());
    }

    Ok(ConversionOutput {
        docx,
        plan,
        pages,
        stats,
    })
}

/// Convert and write the `.docx` to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    inputs: &[impl AsRef<str>],
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2DocxError> {
    let output = convert(inputs, config).await?;
    write_atomic(output_path.as_ref(), &output.docx).await?;
    Ok(output)
}

/// Write bytes to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Img2DocxError> {
    let write_err = |source| Img2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    inputs: &[impl AsRef<str>],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Img2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Img2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(inputs, config))
}

// ── Backend resolution ───────────────────────────────────────────────────

/// Resolve the vision backend, from most-specific to least-specific:
///
/// 1. **Injected backend** (`config.backend`): used as-is.
/// 2. **Named provider** other than `groq`: built through
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    own API key variable.
/// 3. **Groq**: the default, keyed by `config.api_key` or `GROQ_API_KEY`.
pub fn resolve_backend(config: &ConversionConfig) -> Result<Arc<dyn VisionBackend>, Img2DocxError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(name) = config
        .provider_name
        .as_deref()
        .filter(|n| !n.eq_ignore_ascii_case("groq"))
    {
        let provider = ProviderFactory::create_llm_provider(name, &config.model).map_err(|e| {
            Img2DocxError::ProviderNotConfigured {
                provider: name.to_string(),
                hint: format!("{e}"),
            }
        })?;
        debug!("Using edgequake-llm provider '{}' ({})", name, config.model);
        return Ok(Arc::new(ProviderBackend::new(
            provider,
            name,
            config.api_timeout_secs,
        )));
    }

    let api_key = resolve_api_key(config.api_key.as_deref(), |k| std::env::var(k).ok())?;
    debug!("Using Groq backend at {} ({})", config.api_base_url, config.model);
    Ok(Arc::new(GroqBackend::new(
        api_key,
        config.api_base_url.clone(),
        config.api_timeout_secs,
    )?))
}

/// Explicit key first, then the environment; blank values count as missing.
fn resolve_api_key(
    explicit: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, Img2DocxError> {
    explicit
        .map(str::to_string)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| lookup(GROQ_API_KEY_VAR).filter(|k| !k.trim().is_empty()))
        .ok_or_else(|| Img2DocxError::MissingApiKey {
            var: GROQ_API_KEY_VAR.to_string(),
        })
}
