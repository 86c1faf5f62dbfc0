//! Local OCR: enhance the page, run Tesseract, clean the text.
//!
//! OCR is best-effort. A missing engine or a crashing one is logged and the
//! page degrades to an empty string, which the document builder renders as
//! "No text detected.". Nothing in this module returns a fatal error.
//!
//! Tesseract runs as an external process (`tesseract <png> stdout --oem 2
//! --psm 11`): engine mode 2 combines the legacy and LSTM recognisers, page
//! segmentation mode 11 looks for sparse text in no particular order, which
//! suits handwritten notes.

use crate::config::OcrOptions;
use crate::error::OcrError;
use crate::pipeline::input::PageImage;
use image::{imageops, ImageBuffer, ImageFormat, Rgb, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;
use tracing::{debug, warn};

/// An OCR engine that turns an RGB image into raw text.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, image: &RgbImage) -> Result<String, OcrError>;
}

// ── Tesseract ────────────────────────────────────────────────────────────

/// Tesseract CLI wrapper.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    command: String,
    language: String,
}

impl TesseractEngine {
    /// `--oem 2`: legacy + LSTM engines.
    pub const ENGINE_MODE: u8 = 2;
    /// `--psm 11`: sparse text.
    pub const PAGE_SEG_MODE: u8 = 11;

    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    pub fn from_options(options: &OcrOptions) -> Self {
        Self::new(options.command.clone(), options.language.clone())
    }

    /// Command-line arguments for one recognition run.
    pub fn args(&self, input: &Path) -> Vec<String> {
        vec![
            input.to_string_lossy().into_owned(),
            "stdout".to_string(),
            "--oem".to_string(),
            Self::ENGINE_MODE.to_string(),
            "--psm".to_string(),
            Self::PAGE_SEG_MODE.to_string(),
            "-l".to_string(),
            self.language.clone(),
        ]
    }

    /// True when `<command> --version` runs successfully.
    pub fn is_installed(command: &str) -> bool {
        Command::new(command)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &RgbImage) -> Result<String, OcrError> {
        let tmp = tempfile::Builder::new()
            .prefix("img2docx-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(tmp.path(), ImageFormat::Png)?;

        let output = Command::new(&self.command)
            .args(self.args(tmp.path()))
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::EngineMissing {
                    command: self.command.clone(),
                },
                _ => OcrError::Io(e),
            })?;

        if !output.status.success() {
            return Err(OcrError::EngineFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ── Availability ─────────────────────────────────────────────────────────

/// Environment variables whose presence marks a hosted deployment.
pub const CLOUD_ENV_MARKERS: [&str; 6] = [
    "IMG2DOCX_CLOUD",
    "STREAMLIT_SHARING_MODE",
    "STREAMLIT_CLOUD",
    "SPACE_ID",
    "DYNO",
    "K_SERVICE",
];

/// Home directory of the hosted Streamlit runtime user.
const CLOUD_HOME: &str = "/home/appuser";

/// Whether local OCR can be expected to work here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OcrAvailability {
    pub cloud: bool,
    pub engine_installed: bool,
}

impl OcrAvailability {
    /// Inspect the process environment and check the engine binary.
    pub fn detect(command: &str) -> Self {
        let availability = Self {
            cloud: is_cloud_environment(|k| std::env::var(k).ok()),
            engine_installed: TesseractEngine::is_installed(command),
        };
        debug!("OCR availability: {:?}", availability);
        availability
    }

    /// Default for the OCR switch. Off only on a hosted deployment without
    /// an engine; OCR can still be forced on.
    pub fn default_enabled(&self) -> bool {
        !self.cloud || self.engine_installed
    }
}

/// Cloud detection over an injectable variable lookup.
pub fn is_cloud_environment(lookup: impl Fn(&str) -> Option<String>) -> bool {
    CLOUD_ENV_MARKERS
        .iter()
        .any(|k| lookup(k).is_some_and(|v| !v.is_empty()))
        || lookup("HOME").as_deref() == Some(CLOUD_HOME)
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// Boost contrast then sharpness by the given multipliers (1.0 = unchanged).
pub fn enhance(img: &RgbImage, contrast: f32, sharpness: f32) -> RgbImage {
    let contrasted = adjust_contrast(img, contrast);
    adjust_sharpness(&contrasted, sharpness)
}

fn blend(base: f32, value: f32, factor: f32) -> u8 {
    (base + factor * (value - base)).round().clamp(0.0, 255.0) as u8
}

fn luma(p: &Rgb<u8>) -> f64 {
    (p[0] as f64 * 299.0 + p[1] as f64 * 587.0 + p[2] as f64 * 114.0) / 1000.0
}

/// Scale distance from the mean grey level.
fn adjust_contrast(img: &RgbImage, factor: f32) -> RgbImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let total: f64 = img.pixels().map(luma).sum();
    let mean = (total / (w as f64 * h as f64) + 0.5).floor() as f32;

    ImageBuffer::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y);
        Rgb(p.0.map(|c| blend(mean, c as f32, factor)))
    })
}

/// Scale distance from a 3×3 smoothed copy; border pixels are left as-is.
fn adjust_sharpness(img: &RgbImage, factor: f32) -> RgbImage {
    const SMOOTH: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return img.clone();
    }
    let smooth: RgbImage = imageops::filter3x3(img, &SMOOTH);

    ImageBuffer::from_fn(w, h, |x, y| {
        let p = img.get_pixel(x, y);
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
            return *p;
        }
        let s = smooth.get_pixel(x, y);
        Rgb([0, 1, 2].map(|c| blend(s[c] as f32, p[c] as f32, factor)))
    })
}

// ── Text cleanup ─────────────────────────────────────────────────────────

static RE_HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{0B}\u{A0}]+").unwrap());
static RE_BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalise raw engine output. Idempotent.
///
/// Drops form feeds, collapses horizontal whitespace inside each line, trims
/// lines, squeezes runs of blank lines to one and trims the whole text.
pub fn clean_ocr_text(raw: &str) -> String {
    let text = raw
        .replace('\x0c', "")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let lines: Vec<String> = text
        .lines()
        .map(|line| RE_HSPACE.replace_all(line, " ").trim().to_string())
        .collect();
    RE_BLANK_RUNS
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

// ── Extraction ───────────────────────────────────────────────────────────

/// Build the engine configured in `options`.
pub fn engine_from_options(options: &OcrOptions) -> Arc<dyn OcrEngine> {
    match options.engine {
        Some(ref engine) => Arc::clone(engine),
        None => Arc::new(TesseractEngine::from_options(options)),
    }
}

/// Recognise one page. Never fails: errors are logged and yield `""`.
///
/// Enhancement and recognition are CPU-bound and block on a child process,
/// so they run on the blocking thread pool.
pub async fn extract_text(
    engine: Arc<dyn OcrEngine>,
    page: &PageImage,
    options: &OcrOptions,
) -> String {
    let image = page.image.clone();
    let (contrast, sharpness) = (options.contrast, options.sharpness);
    let page_num = page.page_num;

    let result = tokio::task::spawn_blocking(move || {
        let enhanced = enhance(&image, contrast, sharpness);
        engine.recognize(&enhanced)
    })
    .await;

    match result {
        Ok(Ok(raw)) => {
            let text = clean_ocr_text(&raw);
            debug!("Page {}: OCR produced {} chars", page_num, text.len());
            text
        }
        Ok(Err(e)) => {
            warn!("Page {}: OCR failed — {}", page_num, e);
            String::new()
        }
        Err(e) => {
            warn!("Page {}: OCR task panicked — {}", page_num, e);
            String::new()
        }
    }
}
