//! Configuration types for image-to-DOCX conversion.
//!
//! Every knob lives in [`ConversionConfig`], built via
//! [`ConversionConfigBuilder`]. Setters clamp out-of-range values; `build()`
//! rejects combinations that cannot work.

use crate::error::Img2DocxError;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::vision::VisionBackend;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Groq vision model.
pub const DEFAULT_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";

/// Models offered by the CLI. Any other id is passed through unchanged.
pub const SUGGESTED_MODELS: [&str; 2] = [
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "meta-llama/llama-4-maverick-17b-128e-instruct",
];

/// Default Groq OpenAI-compatible endpoint.
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

/// Default heading at the top of every generated document.
pub const DEFAULT_TITLE: &str = "Image to Formatted DOCX";

/// How text is pulled out of each page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Hosted vision model returning a formatted layout document. (default)
    #[default]
    Vision,
    /// Local Tesseract OCR, one plain paragraph per recognised line.
    Ocr,
}

/// Settings for the local OCR path.
#[derive(Clone)]
pub struct OcrOptions {
    /// Run the engine at all. When false, OCR-mode pages carry only the image.
    pub enabled: bool,

    /// Contrast multiplier applied before recognition. Default: 2.0.
    pub contrast: f32,

    /// Sharpness multiplier applied before recognition. Default: 2.0.
    pub sharpness: f32,

    /// Tesseract language code. Default: "eng".
    pub language: String,

    /// Tesseract executable. Default: "tesseract".
    pub command: String,

    /// Pre-constructed engine. Takes precedence over `command`.
    pub engine: Option<Arc<dyn OcrEngine>>,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            contrast: 2.0,
            sharpness: 2.0,
            language: "eng".to_string(),
            command: "tesseract".to_string(),
            engine: None,
        }
    }
}

impl fmt::Debug for OcrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrOptions")
            .field("enabled", &self.enabled)
            .field("contrast", &self.contrast)
            .field("sharpness", &self.sharpness)
            .field("language", &self.language)
            .field("command", &self.command)
            .field("engine", &self.engine.as_ref().map(|_| "<dyn OcrEngine>"))
            .finish()
    }
}

/// Configuration for an image-to-DOCX conversion.
///
/// # Example
/// ```rust
/// use edgequake_img2docx::{ConversionConfig, ExtractionMode};
///
/// let config = ConversionConfig::builder()
///     .mode(ExtractionMode::Vision)
///     .model("meta-llama/llama-4-maverick-17b-128e-instruct")
///     .include_page_image(false)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Extraction mode. Default: [`ExtractionMode::Vision`].
    pub mode: ExtractionMode,

    /// Vision model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Provider name. `None` or `"groq"` selects the built-in Groq backend;
    /// any other name goes through `edgequake_llm::ProviderFactory`.
    pub provider_name: Option<String>,

    /// Pre-constructed vision backend. Takes precedence over `provider_name`.
    pub backend: Option<Arc<dyn VisionBackend>>,

    /// Groq API key. If None, read from `GROQ_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint. Default: Groq.
    pub api_base_url: String,

    /// Sampling temperature for the first attempt. Default: 0.2.
    pub temperature: f32,

    /// Sampling temperature for the single retry after a malformed response. Default: 0.0.
    pub retry_temperature: f32,

    /// Maximum completion tokens per page. Default: 2048.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Embed the original page image above its text. Default: true.
    pub include_page_image: bool,

    /// Display width of embedded page images in inches. Default: 6.2.
    pub image_width_inches: f32,

    /// Top-level heading of the document.
    pub title: String,

    /// OCR settings (OCR mode only).
    pub ocr: OcrOptions,

    /// Per-call timeout for the vision API in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            model: DEFAULT_MODEL.to_string(),
            provider_name: None,
            backend: None,
            api_key: None,
            api_base_url: DEFAULT_GROQ_BASE_URL.to_string(),
            temperature: 0.2,
            retry_temperature: 0.0,
            max_tokens: 2048,
            system_prompt: None,
            include_page_image: true,
            image_width_inches: 6.2,
            title: DEFAULT_TITLE.to_string(),
            ocr: OcrOptions::default(),
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn VisionBackend>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("temperature", &self.temperature)
            .field("retry_temperature", &self.retry_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("include_page_image", &self.include_page_image)
            .field("image_width_inches", &self.image_width_inches)
            .field("title", &self.title)
            .field("ocr", &self.ocr)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn backend(mut self, backend: Arc<dyn VisionBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn retry_temperature(mut self, t: f32) -> Self {
        self.config.retry_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn include_page_image(mut self, v: bool) -> Self {
        self.config.include_page_image = v;
        self
    }

    pub fn image_width_inches(mut self, inches: f32) -> Self {
        self.config.image_width_inches = inches.clamp(0.5, 20.0);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr.enabled = v;
        self
    }

    pub fn ocr_contrast(mut self, factor: f32) -> Self {
        self.config.ocr.contrast = factor.clamp(0.0, 10.0);
        self
    }

    pub fn ocr_sharpness(mut self, factor: f32) -> Self {
        self.config.ocr.sharpness = factor.clamp(0.0, 10.0);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn ocr_command(mut self, cmd: impl Into<String>) -> Self {
        self.config.ocr.command = cmd.into();
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr.engine = Some(engine);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Img2DocxError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(Img2DocxError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(Img2DocxError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Img2DocxError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.mode == ExtractionMode::Ocr && c.ocr.language.trim().is_empty() {
            return Err(Img2DocxError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
