//! CLI binary for edgequake-img2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and writes the resulting document.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_img2docx::config::{DEFAULT_MODEL, DEFAULT_TITLE};
use edgequake_img2docx::convert::write_atomic;
use edgequake_img2docx::document::DEFAULT_OUTPUT_NAME;
use edgequake_img2docx::{
    convert, render_html, ConversionConfig, ConversionProgressCallback, ConversionStats,
    ExtractionMode, OcrAvailability, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER_TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the run, one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&SPINNER_TICKS);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} images…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, paragraphs: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<14}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{paragraphs:>4} paragraphs")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    // The run summary is printed by `main` once the file is on disk.
    fn on_conversion_complete(&self, _total_pages: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Formatted DOCX from two scans (Groq vision model)
  img2docx page1.png page2.jpg -o notes.docx

  # Pick the larger model, drop the page images
  img2docx --model meta-llama/llama-4-maverick-17b-128e-instruct --no-page-image scan.png

  # Handwriting via local Tesseract OCR
  img2docx --mode ocr notes.jpg -o notes.docx

  # Another vision provider through edgequake-llm
  img2docx --provider openai --model gpt-4.1-mini scan.webp

  # Write an HTML preview next to the document
  img2docx scan.png --preview preview.html

  # JSON summary on stdout
  img2docx --json scan.png

ENVIRONMENT VARIABLES:
  GROQ_API_KEY            Groq API key (vision mode, default provider)
  OPENAI_API_KEY, …       Keys for other providers selected with --provider
  IMG2DOCX_CLOUD          Mark this host as a hosted deployment (OCR defaults off
                          when no local engine is installed)
"#;

/// Convert page images to a formatted Word document.
#[derive(Parser, Debug)]
#[command(
    name = "img2docx",
    version,
    about = "Convert page images to a formatted Word document using Vision LLMs or local OCR",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image files (png, jpg, jpeg, webp) or HTTP/HTTPS URLs, in page order.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output .docx path.
    #[arg(short, long, env = "IMG2DOCX_OUTPUT", default_value = DEFAULT_OUTPUT_NAME)]
    output: PathBuf,

    /// Extraction mode: vision (formatted layout) or ocr (local Tesseract).
    #[arg(long, env = "IMG2DOCX_MODE", value_enum, default_value = "vision")]
    mode: ModeArg,

    /// Vision model ID.
    #[arg(
        long,
        env = "IMG2DOCX_MODEL",
        default_value = DEFAULT_MODEL,
        long_help = "Vision model to use. Suggested Groq models:\n  \
          meta-llama/llama-4-scout-17b-16e-instruct (default)\n  \
          meta-llama/llama-4-maverick-17b-128e-instruct"
    )]
    model: String,

    /// Vision provider: groq (default) or any edgequake-llm provider name.
    #[arg(long, env = "IMG2DOCX_PROVIDER")]
    provider: Option<String>,

    /// Groq API key.
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint.
    #[arg(long, env = "IMG2DOCX_API_BASE")]
    api_base: Option<String>,

    /// Do not embed the original page images.
    #[arg(long, env = "IMG2DOCX_NO_PAGE_IMAGE")]
    no_page_image: bool,

    /// Top-level document heading.
    #[arg(long, env = "IMG2DOCX_TITLE", default_value = DEFAULT_TITLE)]
    title: String,

    /// Run OCR in ocr mode: auto picks off only on a hosted deployment without Tesseract.
    #[arg(long, env = "IMG2DOCX_OCR", value_enum, default_value = "auto")]
    ocr: OcrSwitch,

    /// Tesseract language code.
    #[arg(long, env = "IMG2DOCX_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Contrast multiplier applied before OCR.
    #[arg(long, env = "IMG2DOCX_OCR_CONTRAST", default_value_t = 2.0)]
    ocr_contrast: f32,

    /// Sharpness multiplier applied before OCR.
    #[arg(long, env = "IMG2DOCX_OCR_SHARPNESS", default_value_t = 2.0)]
    ocr_sharpness: f32,

    /// Tesseract executable.
    #[arg(long, env = "TESSERACT_CMD", default_value = "tesseract")]
    tesseract_cmd: String,

    /// Also write an HTML preview of the document to this path.
    #[arg(long, env = "IMG2DOCX_PREVIEW")]
    preview: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "IMG2DOCX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Sampling temperature of the first attempt (0.0–2.0).
    #[arg(long, env = "IMG2DOCX_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max completion tokens per page.
    #[arg(long, env = "IMG2DOCX_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Per-call vision API timeout in seconds.
    #[arg(long, env = "IMG2DOCX_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IMG2DOCX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print a JSON summary (pages + stats) to stdout.
    #[arg(long, env = "IMG2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IMG2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IMG2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IMG2DOCX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Vision,
    Ocr,
}

impl From<ModeArg> for ExtractionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Vision => ExtractionMode::Vision,
            ModeArg::Ocr => ExtractionMode::Ocr,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OcrSwitch {
    Auto,
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert(&cli.inputs, &config)
        .await
        .context("Conversion failed")?;

    write_atomic(&cli.output, &output.docx)
        .await
        .context("Failed to write document")?;

    if let Some(ref preview_path) = cli.preview {
        tokio::fs::write(preview_path, render_html(&output.plan))
            .await
            .with_context(|| format!("Failed to write preview to {:?}", preview_path))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        for line in summary_lines(&output.stats, config.mode, &cli.output, cli.preview.as_deref()) {
            eprintln!("{line}");
        }
    }

    Ok(())
}

/// Final report: one "done" line, then token usage and the preview path.
fn summary_lines(
    stats: &ConversionStats,
    mode: ExtractionMode,
    output: &Path,
    preview: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![format!(
        "{}  {} pages  {} paragraphs  {}ms  →  {}",
        green("✔"),
        stats.total_pages,
        stats.total_paragraphs,
        stats.total_duration_ms,
        bold(&output.display().to_string()),
    )];
    if mode == ExtractionMode::Vision {
        lines.push(format!(
            "   {} tokens in  /  {} tokens out{}",
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            if stats.retried_pages > 0 {
                format!("  ({} pages retried)", stats.retried_pages)
            } else {
                String::new()
            },
        ));
    }
    if let Some(p) = preview {
        lines.push(format!("   preview  →  {}", p.display()));
    }
    lines
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mode: ExtractionMode = cli.mode.into();

    let ocr_enabled = match cli.ocr {
        OcrSwitch::On => true,
        OcrSwitch::Off => false,
        OcrSwitch::Auto if mode == ExtractionMode::Ocr => {
            let availability = OcrAvailability::detect(&cli.tesseract_cmd);
            if !availability.default_enabled() && !cli.quiet {
                eprintln!(
                    "{} Hosted environment without '{}': OCR is off (use --ocr on to force it)",
                    cyan("⚠"),
                    cli.tesseract_cmd
                );
            }
            availability.default_enabled()
        }
        OcrSwitch::Auto => true,
    };

    let mut builder = ConversionConfig::builder()
        .mode(mode)
        .model(cli.model.clone())
        .include_page_image(!cli.no_page_image)
        .title(cli.title.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .ocr_enabled(ocr_enabled)
        .ocr_language(cli.ocr_lang.clone())
        .ocr_contrast(cli.ocr_contrast)
        .ocr_sharpness(cli.ocr_sharpness)
        .ocr_command(cli.tesseract_cmd.clone())
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref base) = cli.api_base {
        builder = builder.api_base_url(base.clone());
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
