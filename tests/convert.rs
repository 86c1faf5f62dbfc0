//! Offline integration tests: full conversions against scripted backends.
//!
//! No network and no Tesseract install are needed; the vision model and the
//! OCR engine are replaced through their trait seams.

use async_trait::async_trait;
use edgequake_img2docx::error::OcrError;
use edgequake_img2docx::{
    convert, convert_stream, convert_to_file, render_html, Alignment, Block,
    ConversionConfig, ConversionProgressCallback, ExtractionMode, Img2DocxError, OcrEngine,
    PageContent, VisionBackend, VisionRequest, VisionResponse,
};
use futures::StreamExt;
use image::{Rgb, RgbImage};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test doubles ─────────────────────────────────────────────────────────────

/// Replays canned responses in order and records every request.
struct ScriptedBackend {
    responses: Mutex<Vec<String>>,
    seen: Mutex<Vec<(usize, f32)>>,
}

impl ScriptedBackend {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().rev().map(|s| s.to_string()).collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(usize, f32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<VisionResponse, Img2DocxError> {
        assert!(request.image.data_url().starts_with("data:image/jpeg;base64,"));
        self.seen
            .lock()
            .unwrap()
            .push((request.page_num, request.temperature));
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop()
            .expect("backend called more often than scripted");
        Ok(VisionResponse {
            content,
            prompt_tokens: 100,
            completion_tokens: 20,
        })
    }
}

struct FixedOcr(&'static str);

impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _image: &RgbImage) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

struct BrokenOcr;

impl OcrEngine for BrokenOcr {
    fn name(&self) -> &str {
        "broken"
    }

    fn recognize(&self, _image: &RgbImage) -> Result<String, OcrError> {
        Err(OcrError::EngineMissing {
            command: "tesseract".into(),
        })
    }
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: AtomicUsize,
    finished: AtomicUsize,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_page_start(&self, _page_num: usize, _total: usize) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_complete(&self, _page_num: usize, _total: usize, _paragraphs: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_page_error(&self, _page_num: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }

    fn on_conversion_complete(&self, _total: usize, _success: usize) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
    let path: PathBuf = dir.join(name);
    RgbImage::from_pixel(width, height, Rgb([240, 240, 240]))
        .save(&path)
        .unwrap();
    path.to_string_lossy().into_owned()
}

/// The main part of a written `.docx` package.
fn document_xml(docx: &[u8]) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut xml)
        .unwrap();
    xml
}

const PAGE_ONE: &str = r#"{"paragraphs": [
  {"alignment": "center", "runs": [{"text": "Meeting Notes", "bold": true, "italic": false}]},
  {"alignment": "justify", "runs": [
     {"text": "Ship the ", "bold": false, "italic": false},
     {"text": "release", "bold": false, "italic": true}
  ]}
]}"#;

const PAGE_TWO: &str = "```json\n{\"paragraphs\": [{\"alignment\": \"right\", \"runs\": [{\"text\": \"Signed\"}]}]}\n```";

fn vision_config(backend: Arc<ScriptedBackend>) -> ConversionConfig {
    ConversionConfig::builder()
        .backend(backend)
        .title("Notes")
        .build()
        .unwrap()
}

// ── Vision mode ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn vision_two_pages_builds_formatted_document() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 40, 20);
    let b = write_png(dir.path(), "b.png", 30, 30);

    let backend = ScriptedBackend::new(&[PAGE_ONE, PAGE_TWO]);
    let out = convert(&[a, b], &vision_config(backend.clone()))
        .await
        .unwrap();

    assert_eq!(backend.calls(), vec![(1, 0.2), (2, 0.2)]);
    assert_eq!(out.stats.total_pages, 2);
    assert_eq!(out.stats.total_paragraphs, 3);
    assert_eq!(out.stats.retried_pages, 0);
    assert_eq!(out.stats.total_input_tokens, 200);
    assert_eq!(out.plan.page_breaks(), 1);
    assert_eq!(&out.docx[..2], b"PK");

    let headings: Vec<_> = out
        .plan
        .blocks
        .iter()
        .filter_map(|b| match b {
            Block::Heading { level, text } => Some((*level, text.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(headings, vec![(1, "Notes"), (2, "Page 1"), (2, "Page 2")]);

    let alignments: Vec<_> = out
        .plan
        .paragraphs()
        .filter(|(_, runs)| !runs.is_empty())
        .map(|(a, _)| *a)
        .collect();
    assert_eq!(
        alignments,
        vec![Alignment::Center, Alignment::Justify, Alignment::Right]
    );

    let xml = document_xml(&out.docx);
    assert_eq!(xml.matches(r#"w:type="page""#).count(), 1);
    assert_eq!(xml.matches("<w:drawing>").count(), 2);
    assert_eq!(xml.matches(r#"<w:pStyle w:val="Heading2" />"#).count(), 2);
    assert!(xml.contains(r#"<w:jc w:val="both" />"#));
    assert!(xml.contains(">Meeting Notes</w:t>"));
}

#[tokio::test]
async fn invalid_first_response_is_retried_cold() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 8, 8);

    let backend = ScriptedBackend::new(&["Sure! Here is the layout:", PAGE_ONE]);
    let out = convert(&[a], &vision_config(backend.clone()))
        .await
        .unwrap();

    assert_eq!(backend.calls(), vec![(1, 0.2), (1, 0.0)]);
    assert_eq!(out.pages[0].attempts, 2);
    assert_eq!(out.stats.retried_pages, 1);
    assert_eq!(out.stats.total_paragraphs, 2);
}

#[tokio::test]
async fn two_invalid_responses_abort_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 8, 8);
    let b = write_png(dir.path(), "b.png", 8, 8);
    let target = dir.path().join("out.docx");

    let backend = ScriptedBackend::new(&[r#"{"text": "nope"}"#, "[]"]);
    let callback = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .backend(backend.clone())
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let err = convert_to_file(&[a, b], &target, &config)
        .await
        .unwrap_err();

    match err {
        Img2DocxError::InvalidModelOutput { page, attempts, .. } => {
            assert_eq!(page, 1);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // The second page is never requested and nothing is written.
    assert_eq!(backend.calls().len(), 2);
    assert!(!target.exists());
    assert_eq!(callback.errors.load(Ordering::SeqCst), 1);
    assert_eq!(callback.finished.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn without_page_images_only_text_remains() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 8, 8);

    let backend = ScriptedBackend::new(&[PAGE_TWO]);
    let config = ConversionConfig::builder()
        .backend(backend)
        .include_page_image(false)
        .build()
        .unwrap();
    let out = convert(&[a], &config).await.unwrap();

    assert!(!out
        .plan
        .blocks
        .iter()
        .any(|b| matches!(b, Block::Image { .. })));
    let html = render_html(&out.plan);
    assert!(html.contains("text-align:right"));
    assert!(!html.contains("<img"));
    assert!(!document_xml(&out.docx).contains("<w:drawing>"));
}

#[tokio::test]
async fn missing_input_fails_before_any_model_call() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 8, 8);
    let missing = dir.path().join("missing.png");

    let backend = ScriptedBackend::new(&[]);
    let err = convert(
        &[a, missing.to_string_lossy().into_owned()],
        &vision_config(backend.clone()),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Img2DocxError::FileNotFound { .. }));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn stream_yields_pages_in_upload_order() {
    let dir = tempfile::tempdir().unwrap();
    let inputs = vec![
        write_png(dir.path(), "first.png", 8, 8),
        write_png(dir.path(), "second.png", 8, 8),
    ];

    let backend = ScriptedBackend::new(&[PAGE_ONE, PAGE_TWO]);
    let config = vision_config(backend);
    let pages: Vec<_> = convert_stream(&inputs, &config)
        .await
        .unwrap()
        .collect()
        .await;

    let nums: Vec<_> = pages
        .iter()
        .map(|p| p.as_ref().unwrap().result.page_num)
        .collect();
    assert_eq!(nums, vec![1, 2]);
    assert!(pages[0]
        .as_ref()
        .unwrap()
        .result
        .source
        .ends_with("first.png"));
}

// ── OCR mode ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ocr_mode_writes_one_paragraph_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "note.png", 16, 16);
    let target = dir.path().join("docs/note.docx");

    let callback = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .mode(ExtractionMode::Ocr)
        .ocr_engine(Arc::new(FixedOcr("Dear  diary\n\n  went  hiking  \n")))
        .progress_callback(callback.clone())
        .build()
        .unwrap();

    let out = convert_to_file(&[a], &target, &config).await.unwrap();

    assert!(target.exists());
    assert_eq!(std::fs::read(&target).unwrap(), out.docx);
    assert_eq!(out.pages[0].attempts, 0);
    assert_eq!(out.stats.total_input_tokens, 0);
    assert_eq!(callback.started.load(Ordering::SeqCst), 1);
    assert_eq!(callback.completed.load(Ordering::SeqCst), 1);
    assert_eq!(callback.finished.load(Ordering::SeqCst), 1);

    let texts: Vec<String> = out
        .plan
        .paragraphs()
        .filter(|(_, runs)| !runs.is_empty())
        .map(|(_, runs)| runs.iter().map(|r| r.text.as_str()).collect())
        .collect();
    assert_eq!(texts, vec!["Dear diary", "went hiking"]);
}

#[tokio::test]
async fn ocr_failure_degrades_to_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "blank.png", 16, 16);

    let config = ConversionConfig::builder()
        .mode(ExtractionMode::Ocr)
        .ocr_engine(Arc::new(BrokenOcr))
        .build()
        .unwrap();
    let out = convert(&[a], &config).await.unwrap();

    let html = render_html(&out.plan);
    assert!(html.contains("No text detected."));
    assert_eq!(out.stats.total_paragraphs, 1);
}

#[tokio::test]
async fn ocr_disabled_keeps_images_only() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_png(dir.path(), "a.png", 16, 16);
    let b = write_png(dir.path(), "b.png", 16, 16);

    let config = ConversionConfig::builder()
        .mode(ExtractionMode::Ocr)
        .ocr_enabled(false)
        .ocr_engine(Arc::new(FixedOcr("never used")))
        .build()
        .unwrap();
    let mut stream = convert_stream(&[a, b], &config).await.unwrap();

    let mut count = 0;
    while let Some(page) = stream.next().await {
        assert_eq!(page.unwrap().content, PageContent::ImageOnly);
        count += 1;
    }
    assert_eq!(count, 2);
}

#[tokio::test]
async fn no_inputs_yields_title_only_document() {
    let config = ConversionConfig::builder()
        .api_key("")
        .title("Empty upload")
        .build()
        .unwrap();
    let inputs: [&str; 0] = [];
    let out = convert(&inputs, &config).await.unwrap();

    assert_eq!(
        out.plan.blocks,
        vec![Block::Heading {
            level: 1,
            text: "Empty upload".into()
        }]
    );
    assert_eq!(out.plan.page_breaks(), 0);
}
