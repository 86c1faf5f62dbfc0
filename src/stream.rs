//! Streaming extraction API: emit pages one by one, in upload order.
//!
//! Pages are extracted strictly sequentially: each page's VLM call or OCR run
//! finishes before the next one starts, and results arrive in the order the
//! images were given. The eager [`crate::convert::convert`] is a thin
//! collector over this stream that stops at the first error.

use crate::config::{ConversionConfig, ExtractionMode};
use crate::convert::resolve_backend;
use crate::document::{content_blocks, ExtractedPage, PageContent};
use crate::error::Img2DocxError;
use crate::output::PageResult;
use crate::pipeline::input::{self, PageImage};
use crate::pipeline::ocr;
use crate::pipeline::vision::{extract_layout, VisionBackend};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of extracted pages.
pub type PageStream = Pin<Box<dyn Stream<Item = Result<ExtractedPage, Img2DocxError>> + Send>>;

/// Resolve inputs and return a stream of extracted pages.
///
/// # Returns
/// - `Ok(PageStream)`: one item per input, in input order
/// - `Err(Img2DocxError)`: an input could not be read, or the vision
///   backend could not be configured (e.g. missing API key)
pub async fn convert_stream(
    inputs: &[impl AsRef<str>],
    config: &ConversionConfig,
) -> Result<PageStream, Img2DocxError> {
    let inputs: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
    info!("Starting streaming conversion of {} images", inputs.len());

    let pages = input::resolve_inputs(&inputs, config.download_timeout_secs).await?;
    let backend = if config.mode == ExtractionMode::Vision && !pages.is_empty() {
        Some(resolve_backend(config)?)
    } else {
        None
    };
    Ok(extract_stream(pages, config, backend))
}

/// Build a sequential stream over already-decoded pages.
///
/// `backend` is required in vision mode and ignored in OCR mode.
pub fn extract_stream(
    pages: Vec<PageImage>,
    config: &ConversionConfig,
    backend: Option<Arc<dyn VisionBackend>>,
) -> PageStream {
    let total = pages.len();
    let config = config.clone();

    let s = stream::iter(pages).then(move |page| {
        let cfg = config.clone();
        let backend = backend.clone();
        async move { extract_page(page, total, &cfg, backend).await }
    });
    Box::pin(s)
}

/// Extract one page and report progress.
async fn extract_page(
    page: PageImage,
    total: usize,
    config: &ConversionConfig,
    backend: Option<Arc<dyn VisionBackend>>,
) -> Result<ExtractedPage, Img2DocxError> {
    let page_num = page.page_num;
    if let Some(ref cb) = config.progress_callback {
        cb.on_page_start(page_num, total);
    }

    let outcome = extract_content(&page, config, backend).await;

    match outcome {
        Ok((content, mut result)) => {
            result.paragraphs = content_blocks(&content).len();
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_complete(page_num, total, result.paragraphs);
            }
            Ok(ExtractedPage {
                page,
                content,
                result,
            })
        }
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_page_error(page_num, total, &e.to_string());
            }
            Err(e)
        }
    }
}

async fn extract_content(
    page: &PageImage,
    config: &ConversionConfig,
    backend: Option<Arc<dyn VisionBackend>>,
) -> Result<(PageContent, PageResult), Img2DocxError> {
    let start = Instant::now();
    let mut result = PageResult::new(page.page_num, page.source.clone(), config.mode);

    let content = match config.mode {
        ExtractionMode::Vision => {
            let backend = backend.ok_or_else(|| {
                Img2DocxError::Internal("vision backend was not resolved".into())
            })?;
            let extraction = extract_layout(backend.as_ref(), page, config).await?;
            result.attempts = extraction.attempts;
            result.input_tokens = extraction.input_tokens;
            result.output_tokens = extraction.output_tokens;
            PageContent::Layout(extraction.layout)
        }
        ExtractionMode::Ocr if config.ocr.enabled => {
            let engine = ocr::engine_from_options(&config.ocr);
            PageContent::Ocr(ocr::extract_text(engine, page, &config.ocr).await)
        }
        ExtractionMode::Ocr => PageContent::ImageOnly,
    };

    result.duration_ms = start.elapsed().as_millis() as u64;
    Ok((content, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrError;
    use crate::pipeline::ocr::OcrEngine;
    use image::{Rgb, RgbImage};

    struct EchoEngine;

    impl OcrEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        fn recognize(&self, image: &RgbImage) -> Result<String, OcrError> {
            Ok(format!("{}x{}", image.width(), image.height()))
        }
    }

    fn pages(n: usize) -> Vec<PageImage> {
        (1..=n)
            .map(|i| {
                PageImage::new(
                    i,
                    format!("p{i}.png"),
                    RgbImage::from_pixel(i as u32 + 2, 3, Rgb([255, 255, 255])),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn ocr_stream_preserves_order() {
        let config = ConversionConfig::builder()
            .mode(ExtractionMode::Ocr)
            .ocr_engine(Arc::new(EchoEngine))
            .build()
            .unwrap();
        let results: Vec<_> = extract_stream(pages(3), &config, None).collect().await;
        let texts: Vec<_> = results
            .into_iter()
            .map(|r| match r.unwrap().content {
                PageContent::Ocr(t) => t,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["3x3", "4x3", "5x3"]);
    }

    #[tokio::test]
    async fn ocr_disabled_yields_image_only() {
        let config = ConversionConfig::builder()
            .mode(ExtractionMode::Ocr)
            .ocr_enabled(false)
            .build()
            .unwrap();
        let mut s = extract_stream(pages(1), &config, None);
        let page = s.next().await.unwrap().unwrap();
        assert_eq!(page.content, PageContent::ImageOnly);
        assert_eq!(page.result.paragraphs, 0);
        assert!(s.next().await.is_none());
    }

    #[tokio::test]
    async fn vision_without_backend_is_an_error() {
        let config = ConversionConfig::default();
        let mut s = extract_stream(pages(1), &config, None);
        assert!(matches!(
            s.next().await.unwrap(),
            Err(Img2DocxError::Internal(_))
        ));
    }
}
