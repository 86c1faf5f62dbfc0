//! Input resolution: turn user-supplied paths and URLs into RGB page images.
//!
//! Inputs keep the order the user gave them; that order becomes the page
//! order of the output document. Every image is normalised to 8-bit RGB up
//! front so the encode and OCR stages never see alpha or palette data.

use crate::error::Img2DocxError;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions accepted for local inputs.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// One uploaded page, decoded and normalised to RGB.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed position in upload order.
    pub page_num: usize,
    /// File name or URL the image came from.
    pub source: String,
    pub image: RgbImage,
}

impl PageImage {
    pub fn new(page_num: usize, source: impl Into<String>, image: RgbImage) -> Self {
        Self {
            page_num,
            source: source.into(),
            image,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check the extension of a local file against [`SUPPORTED_EXTENSIONS`].
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Resolve every input, in order, to a decoded page image.
pub async fn resolve_inputs(
    inputs: &[String],
    timeout_secs: u64,
) -> Result<Vec<PageImage>, Img2DocxError> {
    let mut pages = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        let bytes = if is_url(input) {
            download_url(input, timeout_secs).await?
        } else {
            read_local(input).await?
        };
        let image = decode_image(&bytes, input)?;
        debug!(
            "Page {}: {} ({}x{})",
            i + 1,
            input,
            image.width(),
            image.height()
        );
        pages.push(PageImage::new(i + 1, input.clone(), image));
    }
    Ok(pages)
}

/// Decode raw bytes and convert to RGB.
pub fn decode_image(bytes: &[u8], name: &str) -> Result<RgbImage, Img2DocxError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| Img2DocxError::ImageDecode {
            name: name.to_string(),
            detail: e.to_string(),
        })
}

/// Read a local image, validating existence, permissions and extension.
async fn read_local(path_str: &str) -> Result<Vec<u8>, Img2DocxError> {
    if path_str.trim().is_empty() {
        return Err(Img2DocxError::InvalidInput {
            input: path_str.to_string(),
        });
    }

    let path = PathBuf::from(path_str);
    if !path.exists() {
        return Err(Img2DocxError::FileNotFound { path });
    }
    if !has_supported_extension(&path) {
        return Err(Img2DocxError::UnsupportedImage {
            name: path_str.to_string(),
        });
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Img2DocxError::PermissionDenied { path })
        }
        Err(_) => Err(Img2DocxError::FileNotFound { path }),
    }
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Img2DocxError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Img2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Img2DocxError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Img2DocxError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Img2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Img2DocxError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
