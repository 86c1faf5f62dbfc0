//! Document builder: extracted pages → [`DocumentPlan`].
//!
//! The plan is a flat list of [`Block`]s in output order. Keeping this step
//! separate from the OOXML writer makes the mapping rules inspectable in
//! tests without unzipping a `.docx`:
//!
//! * one level-1 title heading, then per page a level-2 `Page N` heading
//! * optionally the original image at a fixed display width plus a spacer
//! * layout paragraphs (blank ones skipped, empty runs skipped, bold/italic
//!   copied as-is) or one plain paragraph per OCR line
//! * a page break *between* pages, never after the last

use crate::error::Img2DocxError;
use crate::layout::{Alignment, LayoutDocument, TextRun};
use crate::output::PageResult;
use crate::pipeline::encode::encode_png;
use crate::pipeline::input::PageImage;

/// MIME type of the produced document.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Default download file name.
pub const DEFAULT_OUTPUT_NAME: &str = "formatted_output.docx";

/// Placeholder written when OCR found nothing.
pub const NO_TEXT_PLACEHOLDER: &str = "No text detected.";

/// English Metric Units per inch, the OOXML drawing unit.
pub const EMU_PER_INCH: f64 = 914_400.0;

/// What was extracted from one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// Formatted paragraphs from the vision model.
    Layout(LayoutDocument),
    /// Cleaned OCR text; may be empty.
    Ocr(String),
    /// OCR mode with OCR switched off: the page carries only its image.
    ImageOnly,
}

/// A page together with its extracted content and bookkeeping.
#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub page: PageImage,
    pub content: PageContent,
    pub result: PageResult,
}

/// One element of the output document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Heading {
        level: u8,
        text: String,
    },
    Image {
        png: Vec<u8>,
        width_emu: u32,
        height_emu: u32,
    },
    Paragraph {
        alignment: Alignment,
        runs: Vec<TextRun>,
    },
    PageBreak,
}

impl Block {
    fn empty_paragraph() -> Self {
        Block::Paragraph {
            alignment: Alignment::Left,
            runs: Vec::new(),
        }
    }
}

/// The whole document as an ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPlan {
    pub blocks: Vec<Block>,
}

impl DocumentPlan {
    pub fn page_breaks(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::PageBreak))
            .count()
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = (&Alignment, &Vec<TextRun>)> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph { alignment, runs } => Some((alignment, runs)),
            _ => None,
        })
    }
}

/// Map page content to paragraph blocks.
pub fn content_blocks(content: &PageContent) -> Vec<Block> {
    match content {
        PageContent::Layout(layout) => layout
            .paragraphs
            .iter()
            .filter(|p| !p.is_blank())
            .map(|p| Block::Paragraph {
                alignment: p.alignment,
                runs: p
                    .runs
                    .iter()
                    .filter(|r| !r.text.is_empty())
                    .cloned()
                    .collect(),
            })
            .collect(),
        PageContent::Ocr(text) if text.trim().is_empty() => vec![Block::Paragraph {
            alignment: Alignment::Left,
            runs: vec![TextRun::plain(NO_TEXT_PLACEHOLDER)],
        }],
        PageContent::Ocr(text) => text
            .lines()
            .map(|line| {
                if line.is_empty() {
                    Block::empty_paragraph()
                } else {
                    Block::Paragraph {
                        alignment: Alignment::Left,
                        runs: vec![TextRun::plain(line)],
                    }
                }
            })
            .collect(),
        PageContent::ImageOnly => Vec::new(),
    }
}

/// Build the image block for a page at the given display width.
pub fn image_block(page: &PageImage, width_inches: f32) -> Result<Block, Img2DocxError> {
    let png = encode_png(&page.image).map_err(|e| Img2DocxError::ImageEncode {
        page: page.page_num,
        detail: e.to_string(),
    })?;
    let (width_emu, height_emu) = display_size(page.image.dimensions(), width_inches);
    Ok(Block::Image {
        png,
        width_emu,
        height_emu,
    })
}

/// Display extent in EMU at `width_inches`, keeping the pixel aspect ratio.
///
/// A strip tall enough to overflow `u32` is narrowed until its height fits.
fn display_size((width_px, height_px): (u32, u32), width_inches: f32) -> (u32, u32) {
    let width_emu = (width_inches as f64 * EMU_PER_INCH).round() as u64;
    if width_px == 0 || height_px == 0 {
        return (width_emu as u32, 0);
    }
    let height_emu = width_emu * height_px as u64 / width_px as u64;
    match u32::try_from(height_emu) {
        Ok(h) => (width_emu as u32, h),
        Err(_) => {
            let max = u32::MAX as u64;
            ((max * width_px as u64 / height_px as u64) as u32, u32::MAX)
        }
    }
}

/// Assemble the document plan from pages in upload order.
pub fn build_plan(
    title: &str,
    pages: &[ExtractedPage],
    include_image: bool,
    image_width_inches: f32,
) -> Result<DocumentPlan, Img2DocxError> {
    let mut blocks = vec![Block::Heading {
        level: 1,
        text: title.trim().to_string(),
    }];

    for (i, extracted) in pages.iter().enumerate() {
        blocks.push(Block::Heading {
            level: 2,
            text: format!("Page {}", i + 1),
        });

        if include_image {
            blocks.push(image_block(&extracted.page, image_width_inches)?);
            blocks.push(Block::empty_paragraph());
        }

        blocks.extend(content_blocks(&extracted.content));

        if i + 1 < pages.len() {
            blocks.push(Block::PageBreak);
        }
    }

    Ok(DocumentPlan { blocks })
}
