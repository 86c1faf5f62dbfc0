//! OOXML writer: [`DocumentPlan`] → `.docx` bytes via `docx-rs`.
//!
//! The writer holds no logic of its own beyond mapping blocks one-to-one:
//! headings become paragraphs styled `Heading1`/`Heading2`, images become
//! inline pictures, page breaks become a run holding a page break.

use crate::document::{Block, DocumentPlan};
use crate::error::Img2DocxError;
use crate::layout::{Alignment, TextRun};
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Pic, Run, Style, StyleType};
use std::io::Cursor;
use tracing::debug;

fn heading_style_id(level: u8) -> String {
    format!("Heading{}", level.clamp(1, 9))
}

/// Paragraph styles for the heading levels the builder emits.
fn heading_styles() -> Vec<Style> {
    [(1u8, 32usize), (2, 26)]
        .into_iter()
        .map(|(level, half_points)| {
            Style::new(heading_style_id(level), StyleType::Paragraph)
                .name(format!("Heading {level}"))
                .size(half_points)
                .bold()
        })
        .collect()
}

fn map_alignment(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Right => AlignmentType::Right,
        Alignment::Justify => AlignmentType::Both,
    }
}

/// Line breaks inside a run become `w:br`, tabs become `w:tab`.
fn map_run(run: &TextRun) -> Run {
    let mut r = Run::new();
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            r = r.add_break(BreakType::TextWrapping);
        }
        for (j, piece) in line.trim_end_matches('\r').split('\t').enumerate() {
            if j > 0 {
                r = r.add_tab();
            }
            if !piece.is_empty() {
                r = r.add_text(piece);
            }
        }
    }
    if run.bold {
        r = r.bold();
    }
    if run.italic {
        r = r.italic();
    }
    r
}

fn map_block(block: &Block) -> Paragraph {
    match block {
        Block::Heading { level, text } => Paragraph::new()
            .style(&heading_style_id(*level))
            .add_run(Run::new().add_text(text.as_str())),
        Block::Image {
            png,
            width_emu,
            height_emu,
            ..
        } => Paragraph::new().add_run(
            Run::new().add_image(Pic::new(png).size(*width_emu, *height_emu)),
        ),
        Block::Paragraph { alignment, runs } => runs
            .iter()
            .fold(Paragraph::new().align(map_alignment(*alignment)), |p, r| {
                p.add_run(map_run(r))
            }),
        Block::PageBreak => Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
    }
}

/// Serialise the plan into an in-memory `.docx`.
pub fn write_docx(plan: &DocumentPlan) -> Result<Vec<u8>, Img2DocxError> {
    let docx = heading_styles()
        .into_iter()
        .fold(Docx::new(), |d, s| d.add_style(s));
    let docx = plan
        .blocks
        .iter()
        .fold(docx, |d, block| d.add_paragraph(map_block(block)));

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| Img2DocxError::DocxWriteFailed(e.to_string()))?;

    let bytes = buf.into_inner();
    debug!(
        "Wrote DOCX: {} blocks → {} bytes",
        plan.blocks.len(),
        bytes.len()
    );
    Ok(bytes)
}
