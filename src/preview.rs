//! Standalone HTML preview of a [`DocumentPlan`].
//!
//! Renders the same blocks the `.docx` is written from, so what the preview
//! shows is what Word will show, minus page geometry.

use crate::document::{Block, DocumentPlan};
use crate::layout::TextRun;
use base64::{engine::general_purpose::STANDARD, Engine as _};

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_run(run: &TextRun) -> String {
    let mut html = escape_html(&run.text)
        .replace("\r\n", "\n")
        .replace('\n', "<br>");
    if run.italic {
        html = format!("<em>{html}</em>");
    }
    if run.bold {
        html = format!("<strong>{html}</strong>");
    }
    html
}

fn render_block(block: &Block) -> String {
    match block {
        Block::Heading { level, text } => {
            let level = (*level).clamp(1, 6);
            format!("<h{level}>{}</h{level}>", escape_html(text))
        }
        Block::Image { png, .. } => format!(
            "<img src=\"data:image/png;base64,{}\" style=\"max-width:100%\" alt=\"page image\">",
            STANDARD.encode(png)
        ),
        Block::Paragraph { alignment, runs } => format!(
            "<p style=\"text-align:{}\">{}</p>",
            alignment.as_css(),
            runs.iter().map(render_run).collect::<String>()
        ),
        Block::PageBreak => "<hr>".to_string(),
    }
}

/// Render the plan as a complete HTML page.
pub fn render_html(plan: &DocumentPlan) -> String {
    let title = plan
        .blocks
        .iter()
        .find_map(|b| match b {
            Block::Heading { level: 1, text } => Some(escape_html(text)),
            _ => None,
        })
        .unwrap_or_default();

    let body: Vec<String> = plan.blocks.iter().map(render_block).collect();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>body{{background:#fff;color:#000;font-family:serif;max-width:50em;margin:2em auto;}}</style>\n\
         </head>\n<body>\n{}\n</body>\n</html>\n",
        body.join("\n")
    )
}
