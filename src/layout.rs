//! Layout documents: the structured page description returned by the VLM.
//!
//! The model is asked for
//!
//! ```json
//! {"paragraphs": [{"alignment": "left|center|right|justify",
//!                  "runs": [{"text": "…", "bold": false, "italic": false}]}]}
//! ```
//!
//! Only the outer shape is strict: `paragraphs` must exist and be an array.
//! A failure there is what triggers the single low-temperature retry in
//! [`crate::pipeline::vision`]. Everything inside the array is read leniently:
//! models routinely drop a field or emit `"Center"` instead of `"center"`, and
//! refusing the whole page for that would throw away good text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Paragraph alignment. Anything unrecognised maps to [`Alignment::Left`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Parse a model-supplied alignment string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            "justify" => Alignment::Justify,
            _ => Alignment::Left,
        }
    }

    /// CSS `text-align` value, used by the HTML preview.
    pub fn as_css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

/// A contiguous span of text sharing one bold/italic styling.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }
}

/// One paragraph in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayoutParagraph {
    pub alignment: Alignment,
    pub runs: Vec<TextRun>,
}

impl LayoutParagraph {
    /// All run texts concatenated in order.
    pub fn joined_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// True when the paragraph carries no visible text.
    pub fn is_blank(&self) -> bool {
        self.joined_text().trim().is_empty()
    }
}

/// A page described as an ordered list of paragraphs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayoutDocument {
    pub paragraphs: Vec<LayoutParagraph>,
}

/// Why a model response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutParseError {
    #[error("response is not valid JSON: {0}")]
    Json(String),

    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("response has no 'paragraphs' field")]
    MissingParagraphs,

    #[error("'paragraphs' is not a list")]
    ParagraphsNotList,
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*?)\n?```$").unwrap());

/// Strip an outer ```` ```json ```` fence if the model added one anyway.
fn strip_code_fence(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_JSON_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => trimmed,
    }
}

/// Parse and shape-check a raw model response.
pub fn parse_layout(content: &str) -> Result<LayoutDocument, LayoutParseError> {
    let body = strip_code_fence(content);
    let value: Value =
        serde_json::from_str(body).map_err(|e| LayoutParseError::Json(e.to_string()))?;

    let obj = value.as_object().ok_or(LayoutParseError::NotAnObject)?;
    let paragraphs = obj
        .get("paragraphs")
        .ok_or(LayoutParseError::MissingParagraphs)?
        .as_array()
        .ok_or(LayoutParseError::ParagraphsNotList)?;

    Ok(LayoutDocument {
        paragraphs: paragraphs.iter().map(read_paragraph).collect(),
    })
}

fn read_paragraph(value: &Value) -> LayoutParagraph {
    let alignment = value
        .get("alignment")
        .and_then(Value::as_str)
        .map(Alignment::parse)
        .unwrap_or_default();

    let runs = value
        .get("runs")
        .and_then(Value::as_array)
        .map(|runs| runs.iter().map(read_run).collect())
        .unwrap_or_default();

    LayoutParagraph { alignment, runs }
}

fn read_run(value: &Value) -> TextRun {
    let text = match value.get("text") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    TextRun {
        text,
        bold: value.get("bold").is_some_and(truthy),
        italic: value.get("italic").is_some_and(truthy),
    }
}

/// Loose truthiness for style flags: models sometimes send `"true"` or `1`.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
