//! Edit instructions and best-effort parsing of the raw edit list
//!
//! The edit list is a JSON array. Each entry is validated on its own: a bad
//! entry is recorded as skipped and the remaining entries still parse.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::applicator::{SkipReason, SkippedEdit};
use crate::error::PdfEditError;
use crate::geometry::Region;

/// Font size used when an entry carries no `fontSize`.
pub const DEFAULT_FONT_SIZE: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRect {
    pub fn to_region(&self) -> Region {
        Region::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// One region-based text replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditInstruction {
    /// Zero-based; range-checked against the document at apply time.
    #[serde(deserialize_with = "deserialize_page_index")]
    pub page_index: i64,
    pub rect: PdfRect,
    pub new_text: String,
    #[serde(
        default = "default_font_size",
        deserialize_with = "deserialize_font_size"
    )]
    pub font_size: f64,
}

fn default_font_size() -> f64 {
    DEFAULT_FONT_SIZE
}

fn deserialize_font_size<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(DEFAULT_FONT_SIZE))
}

/// Page indices are accepted as integers, floats (truncated toward zero) or
/// integer strings such as `"3"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPageIndex {
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_page_index<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawPageIndex::deserialize(deserializer) {
        Ok(RawPageIndex::Int(index)) => Ok(index),
        Ok(RawPageIndex::Float(value)) => {
            let truncated = value.trunc();
            if truncated.is_finite() && truncated.abs() < i64::MAX as f64 {
                Ok(truncated as i64)
            } else {
                Err(D::Error::custom(format!(
                    "pageIndex {} is not a representable integer",
                    value
                )))
            }
        }
        Ok(RawPageIndex::Text(text)) => text.trim().parse::<i64>().map_err(|_| {
            D::Error::custom(format!("pageIndex {:?} is not an integer", text))
        }),
        Err(_) => Err(D::Error::custom(
            "pageIndex must be an integer or an integer string",
        )),
    }
}

/// Result of parsing a raw edit list.
#[derive(Debug, Clone, Default)]
pub struct ParsedEdits {
    pub instructions: Vec<EditInstruction>,
    /// Position of each instruction in the raw list.
    pub positions: Vec<usize>,
    /// Entries rejected during parsing, indexed by raw position.
    pub skipped: Vec<SkippedEdit>,
}

impl ParsedEdits {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Parse the `edits` payload.
///
/// Fails only when the payload is not JSON or is not an array. Individual
/// entries that do not validate are returned in [`ParsedEdits::skipped`].
pub fn parse_edits(json: &str) -> Result<ParsedEdits, PdfEditError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PdfEditError::InvalidEdits(e.to_string()))?;

    match value {
        Value::Array(entries) => Ok(parse_entries(entries)),
        other => Err(PdfEditError::InvalidEdits(format!(
            "expected a JSON array of edit objects, got {}",
            json_kind(&other)
        ))),
    }
}

/// Validate each raw entry independently.
pub fn parse_entries(entries: Vec<Value>) -> ParsedEdits {
    let mut parsed = ParsedEdits::default();

    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<EditInstruction>(entry) {
            Ok(instruction) => {
                parsed.instructions.push(instruction);
                parsed.positions.push(index);
            }
            Err(e) => {
                tracing::warn!("Skipping invalid edit object at index {}: {}", index, e);
                parsed.skipped.push(SkippedEdit {
                    index,
                    reason: SkipReason::InvalidEntry {
                        message: e.to_string(),
                    },
                });
            }
        }
    }

    parsed
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
