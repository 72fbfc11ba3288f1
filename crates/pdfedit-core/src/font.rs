//! Glyph advance widths for fonts found in page resources
//!
//! Simple fonts take their widths from `/FirstChar` + `/Widths`, composite
//! (`Type0`) fonts from the descendant's `/DW` + `/W`. Fonts without width
//! arrays fall back to the standard-14 AFM metrics when the base font is
//! one we carry tables for, and to an average advance otherwise.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::redact::number;

/// Advance assumed for glyphs of fonts with no usable metrics (1/1000 em).
pub const ESTIMATED_WIDTH: f64 = 600.0;

/// Helvetica advance widths for codes 32..=126 (1/1000 em).
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// Times-Roman advance widths for codes 32..=126 (1/1000 em).
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, // 32-47
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, // 48-63
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722, // 64-79
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500, // 80-95
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500, // 96-111
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, // 112-126
];

/// Helvetica width of a WinAnsi code (1/1000 em).
pub fn helvetica_width(code: u8) -> u16 {
    match code {
        32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ => 556,
    }
}

/// Advance widths of one font, keyed by character code.
#[derive(Debug, Clone, PartialEq)]
pub struct FontMetrics {
    /// Bytes per character code: 1 for simple fonts, 2 for `Type0`.
    pub code_len: usize,
    widths: HashMap<u32, f64>,
    default_width: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self::estimated()
    }
}

impl FontMetrics {
    /// Single-byte font with every glyph at [`ESTIMATED_WIDTH`].
    pub fn estimated() -> Self {
        Self {
            code_len: 1,
            widths: HashMap::new(),
            default_width: ESTIMATED_WIDTH,
        }
    }

    /// Built-in metrics for a standard-14 face (or a common alias of one).
    pub fn standard(base_font: &str) -> Option<Self> {
        let name = strip_subset_prefix(base_font);
        let (table, default_width) = match name {
            "Helvetica" | "Helvetica-Oblique" | "Arial" | "ArialMT" | "Arial-ItalicMT" => {
                (Some(&HELVETICA_WIDTHS), 556.0)
            }
            "Times-Roman" | "TimesNewRoman" | "TimesNewRomanPSMT" => {
                (Some(&TIMES_ROMAN_WIDTHS), 500.0)
            }
            n if n.starts_with("Courier") => (None, 600.0),
            _ => return None,
        };

        let widths = table
            .map(|t| {
                t.iter()
                    .enumerate()
                    .map(|(i, w)| (i as u32 + 32, *w as f64))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            code_len: 1,
            widths,
            default_width,
        })
    }

    /// Metrics for a font dictionary, resolving indirect entries in `doc`.
    pub fn from_font_dict(doc: &Document, font: &Dictionary) -> Self {
        let subtype = name_of(font.get(b"Subtype").ok());
        match subtype.as_deref() {
            Some("Type0") => composite_metrics(doc, font),
            Some("Type3") => Self::estimated(),
            _ => simple_metrics(doc, font),
        }
    }

    /// Advance of `code` in 1/1000 em.
    pub fn width(&self, code: u32) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.default_width)
    }

    /// Split a shown string into `(code, byte_range)` pairs.
    pub fn codes(&self, bytes: &[u8]) -> Vec<(u32, std::ops::Range<usize>)> {
        let step = self.code_len.max(1);
        (0..bytes.len())
            .step_by(step)
            .map(|start| {
                let end = (start + step).min(bytes.len());
                let code = bytes[start..end]
                    .iter()
                    .fold(0u32, |acc, b| (acc << 8) | *b as u32);
                (code, start..end)
            })
            .collect()
    }
}

fn simple_metrics(doc: &Document, font: &Dictionary) -> FontMetrics {
    let base_font = name_of(font.get(b"BaseFont").ok());
    let widths = font
        .get(b"Widths")
        .ok()
        .map(|w| resolve(doc, w))
        .and_then(|w| w.as_array().ok());

    let Some(widths) = widths else {
        return base_font
            .as_deref()
            .and_then(FontMetrics::standard)
            .unwrap_or_else(FontMetrics::estimated);
    };

    let first_char = font
        .get(b"FirstChar")
        .ok()
        .and_then(|f| number(resolve(doc, f)))
        .unwrap_or(0.0) as u32;
    let missing = font
        .get(b"FontDescriptor")
        .ok()
        .map(|d| resolve(doc, d))
        .and_then(|d| d.as_dict().ok())
        .and_then(|d| d.get(b"MissingWidth").ok())
        .and_then(|w| number(resolve(doc, w)));
    let fallback = base_font
        .as_deref()
        .and_then(FontMetrics::standard)
        .map(|m| m.default_width);

    FontMetrics {
        code_len: 1,
        widths: widths
            .iter()
            .enumerate()
            .filter_map(|(i, w)| Some((first_char + i as u32, number(resolve(doc, w))?)))
            .collect(),
        default_width: missing.or(fallback).unwrap_or(ESTIMATED_WIDTH),
    }
}

fn composite_metrics(doc: &Document, font: &Dictionary) -> FontMetrics {
    let descendant = font
        .get(b"DescendantFonts")
        .ok()
        .map(|d| resolve(doc, d))
        .and_then(|d| d.as_array().ok())
        .and_then(|a| a.first())
        .map(|d| resolve(doc, d))
        .and_then(|d| d.as_dict().ok());

    let mut metrics = FontMetrics {
        code_len: 2,
        widths: HashMap::new(),
        default_width: 1000.0,
    };
    let Some(descendant) = descendant else {
        return metrics;
    };

    if let Some(dw) = descendant
        .get(b"DW")
        .ok()
        .and_then(|d| number(resolve(doc, d)))
    {
        metrics.default_width = dw;
    }

    // `/W` entries are either `c [w1 w2 ...]` or `c_first c_last w`.
    let entries = match descendant.get(b"W").map(|w| resolve(doc, w)) {
        Ok(Object::Array(entries)) => entries.as_slice(),
        _ => return metrics,
    };
    let mut i = 0;
    while i < entries.len() {
        let Some(first) = number(resolve(doc, &entries[i])) else {
            break;
        };
        match entries.get(i + 1).map(|e| resolve(doc, e)) {
            Some(Object::Array(run)) => {
                for (offset, w) in run.iter().enumerate() {
                    if let Some(w) = number(resolve(doc, w)) {
                        metrics.widths.insert(first as u32 + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (
                    number(last),
                    entries.get(i + 2).and_then(|w| number(resolve(doc, w))),
                ) else {
                    break;
                };
                for code in first as u32..=last as u32 {
                    metrics.widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    metrics
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    match obj {
        Some(Object::Name(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// `ABCDEF+Helvetica` -> `Helvetica`
fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_fonts() {
        let times = FontMetrics::standard("Times-Roman").unwrap();
        assert_eq!(times.width(b'i' as u32), 278.0);
        assert_eq!(times.width(b'N' as u32), 722.0);

        let courier = FontMetrics::standard("Courier-Bold").unwrap();
        assert_eq!(courier.width(b'i' as u32), 600.0);

        let subset = FontMetrics::standard("ABCDEF+Helvetica").unwrap();
        assert_eq!(subset.width(b'H' as u32), 722.0);

        assert!(FontMetrics::standard("Comic-Sans").is_none());
    }

    #[test]
    fn test_widths_array_overrides_standard_metrics() {
        let doc = Document::with_version("1.7");
        let font = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Helvetica",
            "FirstChar" => 65,
            "Widths" => vec![100.into(), 200.into()],
        };
        let metrics = FontMetrics::from_font_dict(&doc, &font);
        assert_eq!(metrics.width(65), 100.0);
        assert_eq!(metrics.width(66), 200.0);
        // Outside the array: the base font's default
        assert_eq!(metrics.width(90), 556.0);
    }

    #[test]
    fn test_missing_width_from_descriptor() {
        let mut doc = Document::with_version("1.7");
        let descriptor = doc.add_object(dictionary! { "MissingWidth" => 321 });
        let font = dictionary! {
            "Subtype" => "Type1",
            "BaseFont" => "Custom",
            "FirstChar" => 32,
            "Widths" => vec![250.into()],
            "FontDescriptor" => descriptor,
        };
        let metrics = FontMetrics::from_font_dict(&doc, &font);
        assert_eq!(metrics.width(32), 250.0);
        assert_eq!(metrics.width(100), 321.0);
    }

    #[test]
    fn test_composite_font_widths() {
        let mut doc = Document::with_version("1.7");
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "DW" => 800,
            "W" => vec![
                10.into(),
                Object::Array(vec![500.into(), 600.into()]),
                20.into(),
                25.into(),
                300.into(),
            ],
        });
        let font = dictionary! {
            "Subtype" => "Type0",
            "BaseFont" => "SomeCID",
            "DescendantFonts" => vec![descendant.into()],
        };
        let metrics = FontMetrics::from_font_dict(&doc, &font);
        assert_eq!(metrics.code_len, 2);
        assert_eq!(metrics.width(10), 500.0);
        assert_eq!(metrics.width(11), 600.0);
        assert_eq!(metrics.width(22), 300.0);
        assert_eq!(metrics.width(99), 800.0);
    }

    #[test]
    fn test_unknown_font_is_estimated() {
        let doc = Document::with_version("1.7");
        let font = dictionary! { "Subtype" => "Type1", "BaseFont" => "Mystery" };
        assert_eq!(FontMetrics::from_font_dict(&doc, &font), FontMetrics::estimated());
    }

    #[test]
    fn test_two_byte_codes() {
        let metrics = FontMetrics {
            code_len: 2,
            ..FontMetrics::estimated()
        };
        let codes = metrics.codes(&[0x00, 0x41, 0x01, 0x02]);
        assert_eq!(codes, vec![(0x41, 0..2), (0x0102, 2..4)]);
    }
}
