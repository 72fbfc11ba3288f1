//! Text box layout with the standard Helvetica font
//!
//! Replacement text is drawn with the base-14 `Helvetica` font so no font
//! program needs to be embedded. Layout uses the Helvetica AFM advance widths
//! and WinAnsi encoding.

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::font::helvetica_width;
use crate::geometry::UserBox;

/// Resource name under which the font is registered on edited pages.
pub const FONT_RESOURCE_NAME: &str = "PdfEditHelv";

/// Base font used for inserted text.
pub const BASE_FONT: &str = "Helvetica";

/// Ascender from the Helvetica AFM, in em units.
pub const ASCENT: f64 = 0.718;

/// Descender depth from the Helvetica AFM, in em units.
pub const DESCENT: f64 = 0.207;

/// Baseline-to-baseline distance as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f64 = 1.2;

/// Fill colour and size for inserted text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBoxStyle {
    pub font_size: f64,
    /// RGB components in the 0-1 range.
    pub color: [f64; 3],
}

impl TextBoxStyle {
    pub fn black(font_size: f64) -> Self {
        Self {
            font_size,
            color: [0.0, 0.0, 0.0],
        }
    }
}

/// How much of the text made it into the box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextBoxOutcome {
    pub lines_written: usize,
    pub lines_overflowed: usize,
}

/// Map a character to its WinAnsiEncoding code.
pub fn win_ansi_code(c: char) -> Option<u8> {
    let code = match c {
        ' '..='~' => c as u8,
        '\u{a0}'..='\u{ff}' => c as u32 as u8,
        '\t' => b' ',
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201c}' => 0x93,
        '\u{201d}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// Encode text for a WinAnsi simple font. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| win_ansi_code(c).unwrap_or(b'?'))
        .collect()
}

/// Rendered width of `text` in points.
pub fn text_width(text: &str, font_size: f64) -> f64 {
    text.chars().map(|c| char_width(c, font_size)).sum()
}

fn char_width(c: char, font_size: f64) -> f64 {
    let code = win_ansi_code(c).unwrap_or(b'?');
    helvetica_width(code) as f64 / 1000.0 * font_size
}

/// Greedy word wrap.
///
/// Explicit newlines always break. Words wider than `max_width` are split
/// by character, keeping at least one character per line. Runs in time
/// linear in the length of `text`.
pub fn wrap_lines(text: &str, max_width: f64, font_size: f64) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let space = char_width(' ', font_size);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let mut current = String::new();
        let mut current_width = 0.0;

        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, font_size);
            if current.is_empty() {
                if word_width <= max_width {
                    current.push_str(word);
                    current_width = word_width;
                    continue;
                }
            } else if current_width + space + word_width <= max_width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
                continue;
            } else {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }

            if word_width <= max_width {
                current.push_str(word);
                current_width = word_width;
            } else {
                let mut pieces = split_word(word, max_width, font_size);
                if let Some((last, last_width)) = pieces.pop() {
                    current = last;
                    current_width = last_width;
                }
                lines.extend(pieces.into_iter().map(|(piece, _)| piece));
            }
        }

        lines.push(current);
    }

    lines
}

/// Break a word into pieces no wider than `max_width`, each carrying its width.
fn split_word(word: &str, max_width: f64, font_size: f64) -> Vec<(String, f64)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for c in word.chars() {
        let width = char_width(c, font_size);
        if !current.is_empty() && current_width + width > max_width {
            pieces.push((std::mem::take(&mut current), current_width));
            current_width = 0.0;
        }
        current.push(c);
        current_width += width;
    }

    if !current.is_empty() {
        pieces.push((current, current_width));
    }
    pieces
}

/// Lines laid out inside a box, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBoxLayout {
    /// `(baseline_y, line)` pairs in user space.
    pub placed: Vec<(f64, String)>,
    pub overflowed: usize,
}

/// Place wrapped lines in `area`, dropping lines that fall below its bottom.
///
/// The first line is placed whenever the box has positive area, even if its
/// descent reaches past the bottom edge.
pub fn layout(text: &str, area: &UserBox, font_size: f64) -> TextBoxLayout {
    if area.is_empty() {
        return TextBoxLayout {
            placed: Vec::new(),
            overflowed: wrap_lines(text, f64::INFINITY, font_size).len(),
        };
    }

    let lines = wrap_lines(text, area.width(), font_size);
    let first_baseline = area.ury - ASCENT * font_size;
    let line_height = LINE_HEIGHT_FACTOR * font_size;

    let mut placed = Vec::new();
    let mut overflowed = 0;
    for (i, line) in lines.into_iter().enumerate() {
        let baseline = first_baseline - i as f64 * line_height;
        if i == 0 || baseline - DESCENT * font_size >= area.lly {
            placed.push((baseline, line));
        } else {
            overflowed += 1;
        }
    }

    TextBoxLayout { placed, overflowed }
}

/// Content-stream operations drawing a laid-out text box.
pub fn textbox_operations(
    layout: &TextBoxLayout,
    left: f64,
    style: &TextBoxStyle,
) -> Vec<Operation> {
    let [r, g, b] = style.color;
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![real(r), real(g), real(b)]),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE_NAME.as_bytes().to_vec()),
                real(style.font_size),
            ],
        ),
        Operation::new("Tr", vec![Object::Integer(0)]),
    ];

    for (baseline, line) in &layout.placed {
        ops.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                real(left),
                real(*baseline),
            ],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(line), StringFormat::Literal)],
        ));
    }

    ops.push(Operation::new("ET", vec![]));
    ops.push(Operation::new("Q", vec![]));
    ops
}

pub(crate) fn real(value: f64) -> Object {
    Object::Real(value as f32)
}
