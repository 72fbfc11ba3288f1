//! Content-stream redaction
//!
//! Walks a decoded page content stream, tracking the graphics and text state
//! needed to know where each glyph, image and path paints. Content under a
//! redaction region is removed:
//!
//! - text is split per glyph; covered glyphs are replaced by a `TJ` kern of
//!   the same advance, so the rest of the run stays in place
//! - image XObjects (`Do`) and inline images placed inside a region are dropped
//! - filled or stroked paths whose bounds lie inside a region are dropped
//!
//! Glyph advances come from [`FontMetrics`]. Glyph height uses fixed
//! ascent/descent estimates because font programs are not consulted.

use std::collections::{HashMap, HashSet};

use lopdf::content::Operation;
use lopdf::{Object, StringFormat};

use crate::font::FontMetrics;
use crate::geometry::UserBox;
use crate::textbox::real;

/// Extent above the baseline assumed for existing text, in em units.
const GLYPH_ASCENT: f64 = 0.85;

/// Extent below the baseline assumed for existing text, in em units.
const GLYPH_DESCENT: f64 = 0.25;

/// Affine transform `[a b c d e f]` using the PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Matrix {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn from_operands(operands: &[Object]) -> Option<Matrix> {
        if operands.len() != 6 {
            return None;
        }
        let v: Vec<f64> = operands.iter().filter_map(number).collect();
        if v.len() != 6 {
            return None;
        }
        Some(Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// Bounds of the unit square under this transform, where images paint.
    fn unit_square(&self) -> Option<UserBox> {
        UserBox::bounding(&[
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ])
    }
}

/// What the walker needs to know about a page's resources.
#[derive(Debug, Clone, Default)]
pub struct PageResources {
    /// Font resource name -> metrics.
    pub fonts: HashMap<Vec<u8>, FontMetrics>,
    /// Resource names of image XObjects.
    pub images: HashSet<Vec<u8>>,
}

/// State saved and restored by `q` / `Q`.
#[derive(Debug, Clone, Copy)]
struct GraphicsState<'a> {
    ctm: Matrix,
    font: Option<&'a FontMetrics>,
    font_size: f64,
    leading: f64,
    horizontal_scale: f64,
    char_spacing: f64,
    word_spacing: f64,
    rise: f64,
}

impl Default for GraphicsState<'_> {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font: None,
            font_size: 0.0,
            leading: 0.0,
            horizontal_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            rise: 0.0,
        }
    }
}

/// Result of filtering a content stream.
#[derive(Debug, Clone, Default)]
pub struct StrippedContent {
    pub operations: Vec<Operation>,
    /// Glyphs, images and paths removed.
    pub removed: usize,
}

/// A `TJ` array rebuilt glyph by glyph.
struct RunBuilder {
    elements: Vec<Object>,
    kept: Vec<u8>,
    format: StringFormat,
    /// Pending `TJ` adjustment, in thousandths of text space.
    kern: f64,
    removed: usize,
}

impl RunBuilder {
    fn new() -> Self {
        Self {
            elements: Vec::new(),
            kept: Vec::new(),
            format: StringFormat::Literal,
            kern: 0.0,
            removed: 0,
        }
    }

    fn keep(&mut self, bytes: &[u8], format: StringFormat) {
        if self.kern != 0.0 {
            self.flush_string();
            self.elements.push(real(self.kern));
            self.kern = 0.0;
        }
        self.format = format;
        self.kept.extend_from_slice(bytes);
    }

    fn adjust(&mut self, units: f64) {
        self.flush_string();
        self.kern += units;
    }

    fn remove(&mut self, units: f64) {
        self.removed += 1;
        self.adjust(units);
    }

    fn flush_string(&mut self) {
        if !self.kept.is_empty() {
            let format = std::mem::replace(&mut self.format, StringFormat::Literal);
            self.elements
                .push(Object::String(std::mem::take(&mut self.kept), format));
        }
    }

    fn finish(mut self) -> Vec<Object> {
        self.flush_string();
        if self.kern != 0.0 {
            self.elements.push(real(self.kern));
        }
        self.elements
    }
}

struct Stripper<'a> {
    regions: &'a [UserBox],
    resources: &'a PageResources,
    estimated: FontMetrics,
    state: GraphicsState<'a>,
    stack: Vec<GraphicsState<'a>>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    path: Vec<Operation>,
    path_points: Vec<(f64, f64)>,
    path_clips: bool,
    inline_image: Option<Vec<Operation>>,
    output: Vec<Operation>,
    removed: usize,
}

/// Remove content that paints inside any of `regions`.
///
/// Regions with no positive area are ignored. Text in fonts missing from
/// `resources` is measured with [`FontMetrics::estimated`].
pub fn strip_content(
    operations: Vec<Operation>,
    regions: &[UserBox],
    resources: &PageResources,
) -> StrippedContent {
    let regions: Vec<UserBox> = regions
        .iter()
        .filter(|r| !r.is_empty())
        .copied()
        .collect();

    if regions.is_empty() {
        return StrippedContent {
            operations,
            removed: 0,
        };
    }

    let mut stripper = Stripper {
        regions: &regions,
        resources,
        estimated: FontMetrics::estimated(),
        state: GraphicsState::default(),
        stack: Vec::new(),
        text_matrix: Matrix::IDENTITY,
        line_matrix: Matrix::IDENTITY,
        path: Vec::new(),
        path_points: Vec::new(),
        path_clips: false,
        inline_image: None,
        output: Vec::with_capacity(operations.len()),
        removed: 0,
    };

    for op in operations {
        stripper.visit(op);
    }
    stripper.flush_path();
    if let Some(unterminated) = stripper.inline_image.take() {
        stripper.output.extend(unterminated);
    }

    StrippedContent {
        operations: stripper.output,
        removed: stripper.removed,
    }
}

impl<'a> Stripper<'a> {
    fn visit(&mut self, op: Operation) {
        if let Some(image) = self.inline_image.as_mut() {
            let ends = op.operator == "EI";
            image.push(op);
            if ends {
                self.finish_inline_image();
            }
            return;
        }

        match op.operator.as_str() {
            "m" | "l" | "c" | "v" | "y" | "re" | "h" => {
                self.extend_path(&op);
                self.path.push(op);
                return;
            }
            "W" | "W*" if !self.path.is_empty() => {
                self.path_clips = true;
                self.path.push(op);
                return;
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n"
                if !self.path.is_empty() =>
            {
                self.paint_path(op);
                return;
            }
            _ => self.flush_path(),
        }

        match op.operator.as_str() {
            "q" => self.stack.push(self.state),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                self.state.font = match op.operands.first() {
                    Some(Object::Name(name)) => self.resources.fonts.get(name),
                    _ => None,
                };
                if let Some(size) = op.operands.get(1).and_then(number) {
                    self.state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(number) {
                    self.state.leading = leading;
                }
            }
            "Tz" => {
                if let Some(scale) = op.operands.first().and_then(number) {
                    self.state.horizontal_scale = scale / 100.0;
                }
            }
            "Tc" => {
                if let Some(spacing) = op.operands.first().and_then(number) {
                    self.state.char_spacing = spacing;
                }
            }
            "Tw" => {
                if let Some(spacing) = op.operands.first().and_then(number) {
                    self.state.word_spacing = spacing;
                }
            }
            "Ts" => {
                if let Some(rise) = op.operands.first().and_then(number) {
                    self.state.rise = rise;
                }
            }
            "Td" | "TD" => {
                let tx = op.operands.first().and_then(number).unwrap_or(0.0);
                let ty = op.operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    self.state.leading = -ty;
                }
                self.move_line(tx, ty);
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(run) = op
                    .operands
                    .first()
                    .and_then(|s| self.show(std::slice::from_ref(s)))
                {
                    self.emit_run(run);
                    return;
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    if let Some(run) = self.show(items) {
                        self.emit_run(run);
                        return;
                    }
                }
            }
            "'" => {
                self.next_line();
                if let Some(run) = op
                    .operands
                    .first()
                    .and_then(|s| self.show(std::slice::from_ref(s)))
                {
                    self.output.push(Operation::new("T*", vec![]));
                    self.emit_run(run);
                    return;
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line();
                if let Some(run) = op
                    .operands
                    .get(2)
                    .and_then(|s| self.show(std::slice::from_ref(s)))
                {
                    self.output
                        .push(Operation::new("Tw", vec![op.operands[0].clone()]));
                    self.output
                        .push(Operation::new("Tc", vec![op.operands[1].clone()]));
                    self.output.push(Operation::new("T*", vec![]));
                    self.emit_run(run);
                    return;
                }
            }
            "Do" => {
                let is_image = matches!(
                    op.operands.first(),
                    Some(Object::Name(name)) if self.resources.images.contains(name)
                );
                if is_image && self.covers(self.state.ctm.unit_square()) {
                    self.removed += 1;
                    return;
                }
            }
            "BI" => {
                self.inline_image = Some(vec![op]);
                return;
            }
            _ => {}
        }

        self.output.push(op);
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.leading;
        self.move_line(0.0, -leading);
    }

    /// True when `area` lies entirely inside one region.
    fn covers(&self, area: Option<UserBox>) -> bool {
        area.map(|a| self.regions.iter().any(|r| r.contains(&a)))
            .unwrap_or(false)
    }

    /// True when the glyph spanning `x0..x1` in text space overlaps a region.
    fn glyph_hits(&self, x0: f64, x1: f64) -> bool {
        let size = self.state.font_size;
        let rise = self.state.rise;
        let to_device = self.text_matrix.then(&self.state.ctm);
        let corners = [
            to_device.apply(x0, rise - GLYPH_DESCENT * size),
            to_device.apply(x1, rise - GLYPH_DESCENT * size),
            to_device.apply(x0, rise + GLYPH_ASCENT * size),
            to_device.apply(x1, rise + GLYPH_ASCENT * size),
        ];
        UserBox::bounding(&corners)
            .map(|glyph| self.regions.iter().any(|r| r.intersects(&glyph)))
            .unwrap_or(false)
    }

    /// Walk the strings and adjustments of a show operation, advancing the
    /// text matrix. Returns the rebuilt `TJ` array when any glyph was covered.
    fn show(&mut self, items: &[Object]) -> Option<Vec<Object>> {
        let metrics = self.state.font.unwrap_or(&self.estimated);
        let size = self.state.font_size;
        let scale = self.state.horizontal_scale;
        let mut run = RunBuilder::new();
        let mut x = 0.0;

        for item in items {
            match item {
                Object::String(bytes, format) => {
                    for (code, range) in metrics.codes(bytes) {
                        let glyph = metrics.width(code) / 1000.0 * size;
                        let mut advance = glyph + self.state.char_spacing;
                        if metrics.code_len == 1 && code == 32 {
                            advance += self.state.word_spacing;
                        }

                        if size != 0.0 && self.glyph_hits(x, x + glyph * scale) {
                            run.remove(-advance * 1000.0 / size);
                        } else {
                            run.keep(&bytes[range], *format);
                        }
                        x += advance * scale;
                    }
                }
                other => {
                    if let Some(adjustment) = number(other) {
                        run.adjust(adjustment);
                        x -= adjustment / 1000.0 * size * scale;
                    }
                }
            }
        }

        self.text_matrix = Matrix::translate(x, 0.0).then(&self.text_matrix);

        if run.removed == 0 {
            return None;
        }
        self.removed += run.removed;
        Some(run.finish())
    }

    fn emit_run(&mut self, elements: Vec<Object>) {
        if !elements.is_empty() {
            self.output
                .push(Operation::new("TJ", vec![Object::Array(elements)]));
        }
    }

    fn extend_path(&mut self, op: &Operation) {
        let v: Vec<f64> = op.operands.iter().filter_map(number).collect();
        let ctm = self.state.ctm;
        match (op.operator.as_str(), v.as_slice()) {
            ("re", [x, y, w, h]) => {
                for (px, py) in [(*x, *y), (x + w, *y), (*x, y + h), (x + w, y + h)] {
                    self.path_points.push(ctm.apply(px, py));
                }
            }
            (_, coords) => {
                for pair in coords.chunks_exact(2) {
                    self.path_points.push(ctm.apply(pair[0], pair[1]));
                }
            }
        }
    }

    fn paint_path(&mut self, paint: Operation) {
        let covered = !self.path_clips && self.covers(UserBox::bounding(&self.path_points));
        if covered {
            self.removed += 1;
            self.path.clear();
        } else {
            self.output.append(&mut self.path);
            self.output.push(paint);
        }
        self.path_points.clear();
        self.path_clips = false;
    }

    /// Emit path construction that was never painted.
    fn flush_path(&mut self) {
        self.output.append(&mut self.path);
        self.path_points.clear();
        self.path_clips = false;
    }

    fn finish_inline_image(&mut self) {
        let Some(image) = self.inline_image.take() else {
            return;
        };
        if self.covers(self.state.ctm.unit_square()) {
            self.removed += 1;
        } else {
            self.output.extend(image);
        }
    }
}

pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// True when every operation sits inside a balanced `q … Q` block, so
/// content appended afterwards starts from the default graphics state.
pub fn is_isolated(operations: &[Operation]) -> bool {
    let mut depth = 0usize;
    for op in operations {
        match op.operator.as_str() {
            "q" => depth += 1,
            "Q" => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ if depth == 0 => return false,
            _ => {}
        }
    }
    depth == 0
}

/// Wrap `operations` in `q … Q` unless they are already isolated.
pub fn isolate(operations: Vec<Operation>) -> Vec<Operation> {
    if is_isolated(&operations) {
        return operations;
    }
    let mut wrapped = Vec::with_capacity(operations.len() + 2);
    wrapped.push(Operation::new("q", vec![]));
    wrapped.extend(operations);
    wrapped.push(Operation::new("Q", vec![]));
    wrapped
}

/// Deepest `q` nesting reached by `operations`.
pub fn max_nesting(operations: &[Operation]) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    for op in operations {
        match op.operator.as_str() {
            "q" => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            "Q" => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}
