//! Editable PDF document handle
//!
//! [`EditableDocument`] is the narrow capability the edit pipeline needs from
//! a PDF engine. [`LopdfDocument`] implements it over an in-memory
//! `lopdf::Document`.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::PdfEditError;
use crate::font::FontMetrics;
use crate::geometry::{Region, UserBox};
use crate::redact::{self, number, PageResources};
use crate::textbox::{self, real, TextBoxOutcome, TextBoxStyle};

/// RGB fill, components in the 0-1 range.
pub type Rgb = [f64; 3];

/// Depth limit when walking the page tree for inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Capability required to apply region edits to a document.
///
/// Page indices are zero-based. Callers are expected to range-check against
/// [`EditableDocument::page_count`]; implementations still return
/// [`PdfEditError::PageOutOfRange`] rather than panicking.
pub trait EditableDocument {
    fn page_count(&self) -> usize;

    /// Mark `region` on a page for redaction. Nothing is removed until
    /// [`EditableDocument::apply_redactions`] is called.
    fn add_redaction(
        &mut self,
        page_index: usize,
        region: &Region,
        fill: Rgb,
    ) -> Result<(), PdfEditError>;

    /// Commit every pending redaction on a page. Returns how many were applied.
    fn apply_redactions(&mut self, page_index: usize) -> Result<usize, PdfEditError>;

    /// Drop redactions added on a page that were never committed. Returns
    /// how many were removed.
    fn discard_redactions(&mut self, page_index: usize) -> Result<usize, PdfEditError>;

    /// Draw `text` wrapped inside `region`.
    fn insert_textbox(
        &mut self,
        page_index: usize,
        region: &Region,
        text: &str,
        style: &TextBoxStyle,
    ) -> Result<TextBoxOutcome, PdfEditError>;

    /// Serialize the whole document.
    fn save(&mut self) -> Result<Vec<u8>, PdfEditError>;
}

/// In-memory PDF backed by lopdf.
pub struct LopdfDocument {
    doc: Document,
    page_ids: Vec<ObjectId>,
    font_id: Option<ObjectId>,
    /// `/Redact` annotations added per page and not yet committed.
    uncommitted: HashMap<ObjectId, Vec<ObjectId>>,
    modified: bool,
}

impl LopdfDocument {
    pub fn open(bytes: &[u8]) -> Result<Self, PdfEditError> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfEditError::ParseError(e.to_string()))?;
        let page_ids = doc.get_pages().into_values().collect();
        Ok(Self {
            doc,
            page_ids,
            font_id: None,
            uncommitted: HashMap::new(),
            modified: false,
        })
    }

    /// True once any page has been changed.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Release the document. Equivalent to dropping it.
    pub fn close(self) {}

    pub fn page_id(&self, page_index: usize) -> Result<ObjectId, PdfEditError> {
        self.page_ids
            .get(page_index)
            .copied()
            .ok_or(PdfEditError::PageOutOfRange {
                index: page_index,
                count: self.page_ids.len(),
            })
    }

    /// Effective MediaBox, falling back to US Letter.
    pub fn media_box(&self, page_id: ObjectId) -> UserBox {
        self.inherited_attribute(page_id, b"MediaBox")
            .and_then(|obj| match obj {
                Object::Array(values) if values.len() == 4 => {
                    let v: Vec<f64> = values.iter().filter_map(number).collect();
                    (v.len() == 4).then(|| {
                        UserBox {
                            llx: v[0],
                            lly: v[1],
                            urx: v[2],
                            ury: v[3],
                        }
                        .normalized()
                    })
                }
                _ => None,
            })
            .unwrap_or(UserBox::LETTER)
    }

    /// Look up a page attribute, walking up `/Parent` links and resolving
    /// indirect references.
    fn inherited_attribute(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = page_id;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            let dict = self.doc.get_dictionary(node).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value).clone());
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => node = *parent,
                _ => return None,
            }
        }
        None
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            other => other,
        }
    }

    /// Fonts and image XObjects reachable from the page's resources.
    pub fn page_resources(&self, page_id: ObjectId) -> PageResources {
        let mut resources = PageResources::default();
        let Some(Object::Dictionary(dict)) = self.inherited_attribute(page_id, b"Resources")
        else {
            return resources;
        };

        if let Some(fonts) = self.sub_dictionary(&dict, b"Font") {
            for (name, font) in fonts.iter() {
                if let Object::Dictionary(font) = self.resolve(font) {
                    resources
                        .fonts
                        .insert(name.clone(), FontMetrics::from_font_dict(&self.doc, font));
                }
            }
        }

        if let Some(xobjects) = self.sub_dictionary(&dict, b"XObject") {
            for (name, xobject) in xobjects.iter() {
                if let Object::Stream(stream) = self.resolve(xobject) {
                    if matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
                    {
                        resources.images.insert(name.clone());
                    }
                }
            }
        }
        resources
    }

    fn sub_dictionary<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match dict.get(key).map(|obj| self.resolve(obj)) {
            Ok(Object::Dictionary(sub)) => Some(sub),
            _ => None,
        }
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfEditError> {
        Ok(self.doc.get_object_mut(page_id)?.as_dict_mut()?)
    }

    /// Annotation entries of a page, with the array resolved if indirect.
    fn page_annotations(&self, page_id: ObjectId) -> Result<Vec<Object>, PdfEditError> {
        let page = self.doc.get_dictionary(page_id)?;
        Ok(match page.get(b"Annots") {
            Ok(annots) => match self.resolve(annots) {
                Object::Array(items) => items.clone(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        })
    }

    fn add_annotation_to_page(
        &mut self,
        page_id: ObjectId,
        annot_id: ObjectId,
    ) -> Result<(), PdfEditError> {
        let mut annots = self.page_annotations(page_id)?;
        annots.push(Object::Reference(annot_id));
        self.page_dict_mut(page_id)?
            .set("Annots", Object::Array(annots));
        Ok(())
    }

    /// Register the Helvetica font in the page's own resource dictionary.
    ///
    /// Inherited or shared resources are copied onto the page first, so other
    /// pages never see the change.
    fn ensure_font_resource(&mut self, page_id: ObjectId) -> Result<(), PdfEditError> {
        let font_id = match self.font_id {
            Some(id) => id,
            None => {
                let id = self.doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => textbox::BASE_FONT,
                    "Encoding" => "WinAnsiEncoding",
                });
                self.font_id = Some(id);
                id
            }
        };

        let mut resources = match self.inherited_attribute(page_id, b"Resources") {
            Some(Object::Dictionary(dict)) => dict,
            _ => Dictionary::new(),
        };
        let mut fonts = match resources.get(b"Font") {
            Ok(fonts) => match self.resolve(fonts) {
                Object::Dictionary(dict) => dict.clone(),
                _ => Dictionary::new(),
            },
            Err(_) => Dictionary::new(),
        };

        if let Ok(Object::Reference(existing)) = fonts.get(textbox::FONT_RESOURCE_NAME.as_bytes())
        {
            if *existing == font_id {
                return Ok(());
            }
        }

        fonts.set(textbox::FONT_RESOURCE_NAME, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));
        self.page_dict_mut(page_id)?
            .set("Resources", Object::Dictionary(resources));
        Ok(())
    }

    /// Point the page at a single fresh content stream.
    fn replace_page_content(
        &mut self,
        page_id: ObjectId,
        content: Vec<u8>,
    ) -> Result<(), PdfEditError> {
        let stream_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content));
        self.page_dict_mut(page_id)?
            .set("Contents", Object::Reference(stream_id));
        self.modified = true;
        Ok(())
    }

    /// Append operations after the existing content. The existing content is
    /// wrapped in `q … Q` only if it leaks graphics state, so repeated edits
    /// do not nest.
    fn append_page_operations(
        &mut self,
        page_id: ObjectId,
        operations: Vec<Operation>,
    ) -> Result<(), PdfEditError> {
        let existing = self.doc.get_page_content(page_id)?;

        let content = match Content::decode(&existing) {
            Ok(decoded) => {
                let mut combined = redact::isolate(decoded.operations);
                combined.extend(operations);
                encode(combined)?
            }
            Err(e) => {
                tracing::debug!("Page content did not decode ({}), wrapping raw bytes", e);
                let appended = encode(operations)?;
                let mut content = Vec::with_capacity(existing.len() + appended.len() + 8);
                content.extend_from_slice(b"q\n");
                content.extend_from_slice(&existing);
                content.extend_from_slice(b"\nQ\n");
                content.extend_from_slice(&appended);
                content
            }
        };

        self.replace_page_content(page_id, content)
    }

    /// Remove annotation `ids` from a page's `/Annots` and from the document.
    fn remove_annotations(
        &mut self,
        page_id: ObjectId,
        ids: &[ObjectId],
    ) -> Result<(), PdfEditError> {
        let remaining: Vec<Object> = self
            .page_annotations(page_id)?
            .into_iter()
            .filter(|entry| !matches!(entry, Object::Reference(id) if ids.contains(id)))
            .collect();

        let page = self.page_dict_mut(page_id)?;
        if remaining.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(remaining));
        }
        for id in ids {
            self.doc.objects.remove(id);
        }
        Ok(())
    }
}

/// A `/Redact` annotation collected from a page.
struct PendingRedaction {
    area: UserBox,
    fill: Rgb,
}

fn parse_redaction(dict: &Dictionary) -> Option<PendingRedaction> {
    match dict.get(b"Subtype") {
        Ok(Object::Name(name)) if name == b"Redact" => {}
        _ => return None,
    }
    let rect: Vec<f64> = match dict.get(b"Rect") {
        Ok(Object::Array(values)) => values.iter().filter_map(number).collect(),
        _ => return None,
    };
    if rect.len() != 4 {
        return None;
    }
    let fill = match dict.get(b"IC") {
        Ok(Object::Array(values)) => {
            let c: Vec<f64> = values.iter().filter_map(number).collect();
            if c.len() == 3 {
                [c[0], c[1], c[2]]
            } else {
                [1.0, 1.0, 1.0]
            }
        }
        _ => [1.0, 1.0, 1.0],
    };
    Some(PendingRedaction {
        area: UserBox {
            llx: rect[0],
            lly: rect[1],
            urx: rect[2],
            ury: rect[3],
        },
        fill,
    })
}

fn encode(operations: Vec<Operation>) -> Result<Vec<u8>, PdfEditError> {
    Content { operations }
        .encode()
        .map_err(|e| PdfEditError::SerializationError(e.to_string()))
}

fn fill_operations(redactions: &[PendingRedaction]) -> Vec<Operation> {
    let mut ops = Vec::new();
    for redaction in redactions {
        let area = redaction.area;
        if area.is_empty() {
            continue;
        }
        let [r, g, b] = redaction.fill;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("rg", vec![real(r), real(g), real(b)]));
        ops.push(Operation::new(
            "re",
            vec![
                real(area.llx),
                real(area.lly),
                real(area.width()),
                real(area.height()),
            ],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }
    ops
}

impl EditableDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn add_redaction(
        &mut self,
        page_index: usize,
        region: &Region,
        fill: Rgb,
    ) -> Result<(), PdfEditError> {
        let page_id = self.page_id(page_index)?;
        let area = region.to_user_space(&self.media_box(page_id));

        let [r, g, b] = fill;
        let annot_id = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Redact",
            "Rect" => vec![real(area.llx), real(area.lly), real(area.urx), real(area.ury)],
            "IC" => vec![real(r), real(g), real(b)],
            "P" => Object::Reference(page_id),
        });
        self.add_annotation_to_page(page_id, annot_id)?;
        self.uncommitted.entry(page_id).or_default().push(annot_id);
        Ok(())
    }

    fn apply_redactions(&mut self, page_index: usize) -> Result<usize, PdfEditError> {
        let page_id = self.page_id(page_index)?;

        let mut pending = Vec::new();
        let mut redact_ids = Vec::new();
        for entry in self.page_annotations(page_id)? {
            let redaction = match self.resolve(&entry) {
                Object::Dictionary(dict) => parse_redaction(dict),
                _ => None,
            };
            if let Some(redaction) = redaction {
                pending.push(redaction);
                if let Object::Reference(id) = entry {
                    redact_ids.push(id);
                }
            }
        }

        if pending.is_empty() {
            return Ok(0);
        }

        let regions: Vec<UserBox> = pending.iter().map(|p| p.area).collect();
        let resources = self.page_resources(page_id);
        let content = Content::decode(&self.doc.get_page_content(page_id)?).map_err(|e| {
            PdfEditError::OperationError(format!("Failed to decode page content: {}", e))
        })?;
        let stripped = redact::strip_content(content.operations, &regions, &resources);
        tracing::debug!(
            "Page {}: {} redaction(s) removed {} glyph(s), image(s) or path(s)",
            page_index,
            pending.len(),
            stripped.removed
        );

        let mut operations = redact::isolate(stripped.operations);
        operations.extend(fill_operations(&pending));

        self.replace_page_content(page_id, encode(operations)?)?;
        self.remove_annotations(page_id, &redact_ids)?;
        self.uncommitted.remove(&page_id);

        Ok(pending.len())
    }

    fn discard_redactions(&mut self, page_index: usize) -> Result<usize, PdfEditError> {
        let page_id = self.page_id(page_index)?;
        let Some(ids) = self.uncommitted.remove(&page_id) else {
            return Ok(0);
        };
        self.remove_annotations(page_id, &ids)?;
        Ok(ids.len())
    }

    fn insert_textbox(
        &mut self,
        page_index: usize,
        region: &Region,
        text: &str,
        style: &TextBoxStyle,
    ) -> Result<TextBoxOutcome, PdfEditError> {
        let page_id = self.page_id(page_index)?;
        let area = region.to_user_space(&self.media_box(page_id));
        let layout = textbox::layout(text, &area, style.font_size);

        let outcome = TextBoxOutcome {
            lines_written: layout.placed.len(),
            lines_overflowed: layout.overflowed,
        };
        if layout.placed.is_empty() {
            return Ok(outcome);
        }

        self.ensure_font_resource(page_id)?;
        let operations = textbox::textbox_operations(&layout, area.llx, style);
        self.append_page_operations(page_id, operations)?;
        Ok(outcome)
    }

    fn save(&mut self) -> Result<Vec<u8>, PdfEditError> {
        // Superseded content streams still hold the original text.
        self.doc.prune_objects();
        self.doc.compress();

        let mut output = Vec::new();
        self.doc
            .save_to(&mut output)
            .map_err(|e| PdfEditError::SerializationError(e.to_string()))?;
        Ok(output)
    }
}
