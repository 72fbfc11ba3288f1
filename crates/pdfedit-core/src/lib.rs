//! Region-based PDF text replacement
//!
//! Takes a PDF and an ordered list of edit instructions. Each instruction
//! redacts a rectangle on a page and writes new text into the same
//! rectangle. Instructions that fail to parse or apply are skipped
//! individually; only a malformed edit list or unreadable PDF fails the
//! whole call.
//!
//! - [`instruction`]: `EditInstruction` and best-effort parsing of the edit list
//! - [`document`]: the `EditableDocument` capability and its lopdf implementation
//! - [`applicator`]: applies instructions and reports what was skipped

pub mod applicator;
pub mod document;
pub mod error;
pub mod font;
pub mod geometry;
pub mod instruction;
pub mod redact;
pub mod textbox;

pub use applicator::{AppliedEdit, ApplyReport, EditApplicator, SkipReason, SkippedEdit};
pub use document::{EditableDocument, LopdfDocument};
pub use error::PdfEditError;
pub use geometry::Region;
pub use instruction::{parse_edits, EditInstruction, ParsedEdits, PdfRect, DEFAULT_FONT_SIZE};
pub use textbox::{TextBoxOutcome, TextBoxStyle};

/// Result of [`edit_pdf`].
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    /// Indices refer to positions in the raw edit list.
    pub report: ApplyReport,
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize, PdfEditError> {
    Ok(LopdfDocument::open(bytes)?.page_count())
}

/// Apply a JSON edit list to a PDF.
///
/// When no instruction changed the document the input bytes are returned
/// untouched.
pub fn edit_pdf(pdf_bytes: &[u8], edits_json: &str) -> Result<EditOutcome, PdfEditError> {
    let parsed = parse_edits(edits_json)?;
    let mut document = LopdfDocument::open(pdf_bytes)?;

    let mut report = EditApplicator::new().apply(&mut document, &parsed.instructions);
    report.reindex(&parsed.positions);
    report.merge_skipped(parsed.skipped);

    let page_count = document.page_count();
    let pdf = if document.is_modified() {
        document.save()?
    } else {
        pdf_bytes.to_vec()
    };
    document.close();

    Ok(EditOutcome {
        pdf,
        page_count,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::create_test_pdf;

    #[test]
    fn test_get_page_count() {
        assert_eq!(get_page_count(&create_test_pdf(&["a", "b", "c"])).unwrap(), 3);
    }

    #[test]
    fn test_get_page_count_rejects_garbage() {
        assert!(matches!(
            get_page_count(b"%PDF-garbage"),
            Err(PdfEditError::ParseError(_))
        ));
    }

    #[test]
    fn test_edit_pdf_reports_raw_indices() {
        let pdf = create_test_pdf(&["one"]);
        let edits = r#"[
            {"pageIndex":0,"rect":{"x":0,"y":0,"width":1,"height":1}},
            {"pageIndex":0,"rect":{"x":90,"y":80,"width":200,"height":20},"newText":"New"},
            {"pageIndex":4,"rect":{"x":0,"y":0,"width":1,"height":1},"newText":"x"}
        ]"#;
        let outcome = edit_pdf(&pdf, edits).unwrap();

        let applied: Vec<usize> = outcome.report.applied.iter().map(|a| a.index).collect();
        let skipped: Vec<usize> = outcome.report.skipped.iter().map(|s| s.index).collect();
        assert_eq!(applied, vec![1]);
        assert_eq!(skipped, vec![0, 2]);
        assert_eq!(outcome.page_count, 1);
    }

    #[test]
    fn test_edit_pdf_checks_edits_before_pdf() {
        let err = edit_pdf(b"garbage", "not json").unwrap_err();
        assert!(matches!(err, PdfEditError::InvalidEdits(_)));
    }
}
