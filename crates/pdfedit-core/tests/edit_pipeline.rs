//! End-to-end tests for the edit pipeline
//!
//! Builds small PDFs in memory, runs `edit_pdf`, and inspects the decoded
//! page content of the result.

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
use pdfedit_core::{edit_pdf, get_page_count, PdfEditError, SkipReason};
use proptest::prelude::*;

/// Create a Letter-sized PDF; page `i` shows `labels[i]` at (20, 770)
fn create_labelled_pdf(labels: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Times-Roman".to_vec())),
    ]));
    let resources = Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![(
            "F1",
            Object::Reference(font_id),
        )])),
    )]);

    let mut page_ids = Vec::new();
    for label in labels {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(20), Object::Integer(770)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        label.as_bytes().to_vec(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("Td", vec![Object::Integer(0), Object::Integer(-400)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        b"Footer".to_vec(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources.clone())),
        ]);
        page_ids.push(doc.add_object(page));
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
        ("Count", Object::Integer(page_ids.len() as i64)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Decoded content of a 1-based page
fn page_content(pdf: &[u8], page_number: u32) -> String {
    let doc = Document::load_mem(pdf).unwrap();
    let page_id = doc.get_pages()[&page_number];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Rect over the label drawn at (20, 770), in top-left coordinates
const LABEL_RECT: &str = r#"{"x":10,"y":10,"width":100,"height":20}"#;

#[test]
fn test_replaces_text_in_region() {
    let pdf = create_labelled_pdf(&["Original"]);
    let edits = format!(
        r#"[{{"pageIndex":0,"rect":{},"newText":"Hello","fontSize":12}}]"#,
        LABEL_RECT
    );

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    assert_eq!(outcome.report.applied_count(), 1);
    assert_eq!(outcome.report.skipped_count(), 0);

    let content = page_content(&outcome.pdf, 1);
    assert!(!content.contains("Original"), "redacted text survived");
    assert!(content.contains("(Hello) Tj"));
    assert!(content.contains("Footer"), "text outside the region was removed");
    assert_eq!(get_page_count(&outcome.pdf).unwrap(), 1);
}

#[test]
fn test_out_of_range_page_returns_input_unchanged() {
    let pdf = create_labelled_pdf(&["One", "Two"]);
    let edits = format!(r#"[{{"pageIndex":5,"rect":{},"newText":"X"}}]"#, LABEL_RECT);

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    assert_eq!(outcome.pdf, pdf);
    assert_eq!(outcome.report.skipped_count(), 1);
    assert!(matches!(
        outcome.report.skipped[0].reason,
        SkipReason::PageOutOfRange {
            page_index: 5,
            page_count: 2
        }
    ));
}

#[test]
fn test_missing_new_text_returns_input_unchanged() {
    let pdf = create_labelled_pdf(&["Original"]);
    let edits = format!(r#"[{{"pageIndex":0,"rect":{}}}]"#, LABEL_RECT);

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    assert_eq!(outcome.pdf, pdf);
    assert_eq!(outcome.report.applied_count(), 0);
    assert!(matches!(
        outcome.report.skipped[0].reason,
        SkipReason::InvalidEntry { .. }
    ));
}

#[test]
fn test_truncated_edits_are_rejected() {
    let pdf = create_labelled_pdf(&["Original"]);
    let result = edit_pdf(&pdf, r#"[{"pageIndex":0,"rect":{"x":10,"#);
    assert!(matches!(result, Err(PdfEditError::InvalidEdits(_))));
}

#[test]
fn test_unreadable_pdf_is_rejected() {
    let result = edit_pdf(b"definitely not a pdf", "[]");
    assert!(matches!(result, Err(PdfEditError::ParseError(_))));
}

#[test]
fn test_bad_entries_do_not_block_good_ones() {
    let pdf = create_labelled_pdf(&["First", "Second"]);
    let edits = format!(
        r#"[
            {{"pageIndex":0,"newText":"no rect"}},
            {{"pageIndex":1,"rect":{rect},"newText":"Replaced"}},
            {{"pageIndex":9,"rect":{rect},"newText":"nowhere"}}
        ]"#,
        rect = LABEL_RECT
    );

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    assert_eq!(outcome.report.applied_count(), 1);
    assert_eq!(outcome.report.skipped_count(), 2);

    assert!(page_content(&outcome.pdf, 1).contains("First"));
    let second = page_content(&outcome.pdf, 2);
    assert!(!second.contains("Second"));
    assert!(second.contains("(Replaced) Tj"));
}

#[test]
fn test_later_edit_on_same_region_wins() {
    let pdf = create_labelled_pdf(&["Original"]);
    let edits = format!(
        r#"[
            {{"pageIndex":0,"rect":{rect},"newText":"Draft"}},
            {{"pageIndex":0,"rect":{rect},"newText":"Final"}}
        ]"#,
        rect = LABEL_RECT
    );

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    let content = page_content(&outcome.pdf, 1);
    assert!(!content.contains("Draft"));
    assert!(content.contains("(Final) Tj"));
}

#[test]
fn test_repeating_an_edit_is_not_idempotent() {
    let pdf = create_labelled_pdf(&["Original"]);
    let once = format!(
        r#"[{{"pageIndex":0,"rect":{},"newText":"Hello"}}]"#,
        LABEL_RECT
    );
    let twice = format!(
        r#"[
            {{"pageIndex":0,"rect":{rect},"newText":"Hello"}},
            {{"pageIndex":0,"rect":{rect},"newText":"Hello"}}
        ]"#,
        rect = LABEL_RECT
    );

    let first = edit_pdf(&pdf, &once).unwrap();
    let second = edit_pdf(&pdf, &twice).unwrap();
    assert_eq!(second.report.applied_count(), 2);
    assert_ne!(page_content(&first.pdf, 1), page_content(&second.pdf, 1));
    assert!(page_content(&second.pdf, 1).contains("(Hello) Tj"));
}

#[test]
fn test_wrapped_text_produces_multiple_lines() {
    let pdf = create_labelled_pdf(&["Original"]);
    let edits = r#"[{"pageIndex":0,"rect":{"x":10,"y":10,"width":60,"height":60},"newText":"one two three four","fontSize":10}]"#;

    let outcome = edit_pdf(&pdf, edits).unwrap();
    assert!(outcome.report.applied[0].lines_written > 1);
}

#[test]
fn test_region_over_one_word_keeps_the_rest_of_the_line() {
    // Times-Roman 12 at x=20: "John" spans 54.99..77.66
    let pdf = create_labelled_pdf(&["Name: John Smith"]);
    let edits = r#"[{"pageIndex":0,"rect":{"x":56,"y":10,"width":20,"height":20},"newText":"Jane","fontSize":10}]"#;

    let outcome = edit_pdf(&pdf, edits).unwrap();
    let content = page_content(&outcome.pdf, 1);
    assert!(content.contains("(Name: )"), "text before the region was removed");
    assert!(content.contains("( Smith)"), "text after the region was removed");
    assert!(!content.contains("John"));
    assert!(content.contains("(Jane) Tj"));
}

#[test]
fn test_text_after_removed_glyphs_keeps_its_position() {
    // Times-Roman "ii" advances 2 * 278 / 1000 em
    let pdf = create_labelled_pdf(&["iiNext"]);
    let edits = r#"[{"pageIndex":0,"rect":{"x":19,"y":10,"width":7,"height":20},"newText":"x","fontSize":4}]"#;

    let outcome = edit_pdf(&pdf, edits).unwrap();
    let content = page_content(&outcome.pdf, 1);
    let operations = Content::decode(content.as_bytes()).unwrap().operations;
    let shown: Vec<&Object> = operations
        .iter()
        .filter(|op| op.operator == "TJ")
        .flat_map(|op| match &op.operands[0] {
            Object::Array(items) => items.iter().collect::<Vec<_>>(),
            _ => Vec::new(),
        })
        .collect();

    let kern = match shown.first() {
        Some(Object::Real(value)) => *value as f64,
        Some(Object::Integer(value)) => *value as f64,
        other => panic!("expected a leading kern, got {:?}", other),
    };
    assert!((kern + 556.0).abs() < 0.01, "kern was {}", kern);
    assert!(matches!(
        shown.get(1),
        Some(Object::String(bytes, _)) if bytes == b"Next"
    ));
}

#[test]
fn test_many_edits_on_one_page_stay_within_nesting_limit() {
    let pdf = create_labelled_pdf(&["Original"]);
    let edits: Vec<String> = (0..20)
        .map(|i| {
            format!(
                r#"{{"pageIndex":0,"rect":{},"newText":"Revision {}"}}"#,
                LABEL_RECT, i
            )
        })
        .collect();
    let edits = format!("[{}]", edits.join(","));

    let outcome = edit_pdf(&pdf, &edits).unwrap();
    assert_eq!(outcome.report.applied_count(), 20);

    let content = page_content(&outcome.pdf, 1);
    let operations = Content::decode(content.as_bytes()).unwrap().operations;
    assert!(pdfedit_core::redact::max_nesting(&operations) <= 2);
    assert!(content.contains("(Revision 19) Tj"));
    assert!(!content.contains("Revision 18"));
    assert!(content.contains("Footer"));
}

fn raw_edit() -> impl Strategy<Value = String> {
    (
        -2i64..6,
        0.0f64..600.0,
        0.0f64..780.0,
        -20.0f64..300.0,
        -20.0f64..100.0,
        prop::option::of(1.0f64..40.0),
        "[a-zA-Z ]{0,40}",
    )
        .prop_map(|(page, x, y, w, h, size, text)| {
            let font = size
                .map(|s| format!(r#","fontSize":{}"#, s))
                .unwrap_or_default();
            format!(
                r#"{{"pageIndex":{},"rect":{{"x":{},"y":{},"width":{},"height":{}}},"newText":"{}"{}}}"#,
                page, x, y, w, h, text, font
            )
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Edits never add or remove pages
    #[test]
    fn page_count_is_preserved(
        pages in 1usize..4,
        edits in prop::collection::vec(raw_edit(), 0..6),
    ) {
        let labels: Vec<String> = (0..pages).map(|i| format!("Page {}", i)).collect();
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        let pdf = create_labelled_pdf(&label_refs);
        let json = format!("[{}]", edits.join(","));

        let outcome = edit_pdf(&pdf, &json).unwrap();
        prop_assert_eq!(outcome.page_count, pages);
        prop_assert_eq!(get_page_count(&outcome.pdf).unwrap(), pages);
        prop_assert_eq!(
            outcome.report.applied_count() + outcome.report.skipped_count(),
            edits.len()
        );
    }

    /// Arbitrary edit payloads never panic; they either parse or are rejected
    #[test]
    fn arbitrary_payloads_do_not_panic(payload in ".{0,64}") {
        let pdf = create_labelled_pdf(&["Page"]);
        match edit_pdf(&pdf, &payload) {
            Ok(outcome) => prop_assert_eq!(outcome.page_count, 1),
            Err(PdfEditError::InvalidEdits(_)) => {}
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
