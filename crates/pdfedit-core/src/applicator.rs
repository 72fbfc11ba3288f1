//! Apply edit instructions to a document
//!
//! Each instruction is processed into `Ok(applied)` or `Err(skipped)` and the
//! results are folded into an [`ApplyReport`]. A failing instruction never
//! stops the ones after it.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::{EditableDocument, Rgb};
use crate::error::PdfEditError;
use crate::instruction::EditInstruction;
use crate::textbox::{TextBoxOutcome, TextBoxStyle};

/// Why an instruction was not applied.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("invalid edit object: {message}")]
    InvalidEntry { message: String },

    #[error("page index {page_index} out of range (document has {page_count} pages)")]
    PageOutOfRange { page_index: i64, page_count: usize },

    #[error("document operation failed: {message}")]
    Document { message: String },
}

impl From<PdfEditError> for SkipReason {
    fn from(err: PdfEditError) -> Self {
        match err {
            PdfEditError::PageOutOfRange { index, count } => SkipReason::PageOutOfRange {
                page_index: index as i64,
                page_count: count,
            },
            other => SkipReason::Document {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEdit {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedEdit {
    pub index: usize,
    pub lines_written: usize,
    pub lines_overflowed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<AppliedEdit>,
    pub skipped: Vec<SkippedEdit>,
}

impl ApplyReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Rewrite instruction indices to positions in the raw edit list.
    pub fn reindex(&mut self, positions: &[usize]) {
        let lookup = |index: usize| positions.get(index).copied().unwrap_or(index);
        for applied in &mut self.applied {
            applied.index = lookup(applied.index);
        }
        for skipped in &mut self.skipped {
            skipped.index = lookup(skipped.index);
        }
    }

    /// Fold in entries rejected before application, keeping index order.
    pub fn merge_skipped(&mut self, skipped: Vec<SkippedEdit>) {
        self.skipped.extend(skipped);
        self.skipped.sort_by_key(|s| s.index);
    }
}

/// Applies instructions in order: redact the region, commit, then draw the
/// replacement text in the same region.
#[derive(Debug, Clone)]
pub struct EditApplicator {
    pub redaction_fill: Rgb,
    pub text_color: Rgb,
}

impl Default for EditApplicator {
    fn default() -> Self {
        Self {
            redaction_fill: [1.0, 1.0, 1.0],
            text_color: [0.0, 0.0, 0.0],
        }
    }
}

impl EditApplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply<D: EditableDocument>(
        &self,
        document: &mut D,
        instructions: &[EditInstruction],
    ) -> ApplyReport {
        instructions.iter().enumerate().fold(
            ApplyReport::default(),
            |mut report, (index, instruction)| {
                match self.apply_one(document, instruction) {
                    Ok(outcome) => {
                        debug!(
                            "Applied edit {} on page {} ({} line(s), {} overflowed)",
                            index,
                            instruction.page_index,
                            outcome.lines_written,
                            outcome.lines_overflowed
                        );
                        report.applied.push(AppliedEdit {
                            index,
                            lines_written: outcome.lines_written,
                            lines_overflowed: outcome.lines_overflowed,
                        });
                    }
                    Err(reason) => {
                        warn!("Skipping edit {}: {}", index, reason);
                        report.skipped.push(SkippedEdit { index, reason });
                    }
                }
                report
            },
        )
    }

    fn apply_one<D: EditableDocument>(
        &self,
        document: &mut D,
        instruction: &EditInstruction,
    ) -> Result<TextBoxOutcome, SkipReason> {
        let page_count = document.page_count();
        let page = usize::try_from(instruction.page_index)
            .ok()
            .filter(|page| *page < page_count)
            .ok_or(SkipReason::PageOutOfRange {
                page_index: instruction.page_index,
                page_count,
            })?;

        let region = instruction.rect.to_region();
        if region.is_degenerate() {
            debug!(
                "Degenerate rect on page {}: {:?}, nothing will be visible",
                page, region
            );
        }
        document.add_redaction(page, &region, self.redaction_fill)?;
        if let Err(err) = document.apply_redactions(page) {
            if let Err(discard_err) = document.discard_redactions(page) {
                warn!(
                    "Failed to discard redaction on page {}: {}",
                    page, discard_err
                );
            }
            return Err(err.into());
        }

        let style = TextBoxStyle {
            font_size: instruction.font_size,
            color: self.text_color,
        };
        Ok(document.insert_textbox(page, &region, &instruction.new_text, &style)?)
    }
}
