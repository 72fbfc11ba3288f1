use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfEditError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid edit list: {0}")]
    InvalidEdits(String),

    #[error("Page index {index} out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<lopdf::Error> for PdfEditError {
    fn from(err: lopdf::Error) -> Self {
        PdfEditError::OperationError(err.to_string())
    }
}
