use crate::types::DocumentId;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("upload is empty")]
    EmptyInput,

    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] docent_llm::LlmError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("text extraction failed: {0}")]
    Extraction(String),

    #[error("storage error: {0}")]
    Storage(#[from] crate::error::MemoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
    /// Whether the error is the submitter's fault rather than an infrastructure
    /// failure worth retrying.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMediaType(_)
                | Self::EmptyInput
                | Self::FileTooLarge { .. }
                | Self::InvalidArgument(_)
                | Self::NotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_classification() {
        assert!(DocumentError::EmptyInput.is_rejection());
        assert!(DocumentError::UnsupportedMediaType("image/png".into()).is_rejection());
        assert!(!DocumentError::Extraction("bad xref".into()).is_rejection());
        assert!(
            !DocumentError::Storage(crate::error::MemoryError::Other("disk".into()))
                .is_rejection()
        );
    }

    #[test]
    fn display_includes_limit() {
        let e = DocumentError::FileTooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(e.to_string(), "file too large: 10 bytes (limit 5)");
    }
}
