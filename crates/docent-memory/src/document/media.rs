use std::fmt;
use std::path::Path;

use super::DocumentError;

/// Content types the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Pdf,
    PlainText,
}

impl MediaType {
    /// Parse a declared content type. Parameters (`; charset=...`) and case are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedMediaType`] for anything outside the
    /// accepted set, including PDF when the `pdf` feature is disabled.
    pub fn parse(content_type: &str) -> Result<Self, DocumentError> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" if cfg!(feature = "pdf") => Ok(Self::Pdf),
            "text/plain" => Ok(Self::PlainText),
            _ => Err(DocumentError::UnsupportedMediaType(content_type.to_owned())),
        }
    }

    /// Guess from a file extension. Markdown is treated as plain text.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" | "md" | "markdown" => Some(Self::PlainText),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::PlainText => "text/plain",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
