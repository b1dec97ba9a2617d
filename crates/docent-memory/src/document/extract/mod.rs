//! Raw bytes to plain text.

#[cfg(feature = "pdf")]
mod pdf;
mod text;

use super::{DocumentError, MediaType};

/// Extract UTF-8 text from `bytes` according to `media`.
///
/// Undecodable text bytes are replaced, never reported. PDF parsing runs on the
/// blocking pool.
///
/// # Errors
///
/// Returns [`DocumentError::Extraction`] when a PDF cannot be parsed at all, or
/// [`DocumentError::UnsupportedMediaType`] for PDF input when PDF support is
/// compiled out.
pub async fn extract_text(media: MediaType, bytes: Vec<u8>) -> Result<String, DocumentError> {
    match media {
        MediaType::PlainText => Ok(text::decode_lossy(bytes)),
        #[cfg(feature = "pdf")]
        MediaType::Pdf => pdf::extract(bytes).await,
        #[cfg(not(feature = "pdf"))]
        MediaType::Pdf => Err(DocumentError::UnsupportedMediaType(
            media.as_str().to_owned(),
        )),
    }
}
