pub mod error;
pub mod extract;
pub mod media;
pub mod pipeline;
pub mod splitter;

use std::path::Path;

pub use error::DocumentError;
pub use extract::extract_text;
pub use media::MediaType;
pub use pipeline::{IngestReport, IngestStage, IngestionPipeline};
pub use splitter::{SplitterConfig, TextSplitter, chunk};

/// Default maximum upload size: 50 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Name recorded for uploads submitted without one.
pub const FALLBACK_FILENAME: &str = "untitled";

/// A raw upload as received from a submitter.
#[derive(Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl Upload {
    /// A blank filename is replaced by [`FALLBACK_FILENAME`].
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        let filename = filename.into();
        let filename = if filename.trim().is_empty() {
            FALLBACK_FILENAME.to_owned()
        } else {
            filename
        };
        Self {
            filename,
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, guessing its media type from the extension.
    ///
    /// Files with an unknown extension get `application/octet-stream` and are
    /// rejected later by [`Upload::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::FileTooLarge`] before reading if the file exceeds
    /// `max_bytes`, or an IO error.
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, DocumentError> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > max_bytes {
            return Err(DocumentError::FileTooLarge {
                size: meta.len(),
                limit: max_bytes,
            });
        }

        let content_type = MediaType::from_path(path)
            .map_or("application/octet-stream", MediaType::as_str);
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path).await?;

        Ok(Self::new(filename, content_type, bytes))
    }

    /// Checks performed before any document record exists: media type, then
    /// emptiness, then size.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedMediaType`], [`DocumentError::EmptyInput`]
    /// or [`DocumentError::FileTooLarge`].
    pub fn validate(&self, max_bytes: u64) -> Result<MediaType, DocumentError> {
        let media = MediaType::parse(&self.content_type)?;
        if self.bytes.is_empty() {
            return Err(DocumentError::EmptyInput);
        }
        let size = u64::try_from(self.bytes.len()).unwrap_or(u64::MAX);
        if size > max_bytes {
            return Err(DocumentError::FileTooLarge {
                size,
                limit: max_bytes,
            });
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_filename_falls_back() {
        let upload = Upload::new("  ", "text/plain", b"x".to_vec());
        assert_eq!(upload.filename, "untitled");
    }

    #[test]
    fn validate_accepts_text() {
        let upload = Upload::new("a.txt", "text/plain", b"hello".to_vec());
        assert_eq!(upload.validate(100).unwrap(), MediaType::PlainText);
    }

    #[test]
    fn validate_rejects_empty() {
        let upload = Upload::new("a.txt", "text/plain", Vec::new());
        assert!(matches!(upload.validate(100), Err(DocumentError::EmptyInput)));
    }

    #[test]
    fn media_type_checked_before_emptiness() {
        let upload = Upload::new("a.png", "image/png", Vec::new());
        assert!(matches!(
            upload.validate(100),
            Err(DocumentError::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn validate_rejects_oversized() {
        let upload = Upload::new("a.txt", "text/plain", vec![b'a'; 11]);
        assert!(matches!(
            upload.validate(10),
            Err(DocumentError::FileTooLarge { size: 11, limit: 10 })
        ));
    }

    #[test]
    fn debug_hides_payload() {
        let upload = Upload::new("a.txt", "text/plain", b"secret".to_vec());
        let dbg = format!("{upload:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("bytes: 6"));
    }

    #[tokio::test]
    async fn from_path_reads_markdown_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.md");
        std::fs::write(&file, "# Title").unwrap();

        let upload = Upload::from_path(&file, DEFAULT_MAX_UPLOAD_BYTES).await.unwrap();
        assert_eq!(upload.filename, "notes.md");
        assert_eq!(upload.content_type, "text/plain");
        assert_eq!(upload.bytes, b"# Title");
    }

    #[tokio::test]
    async fn from_path_unknown_extension_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("photo.png");
        std::fs::write(&file, [0x89, b'P', b'N', b'G']).unwrap();

        let upload = Upload::from_path(&file, DEFAULT_MAX_UPLOAD_BYTES).await.unwrap();
        assert!(matches!(
            upload.validate(DEFAULT_MAX_UPLOAD_BYTES),
            Err(DocumentError::UnsupportedMediaType(_))
        ));
    }

    #[tokio::test]
    async fn from_path_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.txt");
        std::fs::write(&file, "xx").unwrap();
        assert!(matches!(
            Upload::from_path(&file, 1).await,
            Err(DocumentError::FileTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn from_path_missing_file() {
        let result = Upload::from_path(Path::new("/nonexistent/file.txt"), 10).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }
}
