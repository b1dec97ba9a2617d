use crate::document::DocumentError;

const PAGE_SEPARATOR: &str = "\n\n";

pub(super) async fn extract(bytes: Vec<u8>) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || extract_pages(&bytes))
        .await
        .map_err(|e| DocumentError::Extraction(format!("PDF extraction task failed: {e}")))?
}

fn extract_pages(bytes: &[u8]) -> Result<String, DocumentError> {
    // pdf-extract panics on some malformed inputs.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| DocumentError::Extraction("PDF parser panicked".into()))?
        .map_err(|e| DocumentError::Extraction(e.to_string()))?;
    tracing::debug!(pages = pages.len(), "extracted PDF text");
    Ok(join_pages(&pages))
}

fn join_pages(pages: &[String]) -> String {
    pages.join(PAGE_SEPARATOR)
}
