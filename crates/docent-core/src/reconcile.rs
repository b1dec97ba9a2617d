//! Fail documents whose ingestion never finished, e.g. after a crash mid-run.

use std::time::Duration;

use docent_memory::{DocumentCatalog, DocumentError, DocumentId};

/// Mark every document still `processing` after `stale_after` as failed.
///
/// Safe to run repeatedly and concurrently with live ingestion: a document that
/// commits first stays `ready`, and one failed here can no longer commit.
///
/// # Errors
///
/// Returns a storage error if the update fails.
pub async fn reconcile_stale(
    catalog: &DocumentCatalog,
    stale_after: Duration,
) -> Result<Vec<DocumentId>, DocumentError> {
    let failed = catalog.fail_stale(stale_after).await?;
    tracing::info!(
        failed = failed.len(),
        stale_after_secs = stale_after.as_secs(),
        "reconciliation finished"
    );
    Ok(failed)
}
