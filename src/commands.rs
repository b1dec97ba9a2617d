use std::fmt::Write as _;
use std::io::Write as _;
use std::time::Duration;

use anyhow::Context;
use docent_core::reconcile::reconcile_stale;
use docent_core::{AppContext, Config};
use docent_memory::{ChunkRecord, DocumentId, DocumentRecord, SearchHit, Upload};
use docent_worker::{JobRecord, TaskId};
use futures::StreamExt;
use tokio::sync::watch;

use crate::Command;

pub(crate) async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let ctx = AppContext::build(config).await?;

    match command {
        Command::Ingest {
            path,
            content_type,
            no_wait,
        } => {
            let max_bytes = ctx.config().ingestion.max_upload_bytes;
            let mut upload = Upload::from_path(&path, max_bytes)
                .await
                .with_context(|| format!("cannot upload {}", path.display()))?;
            if let Some(content_type) = content_type {
                upload.content_type = content_type;
            }
            if no_wait {
                ctx.pipeline()?.validate(&upload)?;
                let id = ctx.jobs().await?.enqueue(&upload).await?;
                println!("queued task {id}");
                return Ok(());
            }
            ingest_and_wait(&ctx, upload).await
        }
        Command::Status { task_id } => {
            let job = ctx
                .jobs()
                .await?
                .get(TaskId(task_id))
                .await?
                .with_context(|| format!("task {task_id} not found"))?;
            print!("{}", format_job(&job));
            if let Some(document_id) = job.document_id {
                let doc = ctx.catalog().get(document_id).await?;
                print!("{}", format_document(&doc));
            }
            Ok(())
        }
        Command::List => {
            let docs = ctx.catalog().list().await?;
            if docs.is_empty() {
                println!("no documents");
            }
            for doc in &docs {
                println!("{}", document_line(doc));
            }
            Ok(())
        }
        Command::Show {
            document_id,
            chunks,
        } => {
            let catalog = ctx.catalog();
            let id = DocumentId(document_id);
            let doc = catalog.get(id).await?;
            print!("{}", format_document(&doc));
            for chunk in catalog.chunks(id).await? {
                println!("{}", chunk_line(&chunk, chunks));
            }
            Ok(())
        }
        Command::Delete { document_id } => {
            ctx.catalog().delete(DocumentId(document_id)).await?;
            println!("deleted document {document_id}");
            Ok(())
        }
        Command::Search { question, top_k } => {
            let hits = ctx.retriever().search(&question, top_k).await?;
            if hits.is_empty() {
                println!("no matching chunks");
            }
            print!("{}", format_hits(&hits));
            Ok(())
        }
        Command::Ask {
            question,
            top_k,
            stream,
        } => {
            let rag = ctx.rag();
            if stream {
                let mut answer = rag.answer_stream(&question, top_k).await?;
                let mut stdout = std::io::stdout();
                while let Some(token) = answer.tokens.next().await {
                    stdout.write_all(token?.as_bytes())?;
                    stdout.flush()?;
                }
                println!();
                print!("{}", format_sources(&answer.sources));
            } else {
                let answer = rag.answer(&question, top_k).await?;
                println!("{}", answer.text);
                print!("{}", format_sources(&answer.sources));
            }
            Ok(())
        }
        Command::Reconcile { stale_after_secs } => {
            let stale_after = stale_after_secs
                .map_or_else(|| ctx.config().stale_after(), Duration::from_secs);
            let failed = reconcile_stale(&ctx.catalog(), stale_after).await?;
            println!("marked {} stale document(s) failed", failed.len());
            Ok(())
        }
        Command::Worker => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for ctrl-c: {e:#}");
                    return;
                }
                tracing::info!("received shutdown signal");
                let _ = shutdown_tx.send(true);
            });

            let runner = ctx.start_runner(shutdown_rx).await?;
            tracing::info!(workers = ctx.config().worker.workers, "workers running");
            runner.join().await;
            Ok(())
        }
    }
}

async fn ingest_and_wait(ctx: &AppContext, upload: Upload) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = ctx.start_submit_runner(shutdown_rx).await?;

    let mut handle = runner.submit(upload).await?;
    println!("queued task {}", handle.id());
    handle.wait().await?;
    let job = runner.status(handle.id()).await?;
    print!("{}", format_job(&job));
    if let Some(document_id) = job.document_id {
        print!("{}", format_document(&ctx.catalog().get(document_id).await?));
    }

    let _ = shutdown_tx.send(true);
    runner.join().await;
    Ok(())
}

fn format_job(job: &JobRecord) -> String {
    let mut out = format!(
        "task {}: {} ({}), attempts {}\n",
        job.id, job.status, job.filename, job.attempts
    );
    if let Some(error) = &job.error {
        let _ = writeln!(out, "  error: {error}");
    }
    out
}

fn format_document(doc: &DocumentRecord) -> String {
    let mut out = format!(
        "document {}: {} [{}] {} chunk(s), created {}\n",
        doc.id,
        doc.filename,
        doc.status,
        doc.chunk_count,
        doc.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(error) = &doc.error {
        let _ = writeln!(out, "  error: {error}");
    }
    out
}

fn document_line(doc: &DocumentRecord) -> String {
    format!(
        "{:>6}  {:<10}  {:>5}  {}",
        doc.id.0,
        doc.status.as_str(),
        doc.chunk_count,
        doc.filename
    )
}

fn chunk_line(chunk: &ChunkRecord, with_text: bool) -> String {
    if with_text {
        format!("  #{} {}", chunk.chunk_index, chunk.content)
    } else {
        format!(
            "  #{} ({} words)",
            chunk.chunk_index,
            chunk.content.split_whitespace().count()
        )
    }
}

fn format_hits(hits: &[SearchHit]) -> String {
    let mut out = String::new();
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} #{} (distance {:.4})\n   {}",
            rank + 1,
            hit.filename,
            hit.chunk_index,
            hit.distance,
            preview(&hit.content, 200)
        );
    }
    out
}

fn format_sources(sources: &[SearchHit]) -> String {
    if sources.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nsources:\n");
    for hit in sources {
        let _ = writeln!(out, "  {} #{}", hit.filename, hit.chunk_index);
    }
    out
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use docent_memory::{ChunkId, DocumentStatus};

    use super::*;

    fn doc(status: DocumentStatus, error: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            id: DocumentId(7),
            filename: "guide.pdf".into(),
            content_type: "application/pdf".into(),
            status,
            error: error.map(str::to_owned),
            chunk_count: 3,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn hit(filename: &str, content: &str) -> SearchHit {
        SearchHit {
            chunk_id: ChunkId(1),
            document_id: DocumentId(7),
            filename: filename.into(),
            chunk_index: 2,
            content: content.into(),
            distance: 0.125,
        }
    }

    #[test]
    fn document_summary_includes_error() {
        let out = format_document(&doc(DocumentStatus::Failed, Some("embedding failed")));
        assert!(out.starts_with("document 7: guide.pdf [failed] 3 chunk(s), created 2024-05-01"));
        assert!(out.contains("error: embedding failed"));
    }

    #[test]
    fn document_line_columns() {
        let line = document_line(&doc(DocumentStatus::Ready, None));
        assert!(line.contains("ready"));
        assert!(line.ends_with("guide.pdf"));
    }

    #[test]
    fn hits_are_ranked_from_one() {
        let out = format_hits(&[hit("a.txt", "first"), hit("b.txt", "second")]);
        assert!(out.contains("1. a.txt #2 (distance 0.1250)"));
        assert!(out.contains("2. b.txt #2"));
    }

    #[test]
    fn no_sources_prints_nothing() {
        assert!(format_sources(&[]).is_empty());
        assert!(format_sources(&[hit("a.txt", "x")]).contains("a.txt #2"));
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("héllo   wörld", 5), "héllo...");
        assert_eq!(preview("short", 10), "short");
    }

    #[test]
    fn chunk_line_counts_words() {
        let chunk = ChunkRecord {
            id: ChunkId(1),
            document_id: DocumentId(7),
            chunk_index: 0,
            content: "one two three".into(),
            embedding: vec![0.0; 4],
        };
        assert_eq!(chunk_line(&chunk, false), "  #0 (3 words)");
        assert_eq!(chunk_line(&chunk, true), "  #0 one two three");
    }
}
