//! Embedding backfill commands.
//!
//! `embed pending` attaches vectors to chunks that have none; `embed
//! rebuild` clears every stored vector and regenerates from scratch.
//! The backend embeds one text per call, so a short pause between
//! batches keeps the command under the backend's rate limits.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::time::Duration;

use crate::config::Config;
use crate::db;
use crate::embedding::{vec_to_blob, Embedder, GeminiEmbedder};

/// Embed chunks that are missing embeddings.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size: usize,
    pause_secs: u64,
    dry_run: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let pending = find_pending_chunks(&pool, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  chunks needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all chunks up to date");
        pool.close().await;
        return Ok(());
    }

    let embedder = GeminiEmbedder::new(&config.model);
    let (embedded, failed) =
        embed_chunks(&pool, &embedder, &pending, batch_size, pause_secs).await;

    println!("embed pending");
    println!("  total pending: {}", pending.len());
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Delete all embeddings and regenerate for all chunks.
pub async fn run_embed_rebuild(config: &Config, batch_size: usize, pause_secs: u64) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query("UPDATE chunks SET embedding = NULL")
        .execute(&pool)
        .await?;
    println!("embed rebuild — cleared existing embeddings");

    let all_chunks = find_pending_chunks(&pool, None).await?;
    if all_chunks.is_empty() {
        println!("  no chunks to embed");
        pool.close().await;
        return Ok(());
    }

    let embedder = GeminiEmbedder::new(&config.model);
    let (embedded, failed) =
        embed_chunks(&pool, &embedder, &all_chunks, batch_size, pause_secs).await;

    println!("embed rebuild");
    println!("  total chunks: {}", all_chunks.len());
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

struct PendingChunk {
    chunk_id: String,
    content: String,
}

async fn find_pending_chunks(pool: &SqlitePool, limit: Option<usize>) -> Result<Vec<PendingChunk>> {
    let limit_val = limit.unwrap_or(usize::MAX) as i64;

    let rows = sqlx::query(
        "SELECT chunk_id, content FROM chunks WHERE embedding IS NULL ORDER BY chunk_id LIMIT ?",
    )
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PendingChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
        })
        .collect())
}

async fn embed_chunks(
    pool: &SqlitePool,
    embedder: &dyn Embedder,
    chunks: &[PendingChunk],
    batch_size: usize,
    pause_secs: u64,
) -> (u64, u64) {
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 && batch_size > 0 && i % batch_size == 0 && pause_secs > 0 {
            tokio::time::sleep(Duration::from_secs(pause_secs)).await;
        }

        match embedder.embed(&chunk.content).await {
            Ok(vector) => {
                let blob = vec_to_blob(&vector);
                let result = sqlx::query("UPDATE chunks SET embedding = ? WHERE chunk_id = ?")
                    .bind(&blob)
                    .bind(&chunk.chunk_id)
                    .execute(pool)
                    .await;
                match result {
                    Ok(_) => embedded += 1,
                    Err(e) => {
                        eprintln!(
                            "Warning: failed to store embedding for {}: {}",
                            chunk.chunk_id, e
                        );
                        failed += 1;
                    }
                }
            }
            Err(e) => {
                eprintln!("Warning: failed to embed {}: {}", chunk.chunk_id, e);
                failed += 1;
            }
        }
    }

    (embedded, failed)
}
