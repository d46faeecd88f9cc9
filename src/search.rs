//! Similarity search with an ordered fallback chain.
//!
//! Candidates come from the vector index when it is configured and
//! reachable; otherwise from a linear scan of embedded chunks in the
//! relational store, ranked by dot product. Both channels empty means
//! no candidates; the pipeline turns that into its "no documentation
//! found" response.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::Config;
use crate::embedding::{blob_to_vec, dot_product, Embedder, GeminiEmbedder};
use crate::index::{IndexMatch, VectorIndex};
use crate::models::FragmentRef;

/// Source of candidate fragment references for a query vector.
///
/// The production implementation is [`SearchService`]; tests substitute
/// doubles to drive the pipeline without a network.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn candidates(&self, vector: &[f32], top_k: usize) -> Vec<FragmentRef>;
}

/// Similarity search over the vector index with a relational fallback.
pub struct SearchService {
    index: VectorIndex,
    pool: SqlitePool,
}

impl SearchService {
    pub fn new(index: VectorIndex, pool: SqlitePool) -> Self {
        Self { index, pool }
    }

    /// Rank every embedded chunk by dot product and take the best `top_k`.
    async fn scan_chunks(&self, vector: &[f32], top_k: usize) -> Result<Vec<FragmentRef>> {
        let rows = sqlx::query("SELECT chunk_id, embedding FROM chunks WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        let mut scored: Vec<(String, f32)> = rows
            .iter()
            .map(|row| {
                let chunk_id: String = row.get("chunk_id");
                let blob: Vec<u8> = row.get("embedding");
                let score = dot_product(vector, &blob_to_vec(&blob));
                (chunk_id, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(chunk_id, _)| FragmentRef::ChunkId(chunk_id))
            .collect())
    }
}

#[async_trait]
impl CandidateSource for SearchService {
    /// Return up to `top_k` fragment references, best match first.
    ///
    /// Fallback order: vector index, then relational dot-product scan,
    /// then empty. Failures in either channel are logged and treated as
    /// empty; nothing propagates past this adapter.
    async fn candidates(&self, vector: &[f32], top_k: usize) -> Vec<FragmentRef> {
        match self.index.query(vector, top_k).await {
            Ok(matches) if !matches.is_empty() => {
                debug!("vector index returned {} matches", matches.len());
                return refs_from_matches(&matches);
            }
            Ok(_) => debug!("vector index returned no matches, trying relational store"),
            Err(e) => warn!("vector index unavailable: {:#}, trying relational store", e),
        }

        match self.scan_chunks(vector, top_k).await {
            Ok(refs) => refs,
            Err(e) => {
                warn!("relational fallback failed: {:#}", e);
                Vec::new()
            }
        }
    }
}

/// Convert index matches into deduplicated fragment references.
///
/// A match carrying both a `chunk_id` and a `file_path` yields the
/// structured chunk reference. Matches with neither are dropped.
/// Order is preserved; later duplicates are discarded.
pub fn refs_from_matches(matches: &[IndexMatch]) -> Vec<FragmentRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for m in matches {
        let fragment = if let Some(chunk_id) = m.metadata.get("chunk_id").and_then(|v| v.as_str()) {
            FragmentRef::ChunkId(chunk_id.to_string())
        } else if let Some(path) = m.metadata.get("file_path").and_then(|v| v.as_str()) {
            FragmentRef::Path(path.to_string())
        } else {
            debug!("index match {} has no chunk_id or file_path metadata", m.id);
            continue;
        };

        if seen.insert(fragment.clone()) {
            refs.push(fragment);
        }
    }

    refs
}

/// CLI search: embed the query and rank embedded chunks from the
/// relational store by dot product, printing the results.
pub async fn run_search(
    config: &Config,
    pool: SqlitePool,
    query: &str,
    top_k: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let embedder = GeminiEmbedder::new(&config.model);
    let vector = embedder.embed(query).await?;

    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let rows = sqlx::query(
        "SELECT chunk_id, content, embedding FROM chunks WHERE embedding IS NOT NULL",
    )
    .fetch_all(&pool)
    .await?;

    let mut scored: Vec<(String, String, f32)> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let score = dot_product(&vector, &blob_to_vec(&blob));
            (row.get("chunk_id"), row.get("content"), score)
        })
        .collect();

    scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    if scored.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, (chunk_id, content, score)) in scored.iter().enumerate() {
        let preview: String = content.chars().take(120).collect();
        println!("{}. [{:.4}] {}", i + 1, score, chunk_id);
        println!("    \"{}\"", preview.replace('\n', " "));
        println!();
    }

    Ok(())
}
