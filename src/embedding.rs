//! Embedding adapter and vector utilities.
//!
//! Defines the [`Embedder`] trait and the [`GeminiEmbedder`] implementation,
//! which calls the `embedContent` endpoint of a Gemini-style REST API.
//! A query is embedded with a single outbound call and no retry; an
//! unreachable or misconfigured backend surfaces as an error that the
//! pipeline maps to its fixed terminal response.
//!
//! Also provides vector utilities for working with stored embeddings:
//! - [`dot_product`] — similarity score used by the relational fallback
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for SQLite BLOB storage
//! - [`blob_to_vec`] — decode a SQLite BLOB back into a `Vec<f32>`

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::{ModelConfig, GEMINI_API_KEY};

/// Converts free text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedder backed by the Gemini `embedContent` REST endpoint.
pub struct GeminiEmbedder {
    model: String,
    url: String,
    timeout: Duration,
}

impl GeminiEmbedder {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            model: config.embed_model.clone(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = std::env::var(GEMINI_API_KEY)
            .map_err(|_| anyhow::anyhow!("{} not set", GEMINI_API_KEY))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [ { "text": text } ] },
        });

        let response = client
            .post(format!(
                "{}/models/{}:embedContent?key={}",
                self.url, self.model, api_key
            ))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Embedding API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_embed_response(&json)
    }
}

/// Extract the `embedding.values` array from an `embedContent` response.
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding.values"))?;

    if values.is_empty() {
        bail!("Invalid embedding response: empty vector");
    }

    Ok(values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Dot product of two embedding vectors.
///
/// Scores the relational fallback's linear scan. Extra components in the
/// longer vector are ignored, matching an element-wise zip.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
