//! Vector index adapter.
//!
//! Thin client for a Pinecone-style vector database: `POST {host}/query`
//! with the query vector, returning scored matches with their metadata.
//! The index is optional: when no host is configured, or the key is
//! missing, [`VectorIndex::query`] reports an error and similarity
//! search falls back to the relational store.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::{IndexConfig, PINECONE_API_KEY};

/// One scored match returned by the index.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// Client for the vector index query endpoint.
pub struct VectorIndex {
    host: Option<String>,
    namespace: String,
    timeout: Duration,
}

impl VectorIndex {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            host: config.host.clone(),
            namespace: config.namespace.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Query the index for the `top_k` nearest matches, best first.
    ///
    /// Ordering is whatever the index reports (descending score); ties
    /// keep index-native order.
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let host = match &self.host {
            Some(host) => host,
            None => bail!("vector index host not configured"),
        };
        let api_key = std::env::var(PINECONE_API_KEY)
            .map_err(|_| anyhow::anyhow!("{} not set", PINECONE_API_KEY))?;

        let client = reqwest::Client::builder().timeout(self.timeout).build()?;

        let body = serde_json::json!({
            "namespace": self.namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });

        let response = client
            .post(format!("{}/query", host))
            .header("Api-Key", api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Vector index error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_query_response(&json)
    }
}

/// Extract `matches` from a query response, preserving reported order.
fn parse_query_response(json: &serde_json::Value) -> Result<Vec<IndexMatch>> {
    let matches = json
        .get("matches")
        .and_then(|m| m.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid index response: missing matches array"))?;

    Ok(matches
        .iter()
        .map(|m| IndexMatch {
            id: m
                .get("id")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string(),
            score: m.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32,
            metadata: m.get("metadata").cloned().unwrap_or(serde_json::json!({})),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_response_valid() {
        let json = serde_json::json!({
            "matches": [
                { "id": "v1", "score": 0.91, "metadata": { "chunk_id": "guide_chunk_1" } },
                { "id": "v2", "score": 0.88, "metadata": { "file_path": "data/chunks/a.txt" } },
            ]
        });
        let matches = parse_query_response(&json).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].metadata["chunk_id"], "guide_chunk_1");
        assert!((matches[0].score - 0.91).abs() < 1e-6);
    }

    #[test]
    fn test_parse_query_response_missing_matches() {
        let json = serde_json::json!({ "results": [] });
        assert!(parse_query_response(&json).is_err());
    }

    #[test]
    fn test_parse_query_response_match_without_metadata() {
        let json = serde_json::json!({ "matches": [ { "id": "v1", "score": 0.5 } ] });
        let matches = parse_query_response(&json).unwrap();
        assert_eq!(matches[0].metadata, serde_json::json!({}));
    }
}
