//! Core data models used throughout doc-chat.
//!
//! These types represent the documents, chunks, chat messages, and
//! retrieved fragments that flow through the import and query pipelines.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Imported document stored in SQLite. Deleting a document cascades to
/// its chunks.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A slice of a document's content, the unit of retrieval and citation.
///
/// `chunk_id` is a globally unique human-assigned string (e.g.
/// `intro_guide_chunk_3`). The embedding is attached later by the
/// backfill command and is `None` until then.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_id: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: serde_json::Value,
    pub created_at: i64,
}

/// Reference to a retrievable fragment, as produced by similarity search.
///
/// A structured chunk identifier resolves through the relational store
/// first; a raw path goes straight to the filesystem chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FragmentRef {
    ChunkId(String),
    Path(String),
}

impl FragmentRef {
    /// The identifier shown to users and used for dedup across matches.
    pub fn key(&self) -> &str {
        match self {
            FragmentRef::ChunkId(id) => id,
            FragmentRef::Path(p) => p,
        }
    }
}

/// Resolved fragment prepared for display alongside a chat response.
#[derive(Debug, Clone, Serialize)]
pub struct Fragment {
    pub id: String,
    pub title: String,
    pub path: String,
    pub content: String,
}

/// One turn in a chat session's history. Append-only, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
