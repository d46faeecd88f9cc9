//! Overlapping-window text chunker.
//!
//! Slices document content into fixed-size character windows with a
//! configurable overlap between consecutive windows, so retrieval does
//! not lose sentences that straddle a window boundary.
//!
//! Each chunk receives a globally unique `chunk_id` derived from the
//! document filename stem and its 1-based position.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split a document's content into overlapping chunks.
///
/// Windows advance by `chunk_size - overlap` characters; blank windows
/// are skipped without consuming a chunk number. Returns an empty vec
/// for empty content.
pub fn chunk_document(document: &Document, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    assert!(overlap < chunk_size, "overlap must be smaller than chunk_size");

    let chars: Vec<char> = document.content.chars().collect();
    let step = chunk_size - overlap;
    let stem = filename_stem(&document.filename);

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();

        if !window.trim().is_empty() {
            let number = chunks.len() + 1;
            let chunk_id = format!("{}_chunk_{}", stem, number);
            let metadata = serde_json::json!({
                "document_id": document.id,
                "document_title": document.title,
                "chunk_index": number,
                "section": format!("Section {}", number),
            });

            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document.id.clone(),
                chunk_id,
                content: window,
                embedding: None,
                metadata,
                created_at: Utc::now().timestamp(),
            });
        }

        start += step;
    }

    chunks
}

/// Filename without its final extension.
fn filename_stem(filename: &str) -> &str {
    filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_document(filename: &str, content: &str) -> Document {
        Document {
            id: "doc-1".to_string(),
            title: "Test Document".to_string(),
            filename: filename.to_string(),
            content: content.to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_short_content_single_chunk() {
        let doc = make_document("guide.md", "Short content.");
        let chunks = chunk_document(&doc, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "guide_chunk_1");
        assert_eq!(chunks[0].content, "Short content.");
    }

    #[test]
    fn test_empty_content_yields_no_chunks() {
        let doc = make_document("guide.md", "");
        let chunks = chunk_document(&doc, 1000, 200);
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let content: String = ('a'..='z').cycle().take(250).collect();
        let doc = make_document("guide.md", &content);
        let chunks = chunk_document(&doc, 100, 20);

        // Step is 80, so the last 20 chars of each chunk open the next.
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].content.chars().rev().take(20).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(pair[1].content.starts_with(&tail));
        }
    }

    #[test]
    fn test_chunk_ids_unique_and_sequential() {
        let content = "x".repeat(500);
        let doc = make_document("user_manual.txt", &content);
        let chunks = chunk_document(&doc, 100, 20);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_id, format!("user_manual_chunk_{}", i + 1));
        }
    }

    #[test]
    fn test_blank_windows_skipped() {
        let mut content = "real text here".to_string();
        content.push_str(&" ".repeat(300));
        let doc = make_document("guide.md", &content);
        let chunks = chunk_document(&doc, 100, 20);
        assert!(chunks.iter().all(|c| !c.content.trim().is_empty()));
    }

    #[test]
    fn test_metadata_carries_document_title() {
        let content = "y".repeat(150);
        let doc = make_document("guide.md", &content);
        let chunks = chunk_document(&doc, 100, 20);
        assert_eq!(chunks[0].metadata["document_title"], "Test Document");
        assert_eq!(chunks[0].metadata["chunk_index"], 1);
    }

    #[test]
    fn test_multibyte_content_splits_on_char_boundaries() {
        let content = "é".repeat(250);
        let doc = make_document("unicode.md", &content);
        let chunks = chunk_document(&doc, 100, 20);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].content.chars().count(), 100);
    }
}
