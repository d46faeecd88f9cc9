//! Fragment content resolution.
//!
//! Turns fragment references from similarity search into readable text
//! and display metadata. Resolution is a layered chain, first hit wins:
//!
//! 1. relational chunk lookup by `chunk_id`
//! 2. literal filesystem path
//! 3. path relative to the configured fragments directory
//! 4. basename lookup inside that directory
//! 5. recursive filename search within it
//!
//! Misses are tagged (`None`) and logged at warn level. Content is
//! deduplicated across references by a hash of the exact text, so the
//! same chunk surfacing under multiple references is emitted once.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::models::{Fragment, FragmentRef};

/// Resolves fragment references against the relational store and the
/// filesystem fragments directory.
pub struct FragmentResolver {
    pool: SqlitePool,
    dir: PathBuf,
}

/// A reference resolved to readable content.
#[derive(Debug, Clone)]
struct Resolved {
    id: String,
    title: String,
    path: String,
    content: String,
}

impl FragmentResolver {
    pub fn new(pool: SqlitePool, dir: PathBuf) -> Self {
        Self { pool, dir }
    }

    /// Concatenate the content of all resolvable references, separated
    /// by blank lines. Identical content is included once. Returns
    /// `None` when no reference resolves.
    pub async fn concatenated_context(&self, refs: &[FragmentRef]) -> Option<String> {
        let mut seen = HashSet::new();
        let mut blocks = Vec::new();

        for fragment_ref in refs {
            if let Some(resolved) = self.resolve(fragment_ref).await {
                if seen.insert(content_hash(&resolved.content)) {
                    blocks.push(resolved.content);
                }
            }
        }

        if blocks.is_empty() {
            None
        } else {
            Some(blocks.join("\n\n"))
        }
    }

    /// Resolve up to `limit` references into display fragments, in
    /// order, skipping unresolvable references and duplicate content.
    pub async fn display_fragments(&self, refs: &[FragmentRef], limit: usize) -> Vec<Fragment> {
        let mut seen = HashSet::new();
        let mut fragments = Vec::new();

        for fragment_ref in refs {
            if fragments.len() >= limit {
                break;
            }
            if let Some(resolved) = self.resolve(fragment_ref).await {
                if seen.insert(content_hash(&resolved.content)) {
                    fragments.push(Fragment {
                        id: resolved.id,
                        title: resolved.title,
                        path: resolved.path,
                        content: resolved.content,
                    });
                }
            }
        }

        fragments
    }

    async fn resolve(&self, fragment_ref: &FragmentRef) -> Option<Resolved> {
        match fragment_ref {
            FragmentRef::ChunkId(chunk_id) => {
                if let Some(resolved) = self.lookup_chunk(chunk_id).await {
                    return Some(resolved);
                }
                // Chunk files on disk are named after their chunk_id.
                self.resolve_file(Path::new(&format!("{}.txt", chunk_id)))
            }
            FragmentRef::Path(path) => self.resolve_file(Path::new(path)),
        }
    }

    /// Relational lookup by `chunk_id`. Store errors fall through to the
    /// filesystem chain.
    async fn lookup_chunk(&self, chunk_id: &str) -> Option<Resolved> {
        let row = match sqlx::query(
            "SELECT chunk_id, content, metadata_json FROM chunks WHERE chunk_id = ?",
        )
        .bind(chunk_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row?,
            Err(e) => {
                warn!("chunk lookup failed for {}: {:#}", chunk_id, e);
                return None;
            }
        };

        let content: String = row.get("content");
        let metadata: serde_json::Value =
            serde_json::from_str(row.get("metadata_json")).unwrap_or(serde_json::json!({}));

        let doc_title = metadata.get("document_title").and_then(|v| v.as_str());
        let section = metadata.get("section").and_then(|v| v.as_str());
        let title = match (doc_title, section) {
            (Some(doc), Some(section)) => format!("{} - {}", doc, section),
            (Some(doc), None) => doc.to_string(),
            _ => chunk_id.to_string(),
        };

        let path = metadata
            .get("file_path")
            .and_then(|v| v.as_str())
            .unwrap_or(chunk_id)
            .to_string();

        Some(Resolved {
            id: chunk_id.to_string(),
            title,
            path,
            content,
        })
    }

    fn resolve_file(&self, path: &Path) -> Option<Resolved> {
        let file = self.locate(path)?;

        let content = match std::fs::read_to_string(&file) {
            Ok(content) => content,
            Err(e) => {
                warn!("failed to read fragment file {}: {}", file.display(), e);
                return None;
            }
        };

        let filename = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.display().to_string());

        Some(Resolved {
            id: filename.clone(),
            title: title_from_path(&file, &filename),
            path: display_path(&file, &self.dir),
            content,
        })
    }

    /// Layered path resolution: literal, relative to the fragments
    /// directory, basename inside it, then a recursive filename search.
    fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }

        let joined = self.dir.join(path);
        if joined.is_file() {
            return Some(joined);
        }

        let basename = path.file_name()?;
        let direct = self.dir.join(basename);
        if direct.is_file() {
            return Some(direct);
        }

        for entry in WalkDir::new(&self.dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && entry.file_name() == basename {
                return Some(entry.into_path());
            }
        }

        warn!("fragment file not found: {}", path.display());
        None
    }
}

/// Derive a readable title from a fragment file's path.
///
/// The document name is the first path segment containing an underscore
/// that is not itself a chunk file (`chunk_` prefix), with underscores
/// and dashes mapped to spaces. The section is the first segment with a
/// `ch` prefix, as used for chapter directories. Falls back to the bare
/// filename when neither pattern is present.
fn title_from_path(path: &Path, filename: &str) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();

    let doc_name = parts
        .iter()
        .find(|part| part.contains('_') && !part.starts_with("chunk_"))
        .map(|part| part.replace('_', " ").replace('-', " "));

    let section = parts
        .iter()
        .find(|part| part.starts_with("ch") && part.len() > 2 && !part.starts_with("chunk_"))
        .map(|part| part.replace('_', " "));

    match (doc_name, section) {
        (Some(doc), Some(section)) => format!("{} - {}", doc, section),
        (Some(doc), None) => doc,
        _ => filename.to_string(),
    }
}

/// Citation path shown to users: relative to the fragments directory
/// when the file lives under it, the full path otherwise.
fn display_path(path: &Path, dir: &Path) -> String {
    path.strip_prefix(dir)
        .map(|rel| rel.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

fn content_hash(content: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.finalize().into()
}
