//! Document import and chunking commands.
//!
//! `import` reads a file into a document row; `chunk` slices a document
//! into overlapping windows; `import-chunks` bulk-imports a directory of
//! pre-chunked `.txt` files, attaching each to a document inferred from
//! its path.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::chunk::chunk_document;
use crate::config::Config;
use crate::db;
use crate::models::{Chunk, Document};

/// Import a document file. Prints the new document id.
pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document file: {}", path.display()))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let title = title_from_filename(&filename);

    let pool = db::connect(config).await?;
    let document = insert_document(&pool, &title, &filename, &content).await?;

    println!("imported document");
    println!("  id: {}", document.id);
    println!("  title: {}", document.title);
    println!("  characters: {}", document.content.chars().count());

    pool.close().await;
    Ok(())
}

/// Slice a document into overlapping chunks, replacing any existing ones.
pub async fn run_chunk(
    config: &Config,
    document_id: &str,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = overlap.unwrap_or(config.chunking.overlap);
    if overlap >= chunk_size {
        bail!("overlap must be smaller than chunk size");
    }

    let pool = db::connect(config).await?;

    let row = sqlx::query(
        "SELECT id, title, filename, content, created_at, updated_at FROM documents WHERE id = ?",
    )
    .bind(document_id)
    .fetch_optional(&pool)
    .await?;

    let row = match row {
        Some(row) => row,
        None => bail!("document not found: {}", document_id),
    };

    let document = Document {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };

    // Re-chunking replaces the previous slicing wholesale.
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&pool)
        .await?;

    let chunks = chunk_document(&document, chunk_size, overlap);
    for chunk in &chunks {
        insert_chunk(&pool, chunk).await?;
    }

    println!("chunked document {}", document_id);
    println!("  chunks: {}", chunks.len());
    println!("  chunk size: {} (overlap {})", chunk_size, overlap);

    pool.close().await;
    Ok(())
}

/// Bulk-import pre-chunked `.txt` files from a directory tree.
///
/// Each file becomes one chunk keyed by its filename stem; the owning
/// document is inferred from the first path segment that looks like a
/// document name, or created as "Unknown Document".
pub async fn run_import_chunks(config: &Config, dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }

    let pool = db::connect(config).await?;
    let mut imported = 0u64;
    let mut skipped = 0u64;

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file()
            || entry.path().extension().and_then(|e| e.to_str()) != Some("txt")
        {
            continue;
        }

        let file_path = entry.path();
        let content = match std::fs::read_to_string(file_path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Warning: failed to read {}: {}", file_path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let chunk_id = file_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        // Skip chunk_ids we already hold; chunk_id is globally unique.
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM chunks WHERE chunk_id = ?")
            .bind(&chunk_id)
            .fetch_optional(&pool)
            .await?;
        if exists.is_some() {
            skipped += 1;
            continue;
        }

        let doc_title = document_title_from_path(file_path)
            .unwrap_or_else(|| "Unknown Document".to_string());
        let document = find_or_create_document(&pool, &doc_title).await?;

        let metadata = serde_json::json!({
            "document_id": document.id,
            "document_title": document.title,
            "file_path": file_path.display().to_string(),
            "section": chunk_id,
        });

        let chunk = Chunk {
            id: Uuid::new_v4().to_string(),
            document_id: document.id.clone(),
            chunk_id,
            content,
            embedding: None,
            metadata,
            created_at: Utc::now().timestamp(),
        };
        insert_chunk(&pool, &chunk).await?;
        imported += 1;
    }

    println!("import-chunks from {}", dir.display());
    println!("  imported: {}", imported);
    println!("  skipped: {}", skipped);

    pool.close().await;
    Ok(())
}

/// List stored chunks, optionally filtered to one document.
pub async fn run_list_chunks(config: &Config, document_id: Option<&str>) -> Result<()> {
    let pool = db::connect(config).await?;

    let rows = match document_id {
        Some(id) => {
            sqlx::query(
                "SELECT chunk_id, content, embedding IS NOT NULL AS embedded
                 FROM chunks WHERE document_id = ? ORDER BY chunk_id",
            )
            .bind(id)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT chunk_id, content, embedding IS NOT NULL AS embedded
                 FROM chunks ORDER BY chunk_id",
            )
            .fetch_all(&pool)
            .await?
        }
    };

    if rows.is_empty() {
        println!("No chunks.");
        pool.close().await;
        return Ok(());
    }

    for row in &rows {
        let chunk_id: String = row.get("chunk_id");
        let content: String = row.get("content");
        let embedded: bool = row.get("embedded");
        let preview: String = content.chars().take(60).collect();
        println!(
            "{} [{}] \"{}\"",
            chunk_id,
            if embedded { "embedded" } else { "pending" },
            preview.replace('\n', " ")
        );
    }
    println!();
    println!("total: {}", rows.len());

    pool.close().await;
    Ok(())
}

async fn insert_document(
    pool: &SqlitePool,
    title: &str,
    filename: &str,
    content: &str,
) -> Result<Document> {
    let now = Utc::now().timestamp();
    let document = Document {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        filename: filename.to_string(),
        content: content.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO documents (id, title, filename, content, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&document.id)
    .bind(&document.title)
    .bind(&document.filename)
    .bind(&document.content)
    .bind(document.created_at)
    .bind(document.updated_at)
    .execute(pool)
    .await?;

    Ok(document)
}

async fn find_or_create_document(pool: &SqlitePool, title: &str) -> Result<Document> {
    let row = sqlx::query(
        "SELECT id, title, filename, content, created_at, updated_at FROM documents WHERE title = ?",
    )
    .bind(title)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(Document {
            id: row.get("id"),
            title: row.get("title"),
            filename: row.get("filename"),
            content: row.get("content"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }

    let filename = format!("{}.md", title.to_lowercase().replace(' ', "_"));
    insert_document(pool, title, &filename, "").await
}

async fn insert_chunk(pool: &SqlitePool, chunk: &Chunk) -> Result<()> {
    sqlx::query(
        "INSERT INTO chunks (id, document_id, chunk_id, content, metadata_json, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&chunk.id)
    .bind(&chunk.document_id)
    .bind(&chunk.chunk_id)
    .bind(&chunk.content)
    .bind(chunk.metadata.to_string())
    .bind(chunk.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// "user_manual.md" → "User Manual"
fn title_from_filename(filename: &str) -> String {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Document name from the first path segment containing an underscore
/// that is not itself a chunk filename.
fn document_title_from_path(path: &Path) -> Option<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .find(|part| part.contains('_') && !part.starts_with("chunk_"))
        .map(|part| title_from_filename(&part))
}
