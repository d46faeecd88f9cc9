//! End-to-end pipeline tests.
//!
//! These drive the full query pipeline against a temporary SQLite store,
//! substituting stub embedding and generation backends so no network is
//! involved. The vector index is left unconfigured, which exercises the
//! relational fallback path of similarity search.

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use doc_chat::config::{
    ChunkingConfig, Config, DbConfig, FragmentsConfig, IndexConfig, ModelConfig, RetrievalConfig,
    ServerConfig, SessionConfig,
};
use doc_chat::db;
use doc_chat::embedding::{vec_to_blob, Embedder};
use doc_chat::generation::Generator;
use doc_chat::history::SessionStore;
use doc_chat::index::VectorIndex;
use doc_chat::migrate;
use doc_chat::models::FragmentRef;
use doc_chat::pipeline::{
    ChatPipeline, EMBEDDING_FAILED_REPLY, NO_CONTENT_REPLY, NO_DOCUMENTATION_REPLY,
};
use doc_chat::resolver::FragmentResolver;
use doc_chat::search::{CandidateSource, SearchService};
use sqlx::SqlitePool;

// ============ Test doubles ============

struct FixedEmbedder(Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("embedding backend unreachable")
    }
}

struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
    reply: String,
}

impl RecordingGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            prompts: Mutex::new(Vec::new()),
            reply: reply.to_string(),
        })
    }

    fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

struct FixedCandidates(Vec<FragmentRef>);

#[async_trait]
impl CandidateSource for FixedCandidates {
    async fn candidates(&self, _vector: &[f32], _top_k: usize) -> Vec<FragmentRef> {
        self.0.clone()
    }
}

// ============ Fixture helpers ============

fn test_config(root: &Path) -> Config {
    Config {
        db: DbConfig {
            path: root.join("data").join("docchat.sqlite"),
        },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        model: ModelConfig::default(),
        index: IndexConfig::default(),
        fragments: FragmentsConfig {
            dir: root.join("data").join("chunks"),
        },
        session: SessionConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    }
}

async fn setup() -> (TempDir, Config, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = test_config(tmp.path());
    std::fs::create_dir_all(&config.fragments.dir).unwrap();
    migrate::run_migrations(&config).await.unwrap();
    let pool = db::connect(&config).await.unwrap();
    (tmp, config, pool)
}

async fn seed_chunk(pool: &SqlitePool, chunk_id: &str, content: &str, vector: Option<&[f32]>) {
    sqlx::query(
        "INSERT INTO documents (id, title, filename, content, created_at, updated_at)
         VALUES (?, ?, 'git_guide.md', '', 0, 0)
         ON CONFLICT(id) DO NOTHING",
    )
    .bind("doc-git")
    .bind("Git Guide")
    .execute(pool)
    .await
    .unwrap();

    let metadata = serde_json::json!({
        "document_title": "Git Guide",
        "section": format!("Section {}", chunk_id.rsplit('_').next().unwrap_or("1")),
    });

    sqlx::query(
        "INSERT INTO chunks (id, document_id, chunk_id, content, embedding, metadata_json, created_at)
         VALUES (?, 'doc-git', ?, ?, ?, ?, 0)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(chunk_id)
    .bind(content)
    .bind(vector.map(vec_to_blob))
    .bind(metadata.to_string())
    .execute(pool)
    .await
    .unwrap();
}

fn make_pipeline(
    config: &Config,
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    search: Arc<dyn CandidateSource>,
) -> (ChatPipeline, Arc<SessionStore>) {
    let resolver = FragmentResolver::new(pool.clone(), config.fragments.dir.clone());
    let sessions = Arc::new(SessionStore::new(pool, config.session.ttl_secs));
    let pipeline = ChatPipeline::new(
        embedder,
        generator,
        search,
        resolver,
        sessions.clone(),
        config.retrieval.top_k,
        config.retrieval.fragment_limit,
    );
    (pipeline, sessions)
}

fn relational_search(config: &Config, pool: &SqlitePool) -> Arc<SearchService> {
    Arc::new(SearchService::new(
        VectorIndex::new(&config.index),
        pool.clone(),
    ))
}

// ============ End-to-end scenarios ============

#[tokio::test]
async fn test_answer_with_fragments() {
    let (_tmp, config, pool) = setup().await;
    seed_chunk(
        &pool,
        "git_guide_chunk_1",
        "Use `git branch <name>` to create a new branch.",
        Some(&[1.0, 0.0, 0.0]),
    )
    .await;
    seed_chunk(
        &pool,
        "git_guide_chunk_2",
        "Use `git checkout -b <name>` to create and switch at once.",
        Some(&[0.8, 0.0, 0.0]),
    )
    .await;

    let generator = RecordingGenerator::new("Gebruik `git branch <naam>`.");
    let search = relational_search(&config, &pool);
    let (pipeline, _) = make_pipeline(
        &config,
        pool,
        Arc::new(FixedEmbedder(vec![1.0, 0.0, 0.0])),
        generator.clone(),
        search,
    );

    let outcome = pipeline
        .process("How do I create a new branch in Git?", None)
        .await;

    assert_eq!(outcome.response, "Gebruik `git branch <naam>`.");
    assert_eq!(outcome.fragments.len(), 2);

    // Best dot product first, fields populated.
    assert_eq!(outcome.fragments[0].id, "git_guide_chunk_1");
    assert!(!outcome.fragments[0].title.is_empty());
    assert!(!outcome.fragments[0].path.is_empty());
    assert!(!outcome.fragments[0].content.is_empty());

    // The prompt carried the query and the concatenated fragment text.
    let prompts = generator.recorded_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("How do I create a new branch in Git?"));
    assert!(prompts[0].contains("Use `git branch <name>` to create a new branch."));
    assert!(prompts[0].contains("`git checkout -b <name>`"));
}

#[tokio::test]
async fn test_embedding_failure_short_circuits() {
    let (_tmp, config, pool) = setup().await;
    seed_chunk(&pool, "git_guide_chunk_1", "content", Some(&[1.0, 0.0])).await;

    let generator = RecordingGenerator::new("never used");
    let search = relational_search(&config, &pool);
    let (pipeline, _) = make_pipeline(
        &config,
        pool,
        Arc::new(FailingEmbedder),
        generator.clone(),
        search,
    );

    let outcome = pipeline.process("any query", None).await;

    assert_eq!(outcome.response, EMBEDDING_FAILED_REPLY);
    assert!(outcome.fragments.is_empty());
    assert!(generator.recorded_prompts().is_empty());
}

#[tokio::test]
async fn test_no_candidates_terminates_before_generation() {
    let (_tmp, config, pool) = setup().await;

    let generator = RecordingGenerator::new("never used");
    let search = relational_search(&config, &pool);
    let (pipeline, _) = make_pipeline(
        &config,
        pool,
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        generator.clone(),
        search,
    );

    let outcome = pipeline.process("any query", None).await;

    assert_eq!(outcome.response, NO_DOCUMENTATION_REPLY);
    assert!(outcome.fragments.is_empty());
    assert!(generator.recorded_prompts().is_empty());
}

#[tokio::test]
async fn test_unresolvable_candidates_terminate_before_generation() {
    let (_tmp, config, pool) = setup().await;

    let generator = RecordingGenerator::new("never used");
    let search = Arc::new(FixedCandidates(vec![
        FragmentRef::ChunkId("ghost_chunk_1".to_string()),
        FragmentRef::Path("missing/nowhere.txt".to_string()),
    ]));
    let (pipeline, _) = make_pipeline(
        &config,
        pool,
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        generator.clone(),
        search,
    );

    let outcome = pipeline.process("any query", None).await;

    assert_eq!(outcome.response, NO_CONTENT_REPLY);
    assert!(outcome.fragments.is_empty());
    assert!(generator.recorded_prompts().is_empty());
}

#[tokio::test]
async fn test_session_history_flows_through_prompt_and_log() {
    let (_tmp, config, pool) = setup().await;
    seed_chunk(&pool, "git_guide_chunk_1", "branch docs", Some(&[1.0, 0.0])).await;

    let generator = RecordingGenerator::new("Nieuw antwoord.");
    let search = relational_search(&config, &pool);
    let (pipeline, sessions) = make_pipeline(
        &config,
        pool,
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        generator.clone(),
        search,
    );

    let session_id = sessions.create_session().await.unwrap();
    sessions.append(&session_id, "user", "Eerdere vraag?").await;
    sessions.append(&session_id, "assistant", "Eerder antwoord.").await;

    let outcome = pipeline.process("Vervolgvraag?", Some(&session_id)).await;
    assert_eq!(outcome.response, "Nieuw antwoord.");

    // Prior turns appear in the prompt, in their original order.
    let prompts = generator.recorded_prompts();
    let user_pos = prompts[0].find("User: Eerdere vraag?").unwrap();
    let assistant_pos = prompts[0].find("Assistant: Eerder antwoord.").unwrap();
    assert!(user_pos < assistant_pos);

    // The new turn pair is appended after the prior ones.
    let history = sessions.history(&session_id).await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].role, "user");
    assert_eq!(history[2].content, "Vervolgvraag?");
    assert_eq!(history[3].role, "assistant");
    assert_eq!(history[3].content, "Nieuw antwoord.");
}

#[tokio::test]
async fn test_no_session_id_skips_logging() {
    let (_tmp, config, pool) = setup().await;
    seed_chunk(&pool, "git_guide_chunk_1", "branch docs", Some(&[1.0, 0.0])).await;

    let generator = RecordingGenerator::new("Antwoord.");
    let search = relational_search(&config, &pool);
    let (pipeline, _) = make_pipeline(
        &config,
        pool.clone(),
        Arc::new(FixedEmbedder(vec![1.0, 0.0])),
        generator.clone(),
        search,
    );

    pipeline.process("Vraag zonder sessie", None).await;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM session_messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    // No history block in the prompt either.
    assert!(!generator.recorded_prompts()[0].contains("Previous conversation:"));
}

// ============ Session store ============

#[tokio::test]
async fn test_new_session_has_empty_history() {
    let (_tmp, config, pool) = setup().await;
    let sessions = SessionStore::new(pool, config.session.ttl_secs);

    let session_id = sessions.create_session().await.unwrap();
    assert!(sessions.history(&session_id).await.is_empty());
}

#[tokio::test]
async fn test_appends_come_back_in_order_unmodified() {
    let (_tmp, config, pool) = setup().await;
    let sessions = SessionStore::new(pool, config.session.ttl_secs);
    let session_id = sessions.create_session().await.unwrap();

    sessions.append(&session_id, "user", "first  message ").await;
    sessions.append(&session_id, "assistant", "second\nmessage").await;
    sessions.append(&session_id, "user", "third").await;

    let history = sessions.history(&session_id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].content, "first  message ");
    assert_eq!(history[1].content, "second\nmessage");
    assert_eq!(history[2].content, "third");
    assert_eq!(history[0].role, "user");
    assert_eq!(history[1].role, "assistant");
}

#[tokio::test]
async fn test_expired_session_reads_empty_and_drops_appends() {
    let (_tmp, _config, pool) = setup().await;
    // Zero TTL: expired the moment it is created.
    let sessions = SessionStore::new(pool, 0);
    let session_id = sessions.create_session().await.unwrap();

    sessions.append(&session_id, "user", "too late").await;
    assert!(sessions.history(&session_id).await.is_empty());
}

#[tokio::test]
async fn test_unknown_session_reads_empty() {
    let (_tmp, config, pool) = setup().await;
    let sessions = SessionStore::new(pool, config.session.ttl_secs);
    assert!(sessions.history("no-such-session").await.is_empty());
}

// ============ Similarity search fallback ============

#[tokio::test]
async fn test_relational_fallback_ranks_by_dot_product() {
    let (_tmp, config, pool) = setup().await;
    seed_chunk(&pool, "git_guide_chunk_1", "weak match", Some(&[0.2, 0.0])).await;
    seed_chunk(&pool, "git_guide_chunk_2", "strong match", Some(&[0.9, 0.0])).await;
    seed_chunk(&pool, "git_guide_chunk_3", "not embedded", None).await;

    // No index host configured: candidates must come from the
    // relational store, best score first, unembedded chunks excluded.
    let search = relational_search(&config, &pool);
    let refs = search.candidates(&[1.0, 0.0], 10).await;

    assert_eq!(
        refs,
        vec![
            FragmentRef::ChunkId("git_guide_chunk_2".to_string()),
            FragmentRef::ChunkId("git_guide_chunk_1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_relational_fallback_respects_top_k() {
    let (_tmp, config, pool) = setup().await;
    for i in 0..5 {
        seed_chunk(
            &pool,
            &format!("git_guide_chunk_{}", i + 1),
            "content",
            Some(&[1.0 - 0.1 * i as f32, 0.0]),
        )
        .await;
    }

    let search = relational_search(&config, &pool);
    let refs = search.candidates(&[1.0, 0.0], 3).await;
    assert_eq!(refs.len(), 3);
}
