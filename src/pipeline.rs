//! Query-processing pipeline.
//!
//! Sequences one chat request through its stages:
//!
//! ```text
//! EmbedQuery → SearchCandidates → ResolveContext → ResolveDisplayFragments
//!   → LoadHistory? → BuildPrompt → Generate → LogTurn? → Done
//! ```
//!
//! Each of the first three stages short-circuits to a fixed-text
//! response with an empty fragment list when it comes back empty or
//! fails; there is no retry and no partial credit. History loading and
//! turn logging run only when a session id is supplied. Service handles
//! are constructed by the caller and passed in, so tests can substitute
//! doubles for the remote backends.

use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::generation::{GeminiGenerator, Generator};
use crate::history::SessionStore;
use crate::index::VectorIndex;
use crate::models::Fragment;
use crate::prompt::{build_prompt, format_history};
use crate::resolver::FragmentResolver;
use crate::search::{CandidateSource, SearchService};

/// Fixed reply when the query cannot be embedded.
pub const EMBEDDING_FAILED_REPLY: &str = "Failed to generate embeddings for your query.";
/// Fixed reply when similarity search yields no candidates.
pub const NO_DOCUMENTATION_REPLY: &str = "No relevant documentation found for your query.";
/// Fixed reply when no candidate resolves to readable content.
pub const NO_CONTENT_REPLY: &str = "No relevant content found.";

/// The pair every query resolves to: a response text and the fragments
/// that supported it (empty whenever a stage short-circuited).
#[derive(Debug)]
pub struct ChatOutcome {
    pub response: String,
    pub fragments: Vec<Fragment>,
}

impl ChatOutcome {
    fn terminal(response: &str) -> Self {
        Self {
            response: response.to_string(),
            fragments: Vec::new(),
        }
    }
}

/// The orchestrator. One instance serves all requests; per-request state
/// lives on the stack of [`ChatPipeline::process`].
pub struct ChatPipeline {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    search: Arc<dyn CandidateSource>,
    resolver: FragmentResolver,
    sessions: Arc<SessionStore>,
    top_k: usize,
    fragment_limit: usize,
}

impl ChatPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        search: Arc<dyn CandidateSource>,
        resolver: FragmentResolver,
        sessions: Arc<SessionStore>,
        top_k: usize,
        fragment_limit: usize,
    ) -> Self {
        Self {
            embedder,
            generator,
            search,
            resolver,
            sessions,
            top_k,
            fragment_limit,
        }
    }

    /// Run one query through the pipeline.
    pub async fn process(&self, query: &str, session_id: Option<&str>) -> ChatOutcome {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                warn!("query embedding failed: {:#}", e);
                return ChatOutcome::terminal(EMBEDDING_FAILED_REPLY);
            }
        };
        debug!("embedded query into {} dimensions", vector.len());

        let refs = self.search.candidates(&vector, self.top_k).await;
        if refs.is_empty() {
            return ChatOutcome::terminal(NO_DOCUMENTATION_REPLY);
        }
        debug!("similarity search produced {} candidates", refs.len());

        let context = match self.resolver.concatenated_context(&refs).await {
            Some(context) => context,
            None => return ChatOutcome::terminal(NO_CONTENT_REPLY),
        };

        let fragments = self.resolver.display_fragments(&refs, self.fragment_limit).await;

        let history = match session_id {
            Some(id) => format_history(&self.sessions.history(id).await),
            None => String::new(),
        };

        let prompt = build_prompt(query, &context, &history);
        let response = self.generator.generate(&prompt).await;

        if let Some(id) = session_id {
            self.sessions.append(id, "user", query).await;
            self.sessions.append(id, "assistant", &response).await;
        }

        ChatOutcome {
            response,
            fragments,
        }
    }
}

/// Wire the pipeline and session store from configuration, using the
/// real remote adapters.
pub fn build_pipeline(config: &Config, pool: SqlitePool) -> (Arc<ChatPipeline>, Arc<SessionStore>) {
    let embedder = Arc::new(GeminiEmbedder::new(&config.model));
    let generator = Arc::new(GeminiGenerator::new(&config.model));
    let search = Arc::new(SearchService::new(VectorIndex::new(&config.index), pool.clone()));
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

    (Arc::new(pipeline), sessions)
}
