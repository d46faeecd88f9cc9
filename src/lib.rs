//! # doc-chat
//!
//! A retrieval-augmented chat backend for documentation Q&A.
//!
//! Doc-chat answers natural-language questions against an indexed
//! documentation corpus: a query is embedded, semantically similar
//! fragments are retrieved from a vector index (with relational and
//! filesystem fallbacks), and the query, retrieved context, and prior
//! conversation turns are assembled into a prompt for a remote
//! generation model. The answer is returned together with the
//! supporting fragments.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Query  │──▶│  Embedding    │──▶│ Vector index   │
//! └─────────┘   │  backend      │   │ (or SQLite     │
//!               └──────────────┘   │  fallback)     │
//!                                  └──────┬────────┘
//!                                         ▼
//!               ┌──────────────┐   ┌───────────────┐
//!               │  Generation   │◀──│ Fragment       │
//!               │  backend      │   │ resolution     │
//!               └──────┬───────┘   └───────────────┘
//!                      ▼
//!               ┌──────────────┐
//!               │ Response +    │
//!               │ fragments     │
//!               └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init                        # create database
//! docchat import docs/user_manual.md  # import a document
//! docchat chunk <document-id>         # slice it into chunks
//! docchat embed pending               # generate embeddings
//! docchat ask "How do I create a new branch in Git?"
//! docchat serve                       # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment credentials |
//! | [`models`] | Core data types |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`embedding`] | Embedding adapter and vector utilities |
//! | [`generation`] | Text-generation adapter |
//! | [`index`] | Vector index adapter |
//! | [`search`] | Similarity search with fallback chain |
//! | [`resolver`] | Fragment content resolution |
//! | [`history`] | Conversation history store |
//! | [`prompt`] | Prompt assembly |
//! | [`pipeline`] | Query-processing pipeline |
//! | [`server`] | HTTP API server |
//! | [`ingest`] | Document import and chunking commands |
//! | [`embed_cmd`] | Embedding backfill commands |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embed_cmd;
pub mod embedding;
pub mod generation;
pub mod history;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod resolver;
pub mod search;
pub mod server;
