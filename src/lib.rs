//! # tutor-rag
//!
//! A partitioned retrieval-augmented chat assistant. Documents are split
//! into segments, embedded, and stored in a local SQLite index tagged with
//! a partition (one per teacher). Chat turns retrieve context from the
//! active partition only.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Documents  │──▶│ Chunk+Embed │──▶│    SQLite    │
//! │ txt/md/docx │   │             │   │ segments+vec │
//! │     pdf     │   └─────────────┘   └──────┬───────┘
//! └─────────────┘                            │
//!                           ┌────────────────┤
//!                           ▼                ▼
//!                      ┌──────────┐    ┌───────────┐
//!                      │  search  │───▶│   chat    │
//!                      │ top-k+θ  │    │ + history │
//!                      └──────────┘    └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag partition add "Ms. Li"
//! rag ingest notes/ --partition "Ms. Li"
//! rag search "photosynthesis" --partition "Ms. Li"
//! rag chat --partition "Ms. Li"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`vector_store`] | Ingestion, retrieval, listing, export |
//! | [`sqlite_store`] | SQLite implementation of the index |
//! | [`partitions`] | Named partition registry |
//! | [`sources`] | Registry of ingested sources |
//! | [`ingest`] | File ingestion pipeline and split reports |
//! | [`extract`] | Text extraction (txt, md, docx, pdf) |
//! | [`embedding`] | HTTP embedding provider |
//! | [`chat`] | HTTP chat provider and chat sessions |
//! | [`export`] | Per-source segment export |
//! | [`shell`] | Interactive menu |

pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod partitions;
pub mod persist;
pub mod shell;
pub mod sources;
pub mod sqlite_store;
pub mod vector_store;
