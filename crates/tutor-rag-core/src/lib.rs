//! # tutor-rag core
//!
//! Runtime-free logic for the tutor-rag assistant: segment and message
//! models, the recursive text splitter, the index-store abstraction, the
//! retrieval algorithm (nearest neighbours, threshold, dedup), and the
//! embedding/chat provider traits.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. The
//! application crate supplies the SQLite index, the HTTP providers, and
//! the on-disk registries.

pub mod chat;
pub mod chunk;
pub mod embedding;
pub mod models;
pub mod search;
pub mod store;
