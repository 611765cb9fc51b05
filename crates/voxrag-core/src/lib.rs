//! # voxrag core
//!
//! Runtime-free logic for the voxrag context engine: data models, content
//! kinds, the chunker, the fuzzy matcher, the embedding trait, and the
//! storage traits (vector store + configuration store) with in-memory
//! implementations.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. The `voxrag`
//! application crate supplies loaders, network embedding providers, SQLite
//! backends, and the lifecycle/retrieval service on top of it.

pub mod chunk;
pub mod config_store;
pub mod embedding;
pub mod error;
pub mod fuzzy;
pub mod models;
pub mod store;

pub use error::{RagError, RagResult};
