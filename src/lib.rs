//! # voxrag
//!
//! A retrieval-augmented context engine built to survive speech-to-text
//! noise. Data sources (files and directories) are loaded, chunked,
//! embedded, and stored one collection per source; queries run a semantic
//! nearest-neighbor pass and fall back to edit-distance matching when
//! nothing is close enough.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker │──▶│ Embedder │──▶│ Vector store │
//! │ fs/ooxml │   │ 3 kinds │   │  batches │   │ 1 coll/source│
//! └──────────┘   └─────────┘   └──────────┘   └──────┬───────┘
//!                                                    │
//!                       ┌────────────────────────────┤
//!                       ▼                            ▼
//!                 ┌───────────┐               ┌─────────────┐
//!                 │ Semantic  │──(nothing)──▶ │ Fuzzy names │
//!                 └───────────┘               └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vrag init
//! vrag add people ./people.csv
//! vrag stores
//! vrag query <vector-store-id> "who is sarah chin"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | Text extraction per content kind |
//! | [`loader`] | Data source → documents |
//! | [`embedding`] | Providers and the batching generator |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`sqlite_config_store`] | SQLite configuration store |
//! | [`retrieve`] | Two-tier retrieval |
//! | [`service`] | Lifecycle controller and facade |
//! | [`commands`] | CLI command implementations |
//!
//! Runtime-free pieces (models, chunker, fuzzy matcher, storage traits)
//! live in the `voxrag-core` crate, re-exported as [`voxrag_core`].

pub use voxrag_core;

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod loader;
pub mod logging;
pub mod migrate;
pub mod retrieve;
pub mod service;
pub mod sqlite_config_store;
pub mod sqlite_store;
