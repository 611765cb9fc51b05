//! Core data models used throughout voxrag.
//!
//! These types represent the data sources, documents, chunks, embedding
//! records, and retrieval results that flow through the ingestion and
//! retrieval pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RagError;

/// Free-form metadata attached to documents, chunks, and stored records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key holding the human-readable source label of a record.
pub const META_SOURCE: &str = "source";
/// Metadata key holding the owning data source id.
pub const META_DATA_SOURCE_ID: &str = "data_source_id";

// ═══════════════════════════════════════════════════════════════════════
// Data sources
// ═══════════════════════════════════════════════════════════════════════

/// Where a data source's raw content lives.
///
/// Only [`File`](DataSourceKind::File) and [`Directory`](DataSourceKind::Directory)
/// are loaded; the remaining kinds are accepted and produce no documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    File,
    Directory,
    Url,
    Database,
    Api,
}

/// Lifecycle state of a data source.
///
/// ```text
/// configured ──▶ processing ──▶ ready
///                     │
///                     └──────▶ error
///     ▲                                 (retry: any state → configured)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceStatus {
    Configured,
    Processing,
    Ready,
    Error,
}

impl DataSourceStatus {
    /// Whether a processing run has finished (successfully or not).
    pub fn is_terminal(self) -> bool {
        matches!(self, DataSourceStatus::Ready | DataSourceStatus::Error)
    }
}

/// State of the collection backing a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreStatus {
    Configured,
    Ready,
    Error,
}

macro_rules! string_enum {
    ($ty:ty, $err:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = RagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($variant),)+
                    other => Err(RagError::Store(format!(concat!("unknown ", $err, ": '{}'"), other))),
                }
            }
        }
    };
}

string_enum!(DataSourceKind, "data source kind", {
    DataSourceKind::File => "file",
    DataSourceKind::Directory => "directory",
    DataSourceKind::Url => "url",
    DataSourceKind::Database => "database",
    DataSourceKind::Api => "api",
});

string_enum!(DataSourceStatus, "data source status", {
    DataSourceStatus::Configured => "configured",
    DataSourceStatus::Processing => "processing",
    DataSourceStatus::Ready => "ready",
    DataSourceStatus::Error => "error",
});

string_enum!(VectorStoreStatus, "vector store status", {
    VectorStoreStatus::Configured => "configured",
    VectorStoreStatus::Ready => "ready",
    VectorStoreStatus::Error => "error",
});

/// User request to register a new data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceDescriptor {
    pub name: String,
    pub kind: DataSourceKind,
    /// Path, URL, or connection string depending on `kind`.
    pub location: String,
    /// Credentials or request headers for remote kinds.
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
}

/// A named origin of raw content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub kind: DataSourceKind,
    pub location: String,
    #[serde(default)]
    pub credentials: BTreeMap<String, String>,
    pub status: DataSourceStatus,
    /// Number of embedding records stored by the last successful run.
    pub document_count: u64,
    pub error_message: Option<String>,
    pub last_processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DataSource {
    pub fn from_descriptor(id: String, descriptor: DataSourceDescriptor) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: descriptor.name,
            kind: descriptor.kind,
            location: descriptor.location,
            credentials: descriptor.credentials,
            status: DataSourceStatus::Configured,
            document_count: 0,
            error_message: None,
            last_processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Registry row for the collection owned by one data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreRecord {
    pub id: String,
    pub name: String,
    pub data_source_id: String,
    pub collection_name: String,
    pub status: VectorStoreStatus,
    /// Approximate number of vectors in the collection.
    pub vector_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Deterministic collection name for a data source.
///
/// ```rust
/// use voxrag_core::models::collection_name_for;
///
/// assert_eq!(collection_name_for("7f3a-01"), "ds_7f3a_01");
/// ```
pub fn collection_name_for(data_source_id: &str) -> String {
    let sanitized: String = data_source_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("ds_{}", sanitized)
}

// ═══════════════════════════════════════════════════════════════════════
// Content kinds
// ═══════════════════════════════════════════════════════════════════════

/// File content kinds the loader can extract.
///
/// Dispatch on this enum replaces string switches on file extensions: the
/// loader matches it to pick an extractor and the chunker matches
/// [`ContentKind::chunk_strategy`] to pick a splitting policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Markdown,
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Csv,
    Json,
}

/// File extensions with an extractor, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "txt", "text", "md", "markdown", "pdf", "docx", "pptx", "xlsx", "csv", "json",
];

impl ContentKind {
    /// Resolve a content kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Result<Self, RagError> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(ContentKind::Text),
            "md" | "markdown" => Ok(ContentKind::Markdown),
            "pdf" => Ok(ContentKind::Pdf),
            "docx" => Ok(ContentKind::Docx),
            "pptx" => Ok(ContentKind::Pptx),
            "xlsx" => Ok(ContentKind::Xlsx),
            "csv" => Ok(ContentKind::Csv),
            "json" => Ok(ContentKind::Json),
            other => Err(RagError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Markdown => "markdown",
            ContentKind::Pdf => "pdf",
            ContentKind::Docx => "docx",
            ContentKind::Pptx => "pptx",
            ContentKind::Xlsx => "xlsx",
            ContentKind::Csv => "csv",
            ContentKind::Json => "json",
        }
    }

    /// Chunking policy for documents of this kind.
    pub fn chunk_strategy(&self) -> ChunkStrategy {
        match self {
            ContentKind::Csv => ChunkStrategy::Tabular,
            ContentKind::Json => ChunkStrategy::Structured,
            ContentKind::Text
            | ContentKind::Markdown
            | ContentKind::Pdf
            | ContentKind::Docx
            | ContentKind::Pptx
            | ContentKind::Xlsx => ChunkStrategy::Recursive,
        }
    }
}

/// Chunk splitting policy, recorded on every chunk as `chunk_strategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Fixed runs of raw lines (one line per table row).
    Tabular,
    /// Recursive splitter tuned for flattened key paths.
    Structured,
    /// Recursive splitter for free text.
    Recursive,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStrategy::Tabular => "tabular",
            ChunkStrategy::Structured => "structured",
            ChunkStrategy::Recursive => "recursive",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Pipeline units
// ═══════════════════════════════════════════════════════════════════════

/// One logical document produced by the loader. Lives for one pipeline run.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub data_source_id: String,
    /// Origin path of the file.
    pub path: String,
    /// Display label (the file name).
    pub source: String,
    pub content_kind: ContentKind,
    pub text: String,
}

impl Document {
    /// Metadata every chunk of this document inherits.
    pub fn base_metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        meta.insert(META_SOURCE.into(), self.source.clone().into());
        meta.insert(META_DATA_SOURCE_ID.into(), self.data_source_id.clone().into());
        meta.insert("path".into(), self.path.clone().into());
        meta.insert("content_kind".into(), self.content_kind.as_str().into());
        meta
    }
}

/// A fragment of a document; the unit of embedding and storage.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub metadata: Metadata,
}

/// The unit persisted to a vector store collection.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

impl EmbeddingRecord {
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            text: chunk.text.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

/// A stored record without its vector, as returned by a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredText {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
}

/// A nearest-neighbor hit. Lower `distance` is better (cosine distance).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub distance: f32,
}

// ═══════════════════════════════════════════════════════════════════════
// Retrieval output
// ═══════════════════════════════════════════════════════════════════════

/// Which retrieval tier produced a context chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPath {
    Semantic,
    Fuzzy,
}

/// A labeled chunk ready for prompt injection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextChunk {
    pub content: String,
    pub source: String,
    pub data_source_id: String,
    /// Similarity in `[0, 1]`-ish terms: `1 - distance` on the semantic
    /// path, the fuzzy score on the fuzzy path.
    pub score: f32,
    pub path: RetrievalPath,
}

/// Diagnostic sample of a collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionPeek {
    pub count: u64,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_str() {
        for s in [
            DataSourceStatus::Configured,
            DataSourceStatus::Processing,
            DataSourceStatus::Ready,
            DataSourceStatus::Error,
        ] {
            assert_eq!(s.as_str().parse::<DataSourceStatus>().unwrap(), s);
        }
        assert!("bogus".parse::<VectorStoreStatus>().is_err());
    }

    #[test]
    fn extension_dispatch() {
        assert_eq!(ContentKind::from_extension("CSV").unwrap(), ContentKind::Csv);
        assert_eq!(ContentKind::from_extension("md").unwrap(), ContentKind::Markdown);
        assert_eq!(
            ContentKind::Json.chunk_strategy(),
            ChunkStrategy::Structured
        );
        assert_eq!(ContentKind::Pdf.chunk_strategy(), ChunkStrategy::Recursive);

        match ContentKind::from_extension("exe") {
            Err(RagError::UnsupportedFormat(ext)) => assert_eq!(ext, "exe"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn every_supported_extension_resolves() {
        for ext in SUPPORTED_EXTENSIONS {
            assert!(ContentKind::from_extension(ext).is_ok(), "{}", ext);
        }
    }

    #[test]
    fn collection_names_are_deterministic() {
        assert_eq!(collection_name_for("abc"), collection_name_for("abc"));
        assert_ne!(collection_name_for("abc"), collection_name_for("abd"));
    }

    #[test]
    fn document_metadata_carries_attribution() {
        let doc = Document {
            id: "d1".into(),
            data_source_id: "src-1".into(),
            path: "/tmp/people.csv".into(),
            source: "people.csv".into(),
            content_kind: ContentKind::Csv,
            text: String::new(),
        };
        let meta = doc.base_metadata();
        assert_eq!(meta[META_SOURCE], "people.csv");
        assert_eq!(meta[META_DATA_SOURCE_ID], "src-1");
        assert_eq!(meta["content_kind"], "csv");
    }
}
