//! Document loader: turns a data source into [`Document`]s.
//!
//! - **file**: the location is read and dispatched on its extension. Any
//!   failure (missing file, unsupported extension, broken content) is
//!   returned to the caller and fails the run.
//! - **directory**: the tree is walked in sorted order. Hidden entries and
//!   the default exclude globs are pruned, files without a supported
//!   extension or above `max_file_bytes` are skipped, and a file that fails
//!   to extract is logged and skipped. One bad file never aborts the
//!   directory.
//! - **url / database / api**: accepted, produce no documents.
//!
//! Loading is blocking file I/O; the service runs it on the blocking pool.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;
use voxrag_core::models::{ContentKind, DataSource, DataSourceKind, Document};
use voxrag_core::{RagError, RagResult};
use walkdir::{DirEntry, WalkDir};

use crate::config::LoaderConfig;
use crate::extract::extract_text;

const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Load every document a data source describes.
pub fn load_documents(source: &DataSource, config: &LoaderConfig) -> RagResult<Vec<Document>> {
    match source.kind {
        DataSourceKind::File => {
            let path = resolve_location(&source.location, config);
            Ok(vec![load_file(&source.id, &path)?])
        }
        DataSourceKind::Directory => {
            let root = resolve_location(&source.location, config);
            load_directory(&source.id, &root, config)
        }
        DataSourceKind::Url | DataSourceKind::Database | DataSourceKind::Api => {
            info!(
                source_id = %source.id,
                kind = %source.kind,
                "Loader not implemented for this kind; no documents"
            );
            Ok(Vec::new())
        }
    }
}

/// Relative locations resolve against `upload_dir` when one is configured.
pub fn resolve_location(location: &str, config: &LoaderConfig) -> PathBuf {
    let path = PathBuf::from(location);
    match &config.upload_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Read and extract one file.
pub fn load_file(data_source_id: &str, path: &Path) -> RagResult<Document> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = ContentKind::from_extension(&ext)?;

    if !path.is_file() {
        return Err(RagError::NotFound(path.display().to_string()));
    }
    let bytes = std::fs::read(path)?;
    let text = extract_text(&bytes, kind).map_err(|e| RagError::Extraction {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        data_source_id: data_source_id.to_string(),
        path: path.display().to_string(),
        source,
        content_kind: kind,
        text,
    })
}

fn load_directory(
    data_source_id: &str,
    root: &Path,
    config: &LoaderConfig,
) -> RagResult<Vec<Document>> {
    if !root.is_dir() {
        return Err(RagError::NotFound(root.display().to_string()));
    }
    let excludes = build_globset(DEFAULT_EXCLUDES)?;

    let mut documents = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if excludes.is_match(relative) {
            continue;
        }

        let supported = path
            .extension()
            .map(|e| ContentKind::from_extension(&e.to_string_lossy()).is_ok())
            .unwrap_or(false);
        if !supported {
            debug!(path = %path.display(), "Skipping unsupported file");
            continue;
        }

        if let Some(limit) = config.max_file_bytes {
            match entry.metadata() {
                Ok(meta) if meta.len() > limit => {
                    warn!(
                        path = %path.display(),
                        bytes = meta.len(),
                        limit,
                        "Skipping file above max_file_bytes"
                    );
                    continue;
                }
                _ => {}
            }
        }

        match load_file(data_source_id, path) {
            Ok(doc) => documents.push(doc),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping file"),
        }
    }

    info!(
        root = %root.display(),
        documents = documents.len(),
        "Loaded directory"
    );
    Ok(documents)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn build_globset(patterns: &[&str]) -> RagResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(RagError::store)?);
    }
    builder.build().map_err(RagError::store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use voxrag_core::models::DataSourceDescriptor;

    fn source(kind: DataSourceKind, location: &Path) -> DataSource {
        DataSource::from_descriptor(
            "src-1".into(),
            DataSourceDescriptor {
                name: "test".into(),
                kind,
                location: location.display().to_string(),
                credentials: Default::default(),
            },
        )
    }

    #[test]
    fn single_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        fs::write(&path, "name,role\nSarah Chen,Engineer\n").unwrap();

        let docs = load_documents(&source(DataSourceKind::File, &path), &LoaderConfig::default())
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "people.csv");
        assert_eq!(docs[0].data_source_id, "src-1");
        assert_eq!(docs[0].content_kind, ContentKind::Csv);
        assert_eq!(docs[0].text, "Row 1: name: Sarah Chen, role: Engineer");
    }

    #[test]
    fn unsupported_top_level_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tool.exe");
        fs::write(&path, [0u8, 1, 2]).unwrap();

        let err = load_documents(&source(DataSourceKind::File, &path), &LoaderConfig::default())
            .unwrap_err();
        match err {
            RagError::UnsupportedFormat(ext) => assert_eq!(ext, "exe"),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_documents(
            &source(DataSourceKind::File, &dir.path().join("gone.md")),
            &LoaderConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[test]
    fn directory_skips_bad_hidden_excluded_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("b.md"), "# B").unwrap();
        fs::write(root.join("nested/a.txt"), "alpha").unwrap();
        fs::write(root.join("broken.json"), "{not json").unwrap();
        fs::write(root.join("image.png"), [0u8; 4]).unwrap();
        fs::write(root.join(".secret.md"), "hidden").unwrap();
        fs::write(root.join(".cache/c.md"), "hidden too").unwrap();
        fs::write(root.join("node_modules/pkg/readme.md"), "vendored").unwrap();

        let docs = load_documents(
            &source(DataSourceKind::Directory, root),
            &LoaderConfig::default(),
        )
        .unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(names, vec!["b.md", "a.txt"]);
    }

    #[test]
    fn directory_respects_size_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("small.txt"), "tiny").unwrap();
        fs::write(dir.path().join("large.txt"), "x".repeat(4096)).unwrap();

        let config = LoaderConfig {
            upload_dir: None,
            max_file_bytes: Some(1024),
        };
        let docs = load_documents(&source(DataSourceKind::Directory, dir.path()), &config).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "small.txt");
    }

    #[test]
    fn relative_locations_use_upload_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "hello").unwrap();
        let config = LoaderConfig {
            upload_dir: Some(dir.path().to_path_buf()),
            max_file_bytes: None,
        };
        let mut src = source(DataSourceKind::File, Path::new("notes.md"));
        src.location = "notes.md".into();

        let docs = load_documents(&src, &config).unwrap();
        assert_eq!(docs[0].text, "hello");
    }

    #[test]
    fn remote_kinds_load_nothing() {
        for kind in [DataSourceKind::Url, DataSourceKind::Database, DataSourceKind::Api] {
            let docs = load_documents(
                &source(kind, Path::new("https://example.com")),
                &LoaderConfig::default(),
            )
            .unwrap();
            assert!(docs.is_empty());
        }
    }
}
