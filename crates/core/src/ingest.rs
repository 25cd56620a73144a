use crate::chunking::Chunker;
use crate::embeddings::EmbedderAdapter;
use crate::error::IngestError;
use crate::extractor::{load_document_text, DocumentKind};
use crate::models::{EmbeddedChunk, IngestReport};
use crate::traits::VectorIndex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if DocumentKind::from_path(entry.path()).is_some() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Source names are paths relative to the ingested root, so re-ingesting the
/// same tree replaces rather than duplicates.
pub fn source_name_for(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).ok().filter(|rel| !rel.as_os_str().is_empty());
    match relative {
        Some(relative) => relative.to_string_lossy().replace('\\', "/"),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source_name: String,
    pub path: PathBuf,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct FolderLoad {
    pub documents: Vec<LoadedDocument>,
    pub skipped: Vec<SkippedDocument>,
}

/// Loads every supported document under `folder`. Unreadable files are
/// reported in `skipped` instead of failing the whole load.
pub fn load_folder(folder: &Path) -> Result<FolderLoad, IngestError> {
    let files = discover_documents(folder);
    if files.is_empty() {
        return Err(IngestError::NoDocuments(folder.display().to_string()));
    }

    let mut load = FolderLoad::default();
    for path in files {
        match load_document_text(&path) {
            Ok(text) => load.documents.push(LoadedDocument {
                source_name: source_name_for(&path, folder),
                path,
                text,
            }),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable document");
                load.skipped.push(SkippedDocument {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(load)
}

/// Chunks, embeds and stores one source. Empty text removes the source.
#[instrument(skip(chunker, embedder, index, raw_text), fields(chars = raw_text.len()))]
pub async fn ingest_text(
    chunker: &Chunker,
    embedder: &EmbedderAdapter,
    index: &dyn VectorIndex,
    source_name: &str,
    raw_text: &str,
) -> Result<IngestReport, IngestError> {
    let chunks = chunker.chunk(raw_text, source_name);
    let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
    debug!(chunks = chunks.len(), "embedding chunks");

    let vectors = embedder.embed(&texts).await?;
    let embedded: Vec<EmbeddedChunk> = chunks
        .into_iter()
        .zip(vectors)
        .map(|(chunk, vector)| EmbeddedChunk { chunk, vector })
        .collect();
    let chunk_count = embedded.len();

    index.upsert(source_name, embedded).await?;

    let report = IngestReport {
        source_name: source_name.to_string(),
        chunk_count,
        dimension: embedder.dimension().or(index.dimension()).unwrap_or(0),
        checksum: digest_text(raw_text),
    };
    info!(
        source = %report.source_name,
        chunks = report.chunk_count,
        dimension = report.dimension,
        "source ingested"
    );
    Ok(report)
}
