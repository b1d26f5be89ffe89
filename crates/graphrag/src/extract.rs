//! Text extraction for source documents (PDF, plain text, CSV).
//!
//! [`parse_document`] reads a file from disk and returns a
//! [`Document`] ready for chunking. CSV rows are rendered as a pretty JSON
//! array of header-keyed objects so the chunker sees one record per
//! object.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use graphrag_core::models::Document;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file path is required")]
    MissingPath,
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("file is outside the ingest root: {0}")]
    OutsideRoot(String),
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("CSV extraction failed: {0}")]
    Csv(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Pdf,
    Txt,
    Csv,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Txt => "txt",
            DocumentType::Csv => "csv",
        }
    }

    /// Infer the type from a `.pdf`, `.txt` or `.csv` extension (any case).
    pub fn from_extension(path: &Path) -> Result<Self, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        ext.parse()
            .map_err(|_| ExtractError::UnsupportedType(format!(".{}", ext)))
    }
}

impl FromStr for DocumentType {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(DocumentType::Pdf),
            "txt" => Ok(DocumentType::Txt),
            "csv" => Ok(DocumentType::Csv),
            other => Err(ExtractError::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read `path` and extract its text.
///
/// `doc_type` overrides extension-based detection. The document id is a
/// fresh `doc-<uuid>`; the title is the file name.
pub fn parse_document(path: &Path, doc_type: Option<DocumentType>) -> Result<Document, ExtractError> {
    if path.as_os_str().is_empty() {
        return Err(ExtractError::MissingPath);
    }
    if !path.exists() {
        return Err(ExtractError::NotFound(path.display().to_string()));
    }

    let doc_type = match doc_type {
        Some(t) => t,
        None => DocumentType::from_extension(path)?,
    };

    let bytes = std::fs::read(path)?;
    let content = extract_text(&bytes, doc_type)?;

    let mut metadata = Map::new();
    metadata.insert("size".to_string(), Value::from(bytes.len() as u64));
    metadata.insert(
        "file_path".to_string(),
        Value::String(path.display().to_string()),
    );
    metadata.insert(
        "extracted_at".to_string(),
        Value::String(chrono::Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "content_hash".to_string(),
        Value::String(content_hash(&bytes)),
    );

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(Document {
        id: format!("doc-{}", uuid::Uuid::new_v4()),
        title,
        content,
        content_type: doc_type.as_str().to_string(),
        metadata,
    })
}

/// Resolve `requested` against `root` and refuse anything that lands
/// outside it once symlinks and `..` are resolved.
///
/// `root` must already be canonical. Relative paths are taken relative
/// to `root`.
pub fn confine_to_root(root: &Path, requested: &Path) -> Result<PathBuf, ExtractError> {
    if requested.as_os_str().is_empty() {
        return Err(ExtractError::MissingPath);
    }
    let joined = root.join(requested);
    let resolved = joined
        .canonicalize()
        .map_err(|_| ExtractError::NotFound(requested.display().to_string()))?;
    if !resolved.starts_with(root) {
        return Err(ExtractError::OutsideRoot(requested.display().to_string()));
    }
    Ok(resolved)
}

/// Extract UTF-8 text from raw file bytes.
pub fn extract_text(bytes: &[u8], doc_type: DocumentType) -> Result<String, ExtractError> {
    match doc_type {
        DocumentType::Pdf => extract_pdf(bytes),
        DocumentType::Txt => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentType::Csv => extract_csv(bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

fn extract_csv(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| ExtractError::Csv(e.to_string()))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ExtractError::Csv(e.to_string()))?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(Value::Object(row));
    }

    serde_json::to_string_pretty(&rows).map_err(|e| ExtractError::Csv(e.to_string()))
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
