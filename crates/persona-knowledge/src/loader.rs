//! Document ingestion: plain text and PDF loaders with provenance tags.

use std::path::{Path, PathBuf};

use persona_core::error::{PersonaError, Result};
use serde::{Deserialize, Serialize};

/// Which profile document a piece of text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Summary,
    Resume,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Summary => "summary",
            Provenance::Resume => "resume",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(Provenance::Summary),
            "resume" => Some(Provenance::Resume),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared on-disk format of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

/// Loaded text plus where it came from. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub provenance: Provenance,
    /// 1-based page for paginated sources.
    pub page: Option<u32>,
    pub source: PathBuf,
}

/// Retrieval unit: a bounded window of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub provenance: Provenance,
    pub page: Option<u32>,
}

/// Fail fast when a source document is missing.
pub fn ensure_exists(path: &Path, what: &str) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PersonaError::NotFound {
            what: what.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Load one file into documents tagged with `provenance`.
///
/// Plain text yields a single document. PDFs yield one document per
/// non-blank page, numbered from 1.
pub fn load_document(
    path: &Path,
    format: DocumentFormat,
    provenance: Provenance,
) -> Result<Vec<Document>> {
    ensure_exists(path, provenance_label(provenance, format))?;

    match format {
        DocumentFormat::PlainText => {
            let bytes = std::fs::read(path)?;
            let content = String::from_utf8(bytes).map_err(|e| {
                PersonaError::Document(format!("{} is not valid UTF-8: {e}", path.display()))
            })?;
            Ok(vec![Document {
                content,
                provenance,
                page: None,
                source: path.to_path_buf(),
            }])
        }
        DocumentFormat::Pdf => {
            let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| {
                PersonaError::Document(format!("Failed to read PDF {}: {e}", path.display()))
            })?;
            let docs = number_pages(pages)
                .into_iter()
                .map(|(page, content)| Document {
                    content,
                    provenance,
                    page: Some(page),
                    source: path.to_path_buf(),
                })
                .collect::<Vec<_>>();
            tracing::debug!("Loaded {} page(s) from {}", docs.len(), path.display());
            Ok(docs)
        }
    }
}

fn provenance_label(provenance: Provenance, format: DocumentFormat) -> &'static str {
    match (provenance, format) {
        (Provenance::Summary, _) => "Summary file",
        (Provenance::Resume, DocumentFormat::Pdf) => "Resume PDF",
        (Provenance::Resume, DocumentFormat::PlainText) => "Resume file",
    }
}

/// Pair each non-blank page with its 1-based page number.
fn number_pages(pages: Vec<String>) -> Vec<(u32, String)> {
    pages
        .into_iter()
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| (i as u32 + 1, page))
        .collect()
}

/// Guess the format from the file extension.
pub fn format_for(path: &Path) -> DocumentFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => DocumentFormat::Pdf,
        _ => DocumentFormat::PlainText,
    }
}
