//! Startup path: profile documents in, ready-to-query index out.

use std::sync::Arc;

use persona_core::config::PersonaConfig;
use persona_core::error::{PersonaError, Result};
use persona_core::traits::Embedder;

use crate::chunker::{ChunkConfig, RecursiveChunker};
use crate::index::{BuildOutcome, RetrievalIndex};
use crate::loader::{self, Document, DocumentFormat, Provenance};

/// Fail with `NotFound` unless both profile documents exist, resume first.
pub fn check_sources(config: &PersonaConfig) -> Result<()> {
    let resume_path = config.resume_path();
    let label = match loader::format_for(&resume_path) {
        DocumentFormat::Pdf => "Resume PDF",
        DocumentFormat::PlainText => "Resume file",
    };
    loader::ensure_exists(&resume_path, label)?;
    loader::ensure_exists(&config.summary_path(), "Summary file")
}

/// Load the resume and summary, chunk them, and build (or reuse) the index.
///
/// Both documents are checked before anything is embedded, so a missing
/// file fails fast without touching the network.
pub async fn build_profile_index(
    config: &PersonaConfig,
    embedder: Arc<dyn Embedder>,
    force: bool,
) -> Result<(RetrievalIndex, BuildOutcome)> {
    config.validate()?;
    check_sources(config)?;
    let resume_path = config.resume_path();
    let summary_path = config.summary_path();
    let resume_format = loader::format_for(&resume_path);

    // PDF extraction is CPU-bound.
    let documents: Vec<Document> = tokio::task::spawn_blocking(move || {
        let mut docs = loader::load_document(&resume_path, resume_format, Provenance::Resume)?;
        docs.extend(loader::load_document(
            &summary_path,
            DocumentFormat::PlainText,
            Provenance::Summary,
        )?);
        Ok::<_, PersonaError>(docs)
    })
    .await
    .map_err(|e| PersonaError::Other(format!("document loader panicked: {e}")))??;

    let chunk_config = ChunkConfig::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
    let chunks = RecursiveChunker::new(chunk_config).split_documents(&documents);
    tracing::info!(
        "📄 {} document(s) split into {} chunk(s)",
        documents.len(),
        chunks.len()
    );

    let mut index = RetrievalIndex::open(&config.index_dir(), &config.rag.collection, embedder)?;
    let outcome = index.build(&chunks, chunk_config, force).await?;
    Ok((index, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use persona_core::testing::FakeEmbedder;

    fn config_in(dir: &std::path::Path) -> PersonaConfig {
        let mut config = PersonaConfig::default();
        config.documents.base_dir = dir.to_string_lossy().into_owned();
        config.documents.resume_path = "me/resume.txt".into();
        config.rag.chunk_size = 120;
        config.rag.chunk_overlap = 20;
        config
    }

    fn write_profile(dir: &std::path::Path) {
        std::fs::create_dir_all(dir.join("me")).unwrap();
        std::fs::write(
            dir.join("me/summary.txt"),
            "I build reliable backend systems and enjoy teaching Rust.",
        )
        .unwrap();
        std::fs::write(
            dir.join("me/resume.txt"),
            "Experience\n\nStaff Engineer, Acme Payments, 2021 to present. \
             Led the ledger migration to Postgres.\n\nEducation\n\nBSc Computer Science.",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_build_profile_index_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path());
        let config = config_in(dir.path());
        let embedder = Arc::new(FakeEmbedder::default());

        let (index, outcome) = build_profile_index(&config, embedder.clone(), false)
            .await
            .unwrap();
        assert!(matches!(outcome, BuildOutcome::Built { .. }));
        assert!(index.len() >= 2);
        assert!(dir.path().join(".persona_index/index.db").exists());

        let hits = index.search("ledger postgres migration", 1).await.unwrap();
        assert_eq!(hits[0].chunk.provenance, Provenance::Resume);

        let (_, again) = build_profile_index(&config, embedder, false).await.unwrap();
        assert!(matches!(again, BuildOutcome::Reused { .. }));
    }

    #[tokio::test]
    async fn test_missing_resume_fails_before_embedding() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path());
        let mut config = config_in(dir.path());
        config.documents.resume_path = "me/missing.pdf".into();
        let embedder = Arc::new(FakeEmbedder::default());

        let err = build_profile_index(&config, embedder.clone(), false)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Resume PDF not found"));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_summary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_profile(dir.path());
        let mut config = config_in(dir.path());
        config.documents.summary_path = "me/nope.txt".into();

        let err = build_profile_index(&config, Arc::new(FakeEmbedder::default()), false)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PersonaError::NotFound { ref what, .. } if what == "Summary file"));
    }
}
