//! # Persona Knowledge
//!
//! Retrieval over the two profile documents.
//!
//! ## Pipeline
//! ```text
//! summary.txt ─┐                      ┌─ embed (Embedder) ─┐
//!              ├─ load ─ chunk ───────┤                    ├─ SQLite (index.db)
//! resume.pdf  ─┘   (Document)  (Chunk)└─ fingerprint ──────┘
//!
//! query(text, k) ─ embed ─ cosine distance over all chunks ─ top k
//! ```
//!
//! The index is built once at startup by a single owner, then shared
//! read-only behind an `Arc`.

pub mod chunker;
pub mod index;
pub mod loader;
pub mod pipeline;

pub use chunker::{ChunkConfig, RecursiveChunker};
pub use index::{BuildOutcome, RetrievalIndex, SearchHit, CHUNK_SEPARATOR};
pub use loader::{Chunk, Document, DocumentFormat, Provenance};
pub use pipeline::{build_profile_index, check_sources};
