//! Retrieval index: chunk embeddings persisted in SQLite, searched by
//! cosine distance.
//!
//! Rows live in `<index_dir>/index.db`, keyed by collection name. A collection
//! remembers a fingerprint of the chunks, chunking parameters and embedding
//! model it was built from; rebuilding with identical inputs reuses the stored
//! vectors instead of calling the embedding API again.

use std::path::Path;
use std::sync::{Arc, Mutex};

use persona_core::error::{PersonaError, Result};
use persona_core::traits::Embedder;
use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::chunker::ChunkConfig;
use crate::loader::{Chunk, Provenance};

/// Placed between chunks in `query` output.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Texts per embedding request.
const EMBED_BATCH: usize = 64;

/// One retrieved chunk with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub distance: f32,
}

/// What `build` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Stored vectors matched the fingerprint; nothing was embedded.
    Reused { chunks: usize },
    /// The collection was (re)embedded and replaced.
    Built { chunks: usize },
}

struct IndexedChunk {
    position: usize,
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct RetrievalIndex {
    conn: Mutex<Connection>,
    collection: String,
    embedder: Arc<dyn Embedder>,
    entries: Vec<IndexedChunk>,
}

fn index_err(e: impl std::fmt::Display) -> PersonaError {
    PersonaError::Index(e.to_string())
}

impl RetrievalIndex {
    /// Open (or create) the index stored under `dir`.
    pub fn open(dir: &Path, collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| {
            PersonaError::Index(format!("Cannot create index dir {}: {e}", dir.display()))
        })?;
        let conn = Connection::open(dir.join("index.db")).map_err(index_err)?;
        Self::with_connection(conn, collection, embedder)
    }

    /// Volatile index, used by tests and one-off tooling.
    pub fn open_in_memory(collection: &str, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(index_err)?;
        Self::with_connection(conn, collection, embedder)
    }

    fn with_connection(
        conn: Connection,
        collection: &str,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                fingerprint TEXT NOT NULL,
                embedding_model TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL,
                built_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                position INTEGER NOT NULL,
                content TEXT NOT NULL,
                source TEXT NOT NULL,
                page INTEGER,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, position)
            );",
        )
        .map_err(index_err)?;

        let entries = load_entries(&conn, collection)?;
        if !entries.is_empty() {
            tracing::debug!(
                "Loaded {} cached chunk(s) for collection '{collection}'",
                entries.len()
            );
        }

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            embedder,
            entries,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fingerprint of everything that determines the stored vectors.
    pub fn fingerprint(chunks: &[Chunk], config: ChunkConfig, model_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update(config.chunk_size.to_le_bytes());
        hasher.update(config.chunk_overlap.to_le_bytes());
        for chunk in chunks {
            hasher.update(chunk.provenance.as_str().as_bytes());
            hasher.update(chunk.page.unwrap_or(0).to_le_bytes());
            hasher.update((chunk.text.len() as u64).to_le_bytes());
            hasher.update(chunk.text.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// Fingerprint recorded for this collection, if it was ever built.
    pub fn stored_fingerprint(&self) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(index_err)?;
        let mut stmt = conn
            .prepare("SELECT fingerprint FROM collections WHERE name = ?1")
            .map_err(index_err)?;
        let mut rows = stmt
            .query_map(rusqlite::params![self.collection], |row| row.get::<_, String>(0))
            .map_err(index_err)?;
        rows.next().transpose().map_err(index_err)
    }

    /// Embed `chunks` and replace the collection with them.
    ///
    /// Skips embedding when the stored fingerprint matches, unless `force`.
    /// Embedding failures leave the stored collection untouched.
    pub async fn build(
        &mut self,
        chunks: &[Chunk],
        config: ChunkConfig,
        force: bool,
    ) -> Result<BuildOutcome> {
        let fingerprint = Self::fingerprint(chunks, config, self.embedder.model_id());
        if !force && self.stored_fingerprint()?.as_deref() == Some(fingerprint.as_str()) {
            tracing::info!(
                "♻️ Reusing cached index '{}' ({} chunks)",
                self.collection,
                self.entries.len()
            );
            return Ok(BuildOutcome::Reused {
                chunks: self.entries.len(),
            });
        }

        tracing::info!(
            "🧮 Embedding {} chunk(s) for collection '{}'",
            chunks.len(),
            self.collection
        );
        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self.embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(PersonaError::Embedding(format!(
                    "expected {} vectors, got {}",
                    texts.len(),
                    embedded.len()
                )));
            }
            vectors.extend(embedded);
        }

        let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
        if vectors.iter().any(|v| v.len() != dimension) {
            return Err(PersonaError::Embedding("inconsistent vector dimensions".into()));
        }

        self.persist(chunks, &vectors, &fingerprint, dimension)?;

        self.entries = chunks
            .iter()
            .cloned()
            .zip(vectors)
            .enumerate()
            .map(|(position, (chunk, vector))| IndexedChunk {
                position,
                chunk,
                vector,
            })
            .collect();

        Ok(BuildOutcome::Built {
            chunks: self.entries.len(),
        })
    }

    fn persist(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
        fingerprint: &str,
        dimension: usize,
    ) -> Result<()> {
        let mut conn = self.conn.lock().map_err(index_err)?;
        let tx = conn.transaction().map_err(index_err)?;

        tx.execute(
            "DELETE FROM chunks WHERE collection = ?1",
            rusqlite::params![self.collection],
        )
        .map_err(index_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO chunks (collection, position, content, source, page, embedding)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )
                .map_err(index_err)?;
            for (position, (chunk, vector)) in chunks.iter().zip(vectors).enumerate() {
                stmt.execute(rusqlite::params![
                    self.collection,
                    position as i64,
                    chunk.text,
                    chunk.provenance.as_str(),
                    chunk.page.map(i64::from),
                    encode_vector(vector),
                ])
                .map_err(index_err)?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO collections
                (name, fingerprint, embedding_model, dimension, chunk_count, built_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                self.collection,
                fingerprint,
                self.embedder.model_id(),
                dimension as i64,
                chunks.len() as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .map_err(index_err)?;

        tx.commit().map_err(index_err)
    }

    /// The `k` nearest chunks in ascending distance order.
    /// An empty index answers with no hits and no embedding call.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_one(query).await?;
        let dimension = self.entries[0].vector.len();
        if query_vec.len() != dimension {
            return Err(PersonaError::Index(format!(
                "query vector has {} dimensions, index has {dimension}; rebuild the index",
                query_vec.len()
            )));
        }

        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|e| (cosine_distance(&query_vec, &e.vector), e))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.position.cmp(&b.1.position)));

        let hits: Vec<SearchHit> = scored
            .into_iter()
            .take(k)
            .map(|(distance, e)| SearchHit {
                chunk: e.chunk.clone(),
                distance,
            })
            .collect();
        tracing::debug!("Index search: {} hit(s) for {} chars of query", hits.len(), query.len());
        Ok(hits)
    }

    /// Top-`k` chunk texts joined with [`CHUNK_SEPARATOR`]. Empty when nothing matched.
    pub async fn query(&self, query: &str, k: usize) -> Result<String> {
        let hits = self.search(query, k).await?;
        Ok(hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR))
    }
}

fn load_entries(conn: &Connection, collection: &str) -> Result<Vec<IndexedChunk>> {
    let mut stmt = conn
        .prepare(
            "SELECT position, content, source, page, embedding
             FROM chunks WHERE collection = ?1 ORDER BY position",
        )
        .map_err(index_err)?;
    let rows = stmt
        .query_map(rusqlite::params![collection], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })
        .map_err(index_err)?;

    let mut entries = Vec::new();
    for row in rows {
        let (position, text, source, page, blob) = row.map_err(index_err)?;
        let provenance = Provenance::parse(&source)
            .ok_or_else(|| PersonaError::Index(format!("unknown chunk source '{source}'")))?;
        entries.push(IndexedChunk {
            position: position as usize,
            chunk: Chunk {
                text,
                provenance,
                page: page.map(|p| p as u32),
            },
            vector: decode_vector(&blob)?,
        });
    }
    Ok(entries)
}

/// 1 − cosine similarity. Zero vectors are maximally dissimilar.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na.sqrt() * nb.sqrt())
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(PersonaError::Index("corrupt embedding blob".into()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
