//! Vector store abstraction: SQLite-backed persistence plus an in-memory
//! double for tests.
//!
//! Collections are namespaces (one per scraped profile). A chunk lives in
//! exactly one collection and carries its embedding alongside the full
//! serialized [`Chunk`] payload. Search is brute-force cosine similarity
//! computed in Rust over all vectors in the collection, which is fine at
//! the scale of one creator profile.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::Chunk;

/// A search hit: similarity score plus the stored chunk.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: Chunk,
}

/// Trait for vector stores.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection already exists with a different
    /// dimensionality.
    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()>;

    /// Insert or replace chunks with their embeddings. `chunks` and
    /// `vectors` are positionally paired and must have equal length.
    async fn upsert(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()>;

    /// Return the `limit` most similar chunks, best first. An unknown
    /// collection yields no hits rather than an error.
    async fn search(&self, collection: &str, query: &[f32], limit: usize)
        -> Result<Vec<ScoredChunk>>;
}

// ============ SQLite store ============

/// Vector store persisting to the shared SQLite database.
pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, dims, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(dims as i64)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        let existing: i64 = sqlx::query_scalar("SELECT dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        if existing != dims as i64 {
            bail!(
                "Collection {} has dims {}, expected {}",
                name,
                existing,
                dims
            );
        }

        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "upsert got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let payload = serde_json::to_string(chunk)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, collection, kind, text, hash, payload, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    collection = excluded.collection,
                    kind = excluded.kind,
                    text = excluded.text,
                    hash = excluded.hash,
                    payload = excluded.payload,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&chunk.id)
            .bind(collection)
            .bind(chunk.kind.as_str())
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(&payload)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        // Fetch all vectors in the collection and score in Rust
        let rows = sqlx::query("SELECT payload, embedding FROM chunks WHERE collection = ?")
            .bind(collection)
            .fetch_all(&self.pool)
            .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in &rows {
            let payload: String = row.get("payload");
            let blob: Vec<u8> = row.get("embedding");
            let chunk: Chunk = serde_json::from_str(&payload)?;
            let score = cosine_similarity(query, &blob_to_vec(&blob));
            results.push(ScoredChunk { score, chunk });
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

// ============ In-memory store ============

struct MemoryCollection {
    dims: usize,
    entries: Vec<(Chunk, Vec<f32>)>,
}

/// In-memory vector store for tests and dry runs.
#[derive(Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunks currently held in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .map(|c| c.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, name: &str, dims: usize) -> Result<()> {
        let mut collections = self.collections.write().unwrap();
        match collections.get(name) {
            Some(existing) if existing.dims != dims => {
                bail!(
                    "Collection {} has dims {}, expected {}",
                    name,
                    existing.dims,
                    dims
                );
            }
            Some(_) => {}
            None => {
                collections.insert(
                    name.to_string(),
                    MemoryCollection {
                        dims,
                        entries: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "upsert got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut collections = self.collections.write().unwrap();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| anyhow::anyhow!("Collection {} does not exist", collection))?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            entry.entries.retain(|(existing, _)| existing.id != chunk.id);
            entry.entries.push((chunk.clone(), vector.clone()));
        }

        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().unwrap();
        let Some(entry) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut results: Vec<ScoredChunk> = entry
            .entries
            .iter()
            .map(|(chunk, vector)| ScoredChunk {
                score: cosine_similarity(query, vector),
                chunk: chunk.clone(),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}
