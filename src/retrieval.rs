//! Context aggregation: turn retrieval queries into one deduplicated
//! context string for prompt building.

use tracing::warn;

use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::vector::VectorStore;

/// Separator between snippets in an aggregated context string.
const SNIPPET_SEPARATOR: &str = "\n---\n";

/// Substitute line prompt builders use when retrieval produced nothing.
pub(crate) const NO_NICHE_DATA: &str = "No specific niche data available.";

/// Aggregates search hits across queries into a single context string.
///
/// Snippets keep first-seen order: queries are processed in the order
/// given, hits in similarity order, and a snippet whose text exactly
/// matches one already collected is skipped. Collection stops at the
/// total cap.
///
/// By default a provider failure aborts the calling stage. In degraded
/// mode the failure is logged and an empty context returned instead, for
/// operators who prefer a blind-but-finished run.
pub struct ContextAggregator<'a> {
    embedding: &'a dyn EmbeddingProvider,
    store: &'a dyn VectorStore,
    degraded: bool,
}

impl<'a> ContextAggregator<'a> {
    pub fn new(embedding: &'a dyn EmbeddingProvider, store: &'a dyn VectorStore) -> Self {
        Self {
            embedding,
            store,
            degraded: false,
        }
    }

    pub fn with_degraded(
        embedding: &'a dyn EmbeddingProvider,
        store: &'a dyn VectorStore,
        degraded: bool,
    ) -> Self {
        Self {
            embedding,
            store,
            degraded,
        }
    }

    /// Run every query and join the deduplicated snippet texts with
    /// `\n---\n`. Returns an empty string when nothing was retrieved.
    pub async fn retrieve(
        &self,
        collection: &str,
        queries: &[&str],
        per_query_limit: usize,
        total_limit: usize,
    ) -> Result<String> {
        match self
            .retrieve_inner(collection, queries, per_query_limit, total_limit)
            .await
        {
            Ok(context) => Ok(context),
            Err(e) if self.degraded => {
                warn!(error = %e, "retrieval failed, continuing with empty context");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Single-query variant used by the writer for per-brief context.
    pub async fn retrieve_for_query(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<String> {
        self.retrieve(collection, &[query], limit, limit).await
    }

    async fn retrieve_inner(
        &self,
        collection: &str,
        queries: &[&str],
        per_query_limit: usize,
        total_limit: usize,
    ) -> Result<String> {
        let mut snippets: Vec<String> = Vec::new();

        'queries: for query in queries {
            if snippets.len() >= total_limit {
                break;
            }

            let vectors = self
                .embedding
                .embed(&[query.to_string()])
                .await
                .map_err(|e| PipelineError::retrieval(format!("{:#}", e)))?;
            let query_vector = vectors
                .into_iter()
                .next()
                .ok_or_else(|| PipelineError::retrieval("embedding returned no vector"))?;

            let hits = self
                .store
                .search(collection, &query_vector, per_query_limit)
                .await
                .map_err(|e| PipelineError::retrieval(format!("{:#}", e)))?;

            for hit in hits {
                if snippets.len() >= total_limit {
                    break 'queries;
                }
                if !snippets.iter().any(|s| *s == hit.chunk.text) {
                    snippets.push(hit.chunk.text);
                }
            }
        }

        Ok(snippets.join(SNIPPET_SEPARATOR))
    }
}
