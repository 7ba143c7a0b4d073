//! Indexing stage: chunk extracted items, embed, and upsert into the
//! vector store.

use tracing::info;

use crate::chunk::chunk_item;
use crate::embedding::EmbeddingProvider;
use crate::error::{PipelineError, Result};
use crate::models::{ExtractionResult, IndexResult, Platform};
use crate::vector::VectorStore;

/// Chunks are embedded and upserted in batches of this size.
const UPSERT_BATCH: usize = 100;

/// Replace every character outside `[A-Za-z0-9_-]` with `_`. Used for
/// collection names and output filenames derived from usernames.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Collection name for a profile: `{platform}_{username}` with the
/// username sanitized.
pub fn collection_name(platform: Platform, username: &str) -> String {
    format!("{}_{}", platform.as_str(), sanitize_identifier(username))
}

/// Run the indexing stage.
///
/// Ensures the profile's collection exists with the provider's
/// dimensionality, chunks every item, and embeds/upserts in batches.
/// A profile with no chunkable text indexes zero chunks and is not an
/// error.
pub async fn run_indexer(
    embedding: &dyn EmbeddingProvider,
    store: &dyn VectorStore,
    extraction: &ExtractionResult,
    chunk_words: usize,
) -> Result<IndexResult> {
    let collection = collection_name(extraction.platform, &extraction.username);

    store
        .ensure_collection(&collection, embedding.dims())
        .await
        .map_err(|e| PipelineError::indexing(format!("{:#}", e)))?;

    let chunks: Vec<_> = extraction
        .items
        .iter()
        .flat_map(|item| chunk_item(item, chunk_words))
        .collect();

    for batch in chunks.chunks(UPSERT_BATCH) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding
            .embed(&texts)
            .await
            .map_err(|e| PipelineError::indexing(format!("{:#}", e)))?;
        store
            .upsert(&collection, batch, &vectors)
            .await
            .map_err(|e| PipelineError::indexing(format!("{:#}", e)))?;
    }

    info!(
        collection = %collection,
        chunks = chunks.len(),
        "indexed profile content"
    );

    Ok(IndexResult {
        collection_name: collection,
        chunks_indexed: chunks.len(),
        platform: extraction.platform,
        username: extraction.username.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;
    use crate::vector::InMemoryVectorStore;
    use anyhow::Result as AnyResult;
    use async_trait::async_trait;
    use chrono::Utc;

    struct TestEmbedding;

    #[async_trait]
    impl EmbeddingProvider for TestEmbedding {
        fn model_name(&self) -> &str {
            "test"
        }

        fn dims(&self) -> usize {
            4
        }

        async fn embed(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let len = t.len() as f32;
                    vec![len, 1.0, 0.0, 0.0]
                })
                .collect())
        }
    }

    fn youtube_item(transcript: &str) -> ContentItem {
        ContentItem {
            platform: Platform::Youtube,
            title: Some("A video".to_string()),
            description: "About things".to_string(),
            transcript: Some(transcript.to_string()),
            url: "https://www.youtube.com/watch?v=1".to_string(),
            views: Some(1000),
            likes: Some(50),
            comments: None,
            shares: None,
            hashtags: vec![],
            published_at: Some(Utc::now()),
            content_type: "video".to_string(),
            duration_secs: Some(60.0),
        }
    }

    fn instagram_item(description: &str) -> ContentItem {
        ContentItem {
            platform: Platform::Instagram,
            title: None,
            description: description.to_string(),
            transcript: None,
            url: "https://www.instagram.com/p/1/".to_string(),
            views: None,
            likes: Some(20),
            comments: None,
            shares: None,
            hashtags: vec!["travel".to_string()],
            published_at: None,
            content_type: "post".to_string(),
            duration_secs: None,
        }
    }

    #[test]
    fn test_collection_name_sanitizes_username() {
        assert_eq!(
            collection_name(Platform::Youtube, "Mr.Beast!"),
            "youtube_Mr_Beast_"
        );
        assert_eq!(
            collection_name(Platform::Tiktok, "plain_name-1"),
            "tiktok_plain_name-1"
        );
    }

    #[tokio::test]
    async fn test_run_indexer_counts_all_chunks() {
        let embedding = TestEmbedding;
        let store = InMemoryVectorStore::new();
        let extraction = ExtractionResult {
            source_url: "https://www.youtube.com/@tester".to_string(),
            platform: Platform::Youtube,
            username: "tester".to_string(),
            items: vec![youtube_item("some spoken words here"), {
                let mut item = youtube_item("");
                item.transcript = None;
                item
            }],
            extracted_at: Utc::now(),
        };

        let result = run_indexer(&embedding, &store, &extraction, 500)
            .await
            .unwrap();

        // Item one: metadata + transcript. Item two: metadata only (no
        // transcript to slice).
        assert_eq!(result.collection_name, "youtube_tester");
        assert_eq!(result.chunks_indexed, 3);
        assert_eq!(store.len("youtube_tester"), 3);
    }

    #[tokio::test]
    async fn test_run_indexer_skips_items_with_no_text() {
        let embedding = TestEmbedding;
        let store = InMemoryVectorStore::new();
        let extraction = ExtractionResult {
            source_url: "https://www.instagram.com/natgeo/".to_string(),
            platform: Platform::Instagram,
            username: "natgeo".to_string(),
            items: vec![instagram_item("nice view"), {
                let mut item = instagram_item("");
                item.hashtags.clear();
                item
            }],
            extracted_at: Utc::now(),
        };

        let result = run_indexer(&embedding, &store, &extraction, 500)
            .await
            .unwrap();

        assert_eq!(result.chunks_indexed, 1);
    }

    #[tokio::test]
    async fn test_run_indexer_zero_chunks_is_ok() {
        let embedding = TestEmbedding;
        let store = InMemoryVectorStore::new();
        let extraction = ExtractionResult {
            source_url: "https://www.instagram.com/empty/".to_string(),
            platform: Platform::Instagram,
            username: "empty".to_string(),
            items: vec![],
            extracted_at: Utc::now(),
        };

        let result = run_indexer(&embedding, &store, &extraction, 500)
            .await
            .unwrap();

        assert_eq!(result.chunks_indexed, 0);
        assert_eq!(store.len("instagram_empty"), 0);
    }
}
