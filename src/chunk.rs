//! Word-budget content chunker.
//!
//! Splits a [`ContentItem`]'s text into [`Chunk`]s of at most `max_words`
//! whitespace-delimited words. Transcript-bearing items produce one
//! metadata chunk (title + description) plus transcript chunks; single-post
//! items produce at most one post chunk (description + hashtags).
//!
//! Chunking is pure and never fails: items with no usable text simply
//! produce zero chunks, and no emitted chunk is ever empty after trimming.
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text for
//! staleness detection on re-index.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, ChunkKind, ContentItem};

/// Split one item into retrievable chunks.
pub fn chunk_item(item: &ContentItem, max_words: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    if item.platform.has_transcripts() {
        let mut metadata_parts: Vec<&str> = Vec::new();
        if let Some(title) = item.title.as_deref() {
            if !title.is_empty() {
                metadata_parts.push(title);
            }
        }
        if !item.description.is_empty() {
            metadata_parts.push(&item.description);
        }
        let metadata_text = metadata_parts.join("\n");
        if !metadata_text.trim().is_empty() {
            chunks.push(make_chunk(item, ChunkKind::Metadata, metadata_text.trim()));
        }

        if let Some(transcript) = item.transcript.as_deref() {
            for piece in split_words(transcript, max_words) {
                if !piece.trim().is_empty() {
                    chunks.push(make_chunk(item, ChunkKind::Transcript, piece.trim()));
                }
            }
        }
    } else {
        let mut parts: Vec<String> = Vec::new();
        if !item.description.is_empty() {
            parts.push(item.description.clone());
        }
        if !item.hashtags.is_empty() {
            let tags: Vec<String> = item.hashtags.iter().map(|t| format!("#{}", t)).collect();
            parts.push(tags.join(" "));
        }
        let post_text = parts.join("\n");
        if !post_text.trim().is_empty() {
            chunks.push(make_chunk(item, ChunkKind::Post, post_text.trim()));
        }
    }

    chunks
}

/// Split text into groups of at most `max_words` words.
///
/// Boundaries fall only between whitespace-delimited tokens, so no word is
/// ever broken. Text that already fits the budget is returned verbatim;
/// longer text is regrouped with single spaces.
fn split_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return vec![text.to_string()];
    }

    words
        .chunks(max_words)
        .map(|group| group.join(" "))
        .collect()
}

fn make_chunk(item: &ContentItem, kind: ChunkKind, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        text: text.to_string(),
        kind,
        hash,
        platform: item.platform,
        url: item.url.clone(),
        title: item.title.clone(),
        published_at: item.published_at,
        views: item.views,
        likes: item.likes,
        content_type: item.content_type.clone(),
    }
}
