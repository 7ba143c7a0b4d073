//! Profile extraction: platform detection and the extraction provider seam.
//!
//! The pipeline's first stage turns a creator profile URL into an
//! [`ExtractionResult`]. Production scraping backends live behind the
//! [`ExtractionProvider`] trait; this crate ships [`JsonFileExtractor`],
//! which reads a JSON export of scraped items from disk so the pipeline
//! runs end-to-end without network scraping.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{ContentItem, ExtractionResult, Platform};

/// Trait for extraction providers.
///
/// `limit` caps the number of content items returned; providers truncate
/// rather than erroring when the source holds more.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Extract up to `limit` content items for the profile at `url`.
    async fn extract(&self, url: &str, limit: usize) -> Result<ExtractionResult>;
}

/// Detect the platform from a profile URL's hostname.
///
/// # Errors
///
/// Returns an error for unparseable URLs and for hosts that are not
/// YouTube, Instagram, or TikTok.
pub fn detect_platform(url: &str) -> Result<Platform> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL has no host: {}", url))?
        .to_ascii_lowercase();

    if host_matches(&host, "youtube.com") || host == "youtu.be" {
        Ok(Platform::Youtube)
    } else if host_matches(&host, "instagram.com") {
        Ok(Platform::Instagram)
    } else if host_matches(&host, "tiktok.com") {
        Ok(Platform::Tiktok)
    } else {
        bail!("Unsupported platform host: {}", host);
    }
}

fn host_matches(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Extract the username (handle) from a profile URL.
///
/// YouTube handles (`/@name`) have the `@` stripped; `/channel/<id>`,
/// `/c/<name>` and `/user/<name>` URLs yield the second path segment.
/// Instagram and TikTok use the first path segment. Falls back to
/// `"unknown"` when the path carries no usable segment.
pub fn extract_username(url: &str, platform: Platform) -> String {
    let Ok(parsed) = reqwest::Url::parse(url) else {
        return "unknown".to_string();
    };
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let Some(first) = segments.first() else {
        return "unknown".to_string();
    };

    match platform {
        Platform::Youtube => {
            if let Some(handle) = first.strip_prefix('@') {
                handle.to_string()
            } else if matches!(*first, "channel" | "c" | "user") {
                segments
                    .get(1)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            } else {
                first.to_string()
            }
        }
        Platform::Instagram | Platform::Tiktok => {
            first.trim_start_matches('@').to_string()
        }
    }
}

// ============ JSON File Provider ============

/// Extraction provider reading a JSON export from disk.
///
/// Accepts either a complete serialized [`ExtractionResult`] or a bare
/// array of [`ContentItem`]s. For a bare array the platform, username and
/// source URL are filled in from the profile URL and the extraction
/// timestamp is set to now.
pub struct JsonFileExtractor {
    path: PathBuf,
}

impl JsonFileExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ExtractionProvider for JsonFileExtractor {
    async fn extract(&self, url: &str, limit: usize) -> Result<ExtractionResult> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read items file {}", self.path.display()))?;

        let mut result = match serde_json::from_str::<ExtractionResult>(&raw) {
            Ok(result) => result,
            Err(_) => {
                let items: Vec<ContentItem> = serde_json::from_str(&raw).with_context(|| {
                    format!(
                        "{} is neither an extraction result nor an item array",
                        self.path.display()
                    )
                })?;
                let platform = detect_platform(url)?;
                ExtractionResult {
                    source_url: url.to_string(),
                    platform,
                    username: extract_username(url, platform),
                    items,
                    extracted_at: Utc::now(),
                }
            }
        };

        if result.items.len() > limit {
            result.items.truncate(limit);
        }

        Ok(result)
    }
}
