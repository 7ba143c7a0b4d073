//! Core data models for the content pipeline.
//!
//! These types represent the scraped items, chunks, calendars, and scripts
//! that flow through the five pipeline stages. Everything here serializes
//! with serde because the full pipeline state is checkpointed as JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Social platform a profile was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }

    /// Whether items from this platform carry transcripts. Transcript-bearing
    /// items are chunked into metadata + transcript chunks; the rest become a
    /// single post chunk.
    pub fn has_transcripts(&self) -> bool {
        matches!(self, Platform::Youtube)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "youtube" => Ok(Platform::Youtube),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            other => Err(format!("unknown platform: '{}'", other)),
        }
    }
}

/// One scraped post or video. Immutable once produced by extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub platform: Platform,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub transcript: Option<String>,
    pub url: String,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub comments: Option<u64>,
    #[serde(default)]
    pub shares: Option<u64>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

fn default_content_type() -> String {
    "post".to_string()
}

/// Everything scraped from one profile URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_url: String,
    pub platform: Platform,
    pub username: String,
    pub items: Vec<ContentItem>,
    pub extracted_at: DateTime<Utc>,
}

/// What kind of text a chunk carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Title + description of a transcript-bearing item.
    Metadata,
    /// A word-bounded slice of a transcript.
    Transcript,
    /// Description + hashtags of a single-post item.
    Post,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Metadata => "metadata",
            ChunkKind::Transcript => "transcript",
            ChunkKind::Post => "post",
        }
    }
}

/// The unit of retrievable text: a bounded span plus the originating item's
/// metadata flattened in for retrieval-time display.
///
/// Invariant: `text` is never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub kind: ChunkKind,
    /// SHA-256 of `text`, used for staleness checks on re-index.
    pub hash: String,
    pub platform: Platform,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub likes: Option<u64>,
    pub content_type: String,
}

/// Scheduling parameters for a calendar.
///
/// The total post count is always derived, never stored, so it cannot drift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub posts_per_week: u32,
    pub period_weeks: u32,
    pub start_date: NaiveDate,
}

impl CalendarConfig {
    pub fn new(posts_per_week: u32, period_weeks: u32, start_date: NaiveDate) -> Self {
        Self {
            posts_per_week,
            period_weeks,
            start_date,
        }
    }

    /// Total number of posts over the whole period.
    pub fn total_posts(&self) -> u32 {
        self.posts_per_week * self.period_weeks
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            posts_per_week: 3,
            period_weeks: 4,
            start_date: Utc::now().date_naive(),
        }
    }
}

/// The three content strategy categories every scheduled piece is tagged with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Pillar {
    Virality,
    Authority,
    Sales,
}

impl Pillar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pillar::Virality => "virality",
            Pillar::Authority => "authority",
            Pillar::Sales => "sales",
        }
    }

    /// Display label for rendered documents.
    pub fn label(&self) -> &'static str {
        match self {
            Pillar::Virality => "Virality",
            Pillar::Authority => "Authority",
            Pillar::Sales => "Sales",
        }
    }
}

impl fmt::Display for Pillar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pillar {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "virality" => Ok(Pillar::Virality),
            "authority" => Ok(Pillar::Authority),
            "sales" => Ok(Pillar::Sales),
            other => Err(format!("unknown pillar: '{}'", other)),
        }
    }
}

/// One scheduled piece of content, prior to script generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBrief {
    /// 1-based day index, contiguous across the calendar.
    pub day: u32,
    pub date: NaiveDate,
    pub pillar: Pillar,
    pub topic: String,
    pub angle: String,
    pub hook: String,
    pub objective: String,
    pub content_type: String,
    #[serde(default)]
    pub reference_data: Vec<String>,
}

/// A full scheduled calendar for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCalendar {
    pub platform: Platform,
    pub username: String,
    pub config: CalendarConfig,
    pub briefs: Vec<ContentBrief>,
    pub strategy_summary: String,
    /// Derived by counting each brief's pillar tag; values sum to the brief
    /// count. Never taken from the model's own summary.
    pub pillar_distribution: BTreeMap<Pillar, u32>,
}

/// Outcome of the indexing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexResult {
    pub collection_name: String,
    pub chunks_indexed: usize,
    pub platform: Platform,
    pub username: String,
}

/// One section of a finished script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    pub title: String,
    pub content: String,
    /// Production notes (camera, cuts, overlays). Empty when the model gave
    /// none.
    #[serde(default)]
    pub notes: String,
}

/// One finished piece, owning its brief by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub brief: ContentBrief,
    pub hook: String,
    pub sections: Vec<ScriptSection>,
    pub cta: String,
    #[serde(default)]
    pub retention_tips: Vec<String>,
    #[serde(default)]
    pub strategic_justification: Option<String>,
}

/// Outcome of the writer stage: exactly one script per brief, input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterResult {
    pub platform: Platform,
    pub username: String,
    pub scripts: Vec<Script>,
    pub calendar: ContentCalendar,
}

/// Outcome of the compilation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerResult {
    #[serde(default)]
    pub markdown_path: Option<PathBuf>,
    #[serde(default)]
    pub pdf_path: Option<PathBuf>,
    pub platform: Platform,
    pub username: String,
    pub total_scripts: usize,
}
