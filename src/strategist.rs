//! Strategy stage: niche research, pillar split, date scheduling, and
//! calendar generation.
//!
//! The calendar prompt embeds retrieved niche context, the computed pillar
//! targets, and the exact assigned dates. The response is decoded strictly:
//! a malformed calendar invalidates the whole run, so unlike the writer
//! there is no retry here.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::config::RetrievalConfig;
use crate::error::{PipelineError, Result};
use crate::generation::GenerationProvider;
use crate::models::{CalendarConfig, ContentBrief, ContentCalendar, IndexResult, Pillar};
use crate::parse;
use crate::retrieval::{ContextAggregator, NO_NICHE_DATA};

/// Fixed niche-exploration battery run before planning.
pub const NICHE_QUERIES: [&str; 5] = [
    "viral content patterns and high performing posts",
    "hooks and openers that grab attention",
    "audience engagement and comment themes",
    "recurring topics and content themes",
    "tone of voice and presentation style",
];

const STRATEGIST_SYSTEM: &str = "You are a content strategist who plans \
three-pillar calendars: virality content to grow reach, authority content \
to build trust, and sales content to convert. You ground every topic in \
the creator's observed niche patterns. Respond with a single JSON object \
and no surrounding prose.";

/// Target pillar counts for a calendar of `total` posts: 40% virality,
/// 30% authority, and the remainder sales, which absorbs rounding.
pub fn pillar_split(total: u32) -> (u32, u32, u32) {
    let virality = (total as f64 * 0.4).round() as u32;
    let authority = (total as f64 * 0.3).round() as u32;
    let sales = total - virality - authority;
    (virality, authority, sales)
}

/// Enumerate posting dates: walk forward one day at a time from the start
/// date, assigning a date while its week (days since start / 7) still has
/// room under `posts_per_week`, until `total_posts` dates are assigned.
pub fn schedule_dates(config: &CalendarConfig) -> Vec<NaiveDate> {
    let total = config.total_posts() as usize;
    let mut dates = Vec::with_capacity(total);
    let mut current = config.start_date;
    let mut week = 0i64;
    let mut assigned_in_week = 0u32;

    while dates.len() < total {
        let current_week = (current - config.start_date).num_days() / 7;
        if current_week != week {
            week = current_week;
            assigned_in_week = 0;
        }
        if assigned_in_week < config.posts_per_week {
            dates.push(current);
            assigned_in_week += 1;
        }
        current += chrono::Duration::days(1);
    }

    dates
}

/// Run the strategy stage: aggregate niche context, compute the schedule,
/// prompt the generation provider, and decode the calendar.
///
/// The returned pillar distribution is derived by counting each brief's
/// decoded pillar tag, never taken from the model's own summary.
///
/// # Errors
///
/// Retrieval failures surface as [`PipelineError::Retrieval`]; everything
/// else (transport, decode, brief count or day mismatch) is a
/// [`PipelineError::Strategy`].
pub async fn generate_calendar(
    generation: &dyn GenerationProvider,
    aggregator: &ContextAggregator<'_>,
    index: &IndexResult,
    config: &CalendarConfig,
    user_context: Option<&str>,
    retrieval: &RetrievalConfig,
) -> Result<ContentCalendar> {
    let niche_context = aggregator
        .retrieve(
            &index.collection_name,
            &NICHE_QUERIES,
            retrieval.per_query_limit,
            retrieval.max_snippets,
        )
        .await?;

    let dates = schedule_dates(config);
    let targets = pillar_split(config.total_posts());
    let prompt = build_prompt(index, config, &niche_context, user_context, &dates, targets);

    let raw = generation
        .generate(&prompt, STRATEGIST_SYSTEM)
        .await
        .map_err(|e| PipelineError::strategy(format!("{:#}", e)))?;

    let calendar = parse_calendar(&raw, index, config)?;

    info!(
        collection = %index.collection_name,
        briefs = calendar.briefs.len(),
        "calendar generated"
    );

    Ok(calendar)
}

fn build_prompt(
    index: &IndexResult,
    config: &CalendarConfig,
    niche_context: &str,
    user_context: Option<&str>,
    dates: &[NaiveDate],
    targets: (u32, u32, u32),
) -> String {
    let (virality, authority, sales) = targets;
    let total = config.total_posts();

    let context_block = if niche_context.trim().is_empty() {
        NO_NICHE_DATA
    } else {
        niche_context
    };

    let mut prompt = format!(
        "Plan a content calendar for @{} on {}.\n\n\
         NICHE CONTEXT (patterns observed in the creator's own content):\n{}\n\n",
        index.username, index.platform, context_block
    );

    if let Some(context) = user_context {
        if !context.trim().is_empty() {
            prompt.push_str(&format!("BRAND CONTEXT:\n{}\n\n", context));
        }
    }

    prompt.push_str(&format!(
        "SCHEDULE:\n\
         - Posts per week: {}\n\
         - Period: {} weeks\n\
         - Total posts: {}\n\n\
         PILLAR TARGETS:\n\
         - virality: {} posts\n\
         - authority: {} posts\n\
         - sales: {} posts\n\n\
         ASSIGNED DATES (use each exactly once, in order):\n",
        config.posts_per_week, config.period_weeks, total, virality, authority, sales
    ));

    for (i, date) in dates.iter().enumerate() {
        prompt.push_str(&format!("Day {}: {}\n", i + 1, date.format("%Y-%m-%d")));
    }

    prompt.push_str(&format!(
        "\nRespond with a single JSON object of this shape:\n\
         {{\"strategy_summary\": \"...\", \"briefs\": [{{\"day\": 1, \
         \"date\": \"YYYY-MM-DD\", \"pillar\": \"virality|authority|sales\", \
         \"topic\": \"...\", \"angle\": \"...\", \"hook\": \"...\", \
         \"objective\": \"...\", \"content_type\": \"...\", \
         \"reference_data\": [\"...\"]}}]}}\n\
         Produce exactly {} briefs, one per assigned date, matching the \
         pillar targets.\n",
        total
    ));

    prompt
}

// ============ Response decoding ============

#[derive(Deserialize)]
struct CalendarPayload {
    #[serde(default)]
    strategy_summary: String,
    briefs: Vec<BriefPayload>,
}

#[derive(Deserialize)]
struct BriefPayload {
    day: u32,
    date: String,
    pillar: String,
    topic: String,
    angle: String,
    hook: String,
    objective: String,
    #[serde(default = "default_brief_content_type")]
    content_type: String,
    #[serde(default)]
    reference_data: Vec<String>,
}

fn default_brief_content_type() -> String {
    "post".to_string()
}

/// Decode a raw model response into a [`ContentCalendar`], enforcing the
/// requested brief count and contiguous 1-based day numbering.
fn parse_calendar(raw: &str, index: &IndexResult, config: &CalendarConfig) -> Result<ContentCalendar> {
    let value =
        parse::parse_value(raw).map_err(|e| PipelineError::strategy(format!("{:#}", e)))?;
    let payload: CalendarPayload = serde_json::from_value(value)
        .map_err(|e| PipelineError::strategy(format!("calendar shape mismatch: {}", e)))?;

    let total = config.total_posts();
    if payload.briefs.len() != total as usize {
        return Err(PipelineError::strategy(format!(
            "expected {} briefs, model produced {}",
            total,
            payload.briefs.len()
        )));
    }

    let mut briefs = Vec::with_capacity(payload.briefs.len());
    for (i, brief) in payload.briefs.into_iter().enumerate() {
        if brief.day != i as u32 + 1 {
            return Err(PipelineError::strategy(format!(
                "briefs are not contiguous: position {} carries day {}",
                i + 1,
                brief.day
            )));
        }
        let date = NaiveDate::parse_from_str(&brief.date, "%Y-%m-%d").map_err(|e| {
            PipelineError::strategy(format!("day {} has invalid date '{}': {}", brief.day, brief.date, e))
        })?;
        let pillar = Pillar::from_str(&brief.pillar)
            .map_err(|e| PipelineError::strategy(format!("day {}: {}", brief.day, e)))?;

        briefs.push(ContentBrief {
            day: brief.day,
            date,
            pillar,
            topic: brief.topic,
            angle: brief.angle,
            hook: brief.hook,
            objective: brief.objective,
            content_type: brief.content_type,
            reference_data: brief.reference_data,
        });
    }

    // Distribution is counted from what was actually produced
    let mut pillar_distribution = BTreeMap::from([
        (Pillar::Virality, 0u32),
        (Pillar::Authority, 0u32),
        (Pillar::Sales, 0u32),
    ]);
    for brief in &briefs {
        *pillar_distribution.entry(brief.pillar).or_insert(0) += 1;
    }

    Ok(ContentCalendar {
        platform: index.platform,
        username: index.username.clone(),
        config: config.clone(),
        briefs,
        strategy_summary: payload.strategy_summary,
        pillar_distribution,
    })
}
