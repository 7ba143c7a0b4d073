//! Writer stage: per-brief retrieval, generation with one retry, and the
//! placeholder fallback.
//!
//! A brief whose script cannot be parsed after two attempts degrades to a
//! fixed placeholder; raw model text never reaches the finished document.
//! The batch itself never aborts on a bad brief, so the result always
//! holds exactly one script per brief, in input order.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::generation::GenerationProvider;
use crate::models::{ContentBrief, ContentCalendar, Script, ScriptSection, WriterResult};
use crate::parse;
use crate::retrieval::{ContextAggregator, NO_NICHE_DATA};

const WRITER_SYSTEM: &str = "You write platform-native scripts in a \
first-person generic voice, never naming the creator. Open on the hook, \
place a pattern interrupt every few sections to reset attention, and end \
with a call to action aligned to the piece's pillar: virality asks for \
shares, authority asks for follows, sales points to the offer. Respond \
with a single JSON object and no surrounding prose.";

/// Number of generation attempts per brief before falling back.
const MAX_ATTEMPTS: u32 = 2;

/// Generate one script per brief, sequentially, preserving input order.
///
/// Retrieval failures abort the stage (unless the aggregator is in
/// degraded mode); generation and parse failures only ever degrade the
/// single brief being written.
pub async fn run_writer(
    generation: &dyn GenerationProvider,
    aggregator: &ContextAggregator<'_>,
    calendar: &ContentCalendar,
    collection: &str,
    template: Option<&str>,
    script_context_limit: usize,
) -> Result<WriterResult> {
    let mut scripts = Vec::with_capacity(calendar.briefs.len());

    for brief in &calendar.briefs {
        let script = generate_script(
            generation,
            aggregator,
            brief,
            collection,
            template,
            script_context_limit,
        )
        .await?;
        scripts.push(script);
    }

    info!(
        collection = %collection,
        scripts = scripts.len(),
        "scripts generated"
    );

    Ok(WriterResult {
        platform: calendar.platform,
        username: calendar.username.clone(),
        scripts,
        calendar: calendar.clone(),
    })
}

/// Generate a single script for `brief`.
///
/// Retries exactly once on a failed generation call or unparseable
/// response, then substitutes the placeholder. The only error this
/// returns is a retrieval failure.
pub async fn generate_script(
    generation: &dyn GenerationProvider,
    aggregator: &ContextAggregator<'_>,
    brief: &ContentBrief,
    collection: &str,
    template: Option<&str>,
    script_context_limit: usize,
) -> Result<Script> {
    let query = format!("{} {}", brief.topic, brief.angle);
    let context = aggregator
        .retrieve_for_query(collection, &query, script_context_limit)
        .await?;

    let prompt = build_prompt(brief, &context, template);

    for attempt in 1..=MAX_ATTEMPTS {
        let raw = match generation.generate(&prompt, WRITER_SYSTEM).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    day = brief.day,
                    attempt,
                    error = %format!("{:#}", e),
                    "generation call failed"
                );
                continue;
            }
        };

        match parse_script(&raw, brief) {
            Ok(script) => return Ok(script),
            Err(e) => {
                warn!(day = brief.day, attempt, error = %e, "script parse failed");
            }
        }
    }

    warn!(day = brief.day, "falling back to placeholder script");
    Ok(placeholder_script(brief))
}

fn build_prompt(brief: &ContentBrief, context: &str, template: Option<&str>) -> String {
    let context_block = if context.trim().is_empty() {
        NO_NICHE_DATA
    } else {
        context
    };

    let mut prompt = format!(
        "Write the full script for this scheduled piece.\n\n\
         BRIEF:\n\
         - Day {} ({})\n\
         - Pillar: {}\n\
         - Topic: {}\n\
         - Angle: {}\n\
         - Suggested hook: {}\n\
         - Objective: {}\n\
         - Format: {}\n\n\
         NICHE CONTEXT (patterns from the creator's own content):\n{}\n\n",
        brief.day,
        brief.date.format("%Y-%m-%d"),
        brief.pillar,
        brief.topic,
        brief.angle,
        brief.hook,
        brief.objective,
        brief.content_type,
        context_block
    );

    if let Some(template) = template {
        if !template.trim().is_empty() {
            prompt.push_str(&format!(
                "TEMPLATE (preserve this structure verbatim, inject new content):\n{}\n\n",
                template
            ));
        }
    }

    prompt.push_str(
        "Respond with a single JSON object of this shape:\n\
         {\"hook\": \"...\", \"sections\": [{\"title\": \"...\", \
         \"content\": \"...\", \"notes\": \"...\"}], \"cta\": \"...\", \
         \"retention_tips\": [\"...\"], \"strategic_justification\": \"...\"}\n\
         Write at least 3 sections.\n",
    );

    prompt
}

// ============ Response decoding ============

#[derive(Deserialize)]
struct ScriptPayload {
    #[serde(default)]
    hook: String,
    sections: Vec<SectionPayload>,
    #[serde(default)]
    cta: String,
    #[serde(default)]
    retention_tips: Vec<String>,
    #[serde(default)]
    strategic_justification: Option<String>,
}

#[derive(Deserialize)]
struct SectionPayload {
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    notes: String,
}

/// Decode a raw model response into a [`Script`].
///
/// List-valued `content`/`notes` fields are coalesced before typed
/// construction; a missing or empty hook falls back to the brief's
/// suggested hook. A script with zero sections counts as a parse failure.
fn parse_script(raw: &str, brief: &ContentBrief) -> Result<Script> {
    let mut value = parse::parse_value(raw).map_err(|e| PipelineError::writer(format!("{:#}", e)))?;
    parse::normalize_script_value(&mut value);

    let payload: ScriptPayload = serde_json::from_value(value)
        .map_err(|e| PipelineError::writer(format!("script shape mismatch: {}", e)))?;

    if payload.sections.is_empty() {
        return Err(PipelineError::writer("script contained no sections"));
    }

    let hook = if payload.hook.trim().is_empty() {
        brief.hook.clone()
    } else {
        payload.hook
    };

    Ok(Script {
        brief: brief.clone(),
        hook,
        sections: payload
            .sections
            .into_iter()
            .map(|s| ScriptSection {
                title: s.title,
                content: s.content,
                notes: s.notes,
            })
            .collect(),
        cta: payload.cta,
        retention_tips: payload.retention_tips,
        strategic_justification: payload.strategic_justification,
    })
}

fn placeholder_script(brief: &ContentBrief) -> Script {
    Script {
        brief: brief.clone(),
        hook: brief.hook.clone(),
        sections: vec![ScriptSection {
            title: "Generation failed".to_string(),
            content: "The generation backend did not return a usable script for this brief."
                .to_string(),
            notes: String::new(),
        }],
        cta: String::new(),
        retention_tips: Vec::new(),
        strategic_justification: None,
    }
}
