//! Compilation stage: render a finished [`WriterResult`] into documents.
//!
//! The built-in [`MarkdownRenderer`] writes one self-contained Markdown
//! plan per run. PDF output needs an external rendering backend and is
//! reported as a compilation error until one is wired in.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result as AnyResult};
use chrono::Utc;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::indexer::sanitize_identifier;
use crate::models::{CompilerResult, WriterResult};

/// Trait for document renderers.
pub trait DocumentRenderer: Send + Sync {
    /// Render the requested formats under `output_dir` and report the
    /// produced paths.
    fn render(
        &self,
        result: &WriterResult,
        output_dir: &Path,
        formats: &[String],
    ) -> AnyResult<CompilerResult>;
}

/// Run the compilation stage.
pub fn run_compiler(
    renderer: &dyn DocumentRenderer,
    result: &WriterResult,
    output_dir: &Path,
    formats: &[String],
) -> Result<CompilerResult> {
    let compiled = renderer
        .render(result, output_dir, formats)
        .map_err(|e| PipelineError::compilation(format!("{:#}", e)))?;

    info!(
        markdown = ?compiled.markdown_path,
        scripts = compiled.total_scripts,
        "plan compiled"
    );

    Ok(compiled)
}

// ============ Markdown renderer ============

/// Renders the content plan as a single Markdown document: cover header,
/// executive summary, calendar table, scripts grouped by week, and a
/// reference appendix.
#[derive(Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentRenderer for MarkdownRenderer {
    fn render(
        &self,
        result: &WriterResult,
        output_dir: &Path,
        formats: &[String],
    ) -> AnyResult<CompilerResult> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {}", output_dir.display()))?;

        let mut markdown_path = None;

        for format in formats {
            match format.as_str() {
                "markdown" | "md" => {
                    if markdown_path.is_none() {
                        let filename = format!(
                            "scriptorium_{}_{}_{}.md",
                            result.platform,
                            sanitize_identifier(&result.username),
                            Utc::now().format("%Y%m%d_%H%M%S")
                        );
                        let path = output_dir.join(filename);
                        let document = render_markdown(result);
                        std::fs::write(&path, document)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        markdown_path = Some(path);
                    }
                }
                "pdf" => {
                    bail!("PDF output requires an external document renderer; none is configured")
                }
                other => bail!("Unknown output format: {}", other),
            }
        }

        Ok(CompilerResult {
            markdown_path,
            pdf_path: None,
            platform: result.platform,
            username: result.username.clone(),
            total_scripts: result.scripts.len(),
        })
    }
}

fn render_markdown(result: &WriterResult) -> String {
    let calendar = &result.calendar;
    let config = &calendar.config;
    let mut doc = String::new();

    // Cover header
    let _ = writeln!(doc, "# Content Plan: @{}", result.username);
    let _ = writeln!(doc);
    let _ = writeln!(doc, "- Platform: {}", result.platform);
    let _ = writeln!(
        doc,
        "- Period: {} weeks, {} posts/week",
        config.period_weeks, config.posts_per_week
    );
    let _ = writeln!(doc, "- Start date: {}", config.start_date.format("%Y-%m-%d"));
    let _ = writeln!(doc, "- Generated: {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(doc);

    // Executive summary
    let _ = writeln!(doc, "## Executive Summary");
    let _ = writeln!(doc);
    if !calendar.strategy_summary.trim().is_empty() {
        let _ = writeln!(doc, "{}", calendar.strategy_summary.trim());
        let _ = writeln!(doc);
    }
    let total_briefs: u32 = calendar.pillar_distribution.values().sum();
    let _ = writeln!(doc, "Pillar distribution:");
    for (pillar, count) in &calendar.pillar_distribution {
        let percent = if total_briefs > 0 {
            (*count as f64 / total_briefs as f64) * 100.0
        } else {
            0.0
        };
        let _ = writeln!(
            doc,
            "- {}: {} posts ({:.0}%)",
            pillar.label(),
            count,
            percent
        );
    }
    let _ = writeln!(doc);

    // Calendar table
    let _ = writeln!(doc, "## Calendar");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "| # | Date | Pillar | Topic | Format |");
    let _ = writeln!(doc, "|---|------|--------|-------|--------|");
    for brief in &calendar.briefs {
        let _ = writeln!(
            doc,
            "| {} | {} | {} | {} | {} |",
            brief.day,
            brief.date.format("%Y-%m-%d"),
            brief.pillar.label(),
            brief.topic,
            brief.content_type
        );
    }
    let _ = writeln!(doc);

    // Scripts grouped by week
    let _ = writeln!(doc, "## Scripts");
    let mut current_week = 0;
    for script in &result.scripts {
        let week = (script.brief.day - 1) / 7 + 1;
        if week != current_week {
            current_week = week;
            let _ = writeln!(doc);
            let _ = writeln!(doc, "### Week {}", week);
        }
        let _ = writeln!(doc);
        let _ = writeln!(
            doc,
            "#### Day {}: {} ({})",
            script.brief.day,
            script.brief.topic,
            script.brief.date.format("%Y-%m-%d")
        );
        let _ = writeln!(doc);
        let _ = writeln!(
            doc,
            "Pillar: {} | Format: {}",
            script.brief.pillar.label(),
            script.brief.content_type
        );
        let _ = writeln!(doc);
        let _ = writeln!(doc, "**Hook:** {}", script.hook);
        for section in &script.sections {
            let _ = writeln!(doc);
            let _ = writeln!(doc, "**{}**", section.title);
            let _ = writeln!(doc);
            let _ = writeln!(doc, "{}", section.content);
            if !section.notes.trim().is_empty() {
                let _ = writeln!(doc);
                let _ = writeln!(doc, "> Production notes: {}", section.notes);
            }
        }
        if !script.cta.trim().is_empty() {
            let _ = writeln!(doc);
            let _ = writeln!(doc, "**CTA:** {}", script.cta);
        }
        if !script.retention_tips.is_empty() {
            let _ = writeln!(doc);
            let _ = writeln!(doc, "Retention tips:");
            for tip in &script.retention_tips {
                let _ = writeln!(doc, "- {}", tip);
            }
        }
        if let Some(justification) = &script.strategic_justification {
            if !justification.trim().is_empty() {
                let _ = writeln!(doc);
                let _ = writeln!(doc, "Strategic justification: {}", justification);
            }
        }
    }

    // Reference appendix, deduplicated in first-seen order
    let mut references: Vec<&str> = Vec::new();
    for brief in &calendar.briefs {
        for reference in &brief.reference_data {
            if !references.contains(&reference.as_str()) {
                references.push(reference);
            }
        }
    }
    if !references.is_empty() {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## Appendix: Reference Data");
        let _ = writeln!(doc);
        for reference in references {
            let _ = writeln!(doc, "- {}", reference);
        }
    }

    doc
}
