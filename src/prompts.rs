//! Prompt templates for batch dimension scoring.
//!
//! Domain logic for rendering scoring prompts. Provider-agnostic.

use crate::config::Dimension;
use crate::provider::SearchResult;
use crate::scoring::judge::PromptPayload;
use crate::scoring::ScoringSystem;

/// Snippets longer than this are cut before they reach the judge.
pub const SNIPPET_MAX_CHARS: usize = 300;

// =============================================================================
// Templates
// =============================================================================

const DEFAULT_SYSTEM: &str = r#"You are an expert search quality rater. You judge a complete list of search results returned for one query on a single evaluation dimension and give the list as a whole one score.

<dimension_name>{dimension_name}</dimension_name>
<dimension_description>
{dimension_description}
</dimension_description>

Use the {scale_name} ({min} to {max}):
{scale_levels}

Judge only this dimension. Consider every result in the list, not just the first one."#;

const USER_TEMPLATE: &str = r#"<query>
{query}
</query>

<results count="{result_count}">
{results}
</results>

Score the result list on {dimension_name} using integers from {min} to {max}.
Respond with <result>{"score": <integer>, "reasoning": "<one or two sentences>"}</result>"#;

// =============================================================================
// Rendering
// =============================================================================

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn scale_levels(system: ScoringSystem) -> String {
    system
        .level_descriptions()
        .iter()
        .map(|(value, meaning)| format!("- {value}: {meaning}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Structural placeholders shared by the rubric and the user prompt.
fn scale_placeholders(dimension: &Dimension, system: ScoringSystem) -> Vec<(&'static str, String)> {
    vec![
        ("dimension_name", escape_xml_chars(&dimension.name)),
        ("dimension_description", escape_xml_chars(&dimension.description)),
        ("scale_name", system.display_name().to_string()),
        ("scale_levels", scale_levels(system)),
        ("min", system.min().to_string()),
        ("max", system.max().to_string()),
    ]
}

/// Replace each `{name}` in `template` in a single left-to-right pass.
///
/// Inserted values are never rescanned, so a query or description that
/// itself contains `{results}` or `{max}` reaches the judge verbatim.
/// Unknown `{...}` sequences (such as the JSON answer format) are kept.
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open + 1..];
        let hit = values.iter().find_map(|(key, value)| {
            tail.strip_prefix(key)
                .and_then(|after| after.strip_prefix('}'))
                .map(|after| (value, after))
        });
        match hit {
            Some((value, after)) => {
                out.push_str(value);
                rest = after;
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Compact one-block-per-result listing of a result set.
pub fn render_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "(no results)".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(idx, r)| {
            let mut block = format!(
                "[{}] {}\nURL: {}\nSource: {}",
                idx + 1,
                escape_xml_chars(r.title.trim()),
                escape_xml_chars(r.url.trim()),
                escape_xml_chars(r.source.trim()),
            );
            if let Some(published) = r.published_time.as_deref() {
                block.push_str(&format!("\nPublished: {}", escape_xml_chars(published)));
            }
            block.push_str(&format!(
                "\nSnippet: {}",
                escape_xml_chars(&truncate_chars(r.snippet.trim(), SNIPPET_MAX_CHARS))
            ));
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Rubric for one dimension on one scale; `custom` replaces the default
/// template and may use the same placeholders.
pub fn render_rubric(dimension: &Dimension, system: ScoringSystem, custom: Option<&str>) -> String {
    let template = custom.unwrap_or(DEFAULT_SYSTEM);
    substitute(template, &scale_placeholders(dimension, system))
        .trim()
        .to_string()
}

/// Full `{system, user}` payload for one batch scoring call.
pub fn render_scoring_prompt(
    query: &str,
    results: &[SearchResult],
    dimension: &Dimension,
    system: ScoringSystem,
    custom: Option<&str>,
) -> PromptPayload {
    let mut values = scale_placeholders(dimension, system);
    values.push(("result_count", results.len().to_string()));
    values.push(("query", escape_xml_chars(query.trim())));
    values.push(("results", render_results(results)));
    let user = substitute(USER_TEMPLATE, &values);

    PromptPayload::Split {
        system: render_rubric(dimension, system, custom),
        user,
    }
}

// =============================================================================
// TESTS
// =============================================================================
