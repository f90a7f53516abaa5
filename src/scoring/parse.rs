//! Judge response parsing.
//!
//! Extraction order:
//! 1. `<result>...</result>` holding a bare number or a `{score, reasoning}` object.
//! 2. The first balanced `{...}` object in the text.
//! 3. The first decimal number in the text (full text kept as reasoning).
//!
//! Anything else is [`JudgeError::Unparseable`]; the caller records it as a
//! flagged zero score.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::judge::JudgeError;

static RESULT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<result>(.*?)</result>").expect("Invalid result tag regex")
});

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("Invalid number regex"));

/// Score extracted from a judge response, before clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub score: f64,
    pub reasoning: String,
}

/// Parse a raw judge response into a score and rationale.
pub fn parse_judge_response(raw: &str) -> Result<ParsedScore, JudgeError> {
    let trimmed = raw.trim();

    if let Some(caps) = RESULT_TAG.captures(trimmed) {
        let inner = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
        if let Some(score) = parse_finite(inner) {
            return Ok(ParsedScore {
                score,
                reasoning: trimmed.to_string(),
            });
        }
        if let Some(parsed) = extract_json(inner).and_then(|json| score_from_json(json, trimmed)) {
            return Ok(parsed);
        }
    }

    if let Some(parsed) = extract_json(trimmed).and_then(|json| score_from_json(json, trimmed)) {
        return Ok(parsed);
    }

    if let Some(score) = FIRST_NUMBER
        .find(trimmed)
        .and_then(|m| parse_finite(m.as_str()))
    {
        return Ok(ParsedScore {
            score,
            reasoning: trimmed.to_string(),
        });
    }

    Err(JudgeError::Unparseable {
        raw: raw.to_string(),
    })
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read `{score, reasoning}` from a JSON object; `score` may be a number or a
/// numeric string. Missing reasoning falls back to the full response.
fn score_from_json(json: &str, full_text: &str) -> Option<ParsedScore> {
    let value: Value = serde_json::from_str(json).ok()?;
    let obj = value.as_object()?;
    let score = match obj.get("score")? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite())?,
        Value::String(s) => parse_finite(s)?,
        _ => return None,
    };
    let reasoning = obj
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| full_text.to_string());
    Some(ParsedScore { score, reasoning })
}

/// Extract the first balanced JSON object from text, skipping braces inside
/// string literals.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let remainder = &text[start..];
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in remainder.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&remainder[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
