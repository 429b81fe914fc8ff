//! Interpretation of raw moderation backend output

use serde_json::Value;

use crate::error::{RelayError, Result};

/// What the backend decided about one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Broadcast the original content
    Pass,
    /// Broadcast this text instead
    Rewrite(String),
    /// Withhold the content, optionally with the backend's reason
    Censor(Option<String>),
}

/// Models like to wrap JSON answers in markdown fences
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.strip_suffix("```").unwrap_or(without_open).trim()
}

fn parse_json_verdict(body: &str) -> Result<Verdict> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RelayError::MalformedVerdict(format!("invalid JSON verdict: {}", e)))?;

    match value.get("safe").and_then(Value::as_bool) {
        Some(true) => match value.get("message").and_then(Value::as_str) {
            Some(message) => Ok(Verdict::Rewrite(message.to_string())),
            None => Ok(Verdict::Pass),
        },
        Some(false) => Ok(Verdict::Censor(
            value
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        )),
        None => Err(RelayError::MalformedVerdict(format!(
            "verdict has no boolean 'safe' field: {}",
            body
        ))),
    }
}

/// Accepts a JSON verdict, a bare SFW/NSFW answer, or replacement text
pub fn parse_verdict(raw: &str) -> Result<Verdict> {
    let body = strip_code_fence(raw);

    if body.is_empty() {
        return Err(RelayError::MalformedVerdict("empty response".to_string()));
    }
    if body.starts_with('{') {
        return parse_json_verdict(body);
    }
    if body.eq_ignore_ascii_case("NSFW") {
        return Ok(Verdict::Censor(None));
    }
    if body.eq_ignore_ascii_case("SFW") {
        return Ok(Verdict::Pass);
    }

    Ok(Verdict::Rewrite(body.to_string()))
}
