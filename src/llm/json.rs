//! Turning raw model output into [`Candidate`]s.
//!
//! Models wrap JSON in markdown fences or chatter around it, so extraction
//! tries fenced blocks first and then scans for the first parseable object.

use serde::Deserialize;

use crate::error::ProviderError;
use crate::orchestrator::Candidate;

/// Extract a JSON object from a response that may be wrapped in markdown.
///
/// Order: ` ```json ` fence, bare ` ``` ` fence starting with `{`, first
/// balanced object in the text, then the trimmed input unchanged.
pub fn extract_json(response: &str) -> String {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json")
        && let Some(end) = trimmed[start + 7..].find("```")
    {
        return trimmed[start + 7..start + 7 + end].trim().to_string();
    }

    if let Some(start) = trimmed.find("```")
        && let Some(end) = trimmed[start + 3..].find("```")
    {
        let inner = trimmed[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }

    if let Some(json_str) = find_valid_json_object(trimmed) {
        return json_str;
    }

    trimmed.to_string()
}

/// Try every `{` as a start position until one yields valid JSON.
fn find_valid_json_object(text: &str) -> Option<String> {
    for (start_idx, _) in text.match_indices('{') {
        let candidate = &text[start_idx..];

        if let Some(json_str) = extract_balanced_braces(candidate)
            && serde_json::from_str::<serde_json::Value>(&json_str).is_ok()
        {
            return Some(json_str);
        }
    }

    None
}

/// Slice up to the brace closing the first `{`, ignoring braces in strings.
fn extract_balanced_braces(text: &str) -> Option<String> {
    let mut depth = 0;
    let mut in_string = false;
    let mut escape_next = false;

    for (idx, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[..=idx].to_string());
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Debug, Deserialize)]
struct CommitMessages {
    messages: Vec<CommitMessage>,
}

/// One generated commit message.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitMessage {
    pub subject: String,
    pub body: Option<String>,
}

impl CommitMessage {
    /// Subject, blank line, body; subject only when the body is empty.
    pub fn format(&self) -> String {
        match self.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(body) => format!("{}\n\n{}", self.subject.trim(), body),
            None => self.subject.trim().to_string(),
        }
    }

    fn into_candidate(self) -> Candidate {
        let message = self.format();
        let long_description = match self.body.as_deref().map(str::trim) {
            Some(body) if !body.is_empty() => body.to_string(),
            _ => self.subject.trim().to_string(),
        };
        Candidate {
            message,
            short_description: self.subject.trim().to_string(),
            long_description,
        }
    }
}

/// Parse up to `limit` commit message candidates.
///
/// Falls back to treating plain text as a single message when the model
/// ignored the JSON contract. Duplicate subjects are dropped.
pub fn parse_commit_candidates(raw: &str, limit: usize) -> Result<Vec<Candidate>, ProviderError> {
    let json_str = extract_json(raw);
    let messages = match serde_json::from_str::<CommitMessages>(&json_str) {
        Ok(parsed) => parsed.messages,
        Err(e) if json_str.trim_start().starts_with('{') => {
            let truncated: String = raw.chars().take(200).collect();
            return Err(ProviderError::InvalidResponse(format!(
                "Could not parse commit messages: {e}. Response: {truncated}"
            )));
        }
        Err(_) => plain_text_message(raw).into_iter().collect(),
    };

    let mut candidates: Vec<Candidate> = Vec::new();
    for message in messages {
        if message.subject.trim().is_empty() {
            continue;
        }
        let candidate = message.into_candidate();
        if candidates
            .iter()
            .any(|c| c.short_description == candidate.short_description)
        {
            continue;
        }
        candidates.push(candidate);
        if candidates.len() == limit {
            break;
        }
    }

    if candidates.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(candidates)
}

fn plain_text_message(raw: &str) -> Option<CommitMessage> {
    let text = raw.trim().trim_matches('`').trim();
    let mut lines = text.lines();
    let subject = lines.next()?.trim().trim_matches('"').to_string();
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    Some(CommitMessage {
        subject,
        body: (!body.is_empty()).then_some(body),
    })
}

/// Wrap free-form review text, optionally prefixing the row with a file path.
pub fn parse_review_candidate(raw: &str, file: Option<&str>) -> Result<Candidate, ProviderError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let mut candidate = Candidate::new(text);
    if let Some(path) = file {
        candidate.short_description = format!("{path}: {}", candidate.short_description);
    }
    Ok(candidate)
}
