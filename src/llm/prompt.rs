//! Prompt construction for commit messages and code reviews.

use crate::git::{ChangedFile, DiffSummary};
use crate::orchestrator::RequestContext;

/// Maximum length for sanitized diff text.
const MAX_DIFF_SANITIZED_LENGTH: usize = 30_000;

/// Phrases commonly used to hijack an instruction-following model.
const INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "disregard previous instructions",
    "ignore the above",
    "you are now",
    "new instructions:",
    "system prompt:",
];

/// A system/user prompt pair for one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

impl PromptPair {
    /// Single-string form for backends without a system role (CLI tools).
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Build the prompt asking for `ctx.generate` commit messages.
///
/// `custom` is the adapter's own prompt; the request-level prompt wins.
pub fn build_commit_prompt(ctx: &RequestContext, custom: Option<&str>) -> PromptPair {
    let system = match &ctx.system_prompt {
        Some(system) => system.clone(),
        None => default_commit_system_prompt(ctx),
    };
    let system = append_custom(system, ctx.prompt.as_deref().or(custom));

    let format_note = format!(
        r#"Respond with ONLY a JSON object (no markdown, no explanation):
{{"messages": [{{"subject": "...", "body": "..."}}]}}
Return exactly {} message(s). Use null for "body" when no body is needed."#,
        ctx.generate
    );

    PromptPair {
        system: format!("{system}\n\n{format_note}"),
        user: render_diff(&ctx.diff),
    }
}

/// Build the prompt for reviewing the whole diff in one call.
pub fn build_review_prompt(ctx: &RequestContext, custom: Option<&str>) -> PromptPair {
    PromptPair {
        system: review_system_prompt(ctx, custom),
        user: render_diff(&ctx.diff),
    }
}

/// Build the prompt for reviewing a single changed file.
pub fn build_file_review_prompt(
    ctx: &RequestContext,
    file: &ChangedFile,
    custom: Option<&str>,
) -> PromptPair {
    let patch = sanitize_diff(&file.patch, MAX_DIFF_SANITIZED_LENGTH);
    PromptPair {
        system: review_system_prompt(ctx, custom),
        user: format!(
            "## File\n{} ({})\n\n## Diff\n```\n{}\n```",
            file.path, file.status, patch
        ),
    }
}

fn default_commit_system_prompt(ctx: &RequestContext) -> String {
    let convention = match ctx.commit_type.as_deref() {
        Some("conventional") => {
            "Follow the Conventional Commits specification: `type(scope): description`, \
             where type is one of feat, fix, build, chore, ci, docs, style, refactor, perf, test."
        }
        Some("gitmoji") => {
            "Start the subject with a single gitmoji that matches the change \
             (for example :sparkles: for features, :bug: for fixes, :recycle: for refactors)."
        }
        _ => "Write a plain, descriptive subject line.",
    };

    format!(
        r#"You are generating Git commit messages for the staged changes below.

## Rules
- Language: {locale}
- {convention}
- Subject: imperative mood, no period at the end, at most {max_length} characters
- Body: explain WHY the change was made; the diff already shows WHAT changed
- Each message must describe the same change in a different way"#,
        locale = ctx.locale,
        max_length = ctx.max_length,
    )
}

fn review_system_prompt(ctx: &RequestContext, custom: Option<&str>) -> String {
    let base = format!(
        r#"You are reviewing a Git commit as an experienced engineer.

## Rules
- Language: {locale}
- Point out bugs, risky changes, missing error handling, and unclear naming
- Reference file names and lines when possible
- Suggest concrete improvements; skip praise and restating the diff
- Keep the first line a one-sentence summary of the most important finding"#,
        locale = ctx.locale,
    );
    append_custom(base, ctx.prompt.as_deref().or(custom))
}

fn append_custom(system: String, custom: Option<&str>) -> String {
    match custom.map(str::trim).filter(|c| !c.is_empty()) {
        Some(custom) => format!("{system}\n\n## Additional instructions\n{custom}"),
        None => system,
    }
}

fn render_diff(diff: &DiffSummary) -> String {
    let files_section: String = diff
        .changed_files
        .iter()
        .map(|f| format!("- {} ({})", f.path, f.status))
        .collect::<Vec<_>>()
        .join("\n");

    let sanitized_diff = sanitize_diff(&diff.diff_text, MAX_DIFF_SANITIZED_LENGTH);

    let truncation_note = if diff.truncated {
        "\n\nNote: The diff was truncated due to size. Focus on the visible changes."
    } else {
        ""
    };

    format!(
        "## Changed Files ({additions} additions, {deletions} deletions)\n{files_section}\n\n## Diff\n```\n{sanitized_diff}\n```{truncation_note}",
        additions = diff.additions,
        deletions = diff.deletions,
    )
}

/// Sanitize diff text for inclusion in an LLM prompt.
///
/// Removes control characters and ANSI escapes, filters known injection
/// phrases, collapses runs of blank lines, and truncates on a char boundary.
pub fn sanitize_diff(text: &str, max_len: usize) -> String {
    let mut result = remove_control_chars(text);
    result = remove_ansi_escapes(&result);
    result = filter_injection_patterns(&result);
    result = normalize_whitespace(&result);

    if result.len() > max_len {
        let mut end = max_len;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
    }

    result
}

fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\x1b')
        .collect()
}

fn remove_ansi_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI sequence: ESC [ params final-byte
            if chars.peek() == Some(&'[') {
                chars.next();
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn filter_injection_patterns(text: &str) -> String {
    let mut result = text.to_string();
    for pattern in INJECTION_PATTERNS {
        loop {
            let lower = result.to_lowercase();
            let Some(start) = lower.find(pattern) else {
                break;
            };
            // Lowercasing can change byte lengths; only splice on valid boundaries.
            let end = start + pattern.len();
            if !result.is_char_boundary(start) || !result.is_char_boundary(end) {
                break;
            }
            result.replace_range(start..end, "[filtered]");
        }
    }
    result
}

fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
