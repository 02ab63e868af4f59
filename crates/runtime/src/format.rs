//! Final-answer format checks.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use sb_domain::config::OutputFormat;

fn markdown_marker() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s{0,3}(#{1,6}\s|[-*+]\s|\d+\.\s|>\s|```)|\*\*[^*]+\*\*|\[[^\]]+\]\([^)]+\)|`[^`]+`")
            .ok()
    })
    .as_ref()
}

fn html_element() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>.*</([a-zA-Z][a-zA-Z0-9]*)\s*>").ok())
        .as_ref()
}

/// Strip a single surrounding ``` fence, if present.
fn unfence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line (```json).
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}

/// Whether `content` looks like `format`. `Text` accepts anything.
pub fn satisfies(format: OutputFormat, content: &str) -> bool {
    match format {
        OutputFormat::Text => true,
        OutputFormat::Json => serde_json::from_str::<Value>(unfence(content)).is_ok(),
        OutputFormat::Markdown => markdown_marker().map_or(true, |re| re.is_match(content)),
        OutputFormat::Html => html_element().map_or(true, |re| re.is_match(content)),
    }
}

/// Extra system line sent with the single re-prompt.
pub fn reprompt_line(format: OutputFormat) -> String {
    let shape = match format {
        OutputFormat::Json => "a single valid JSON document and nothing else",
        OutputFormat::Markdown => "Markdown",
        OutputFormat::Html => "HTML markup",
        OutputFormat::Text => "plain text",
    };
    format!(
        "Your previous answer was not in the required format. Reply again with the same \
         content formatted as {shape}."
    )
}
