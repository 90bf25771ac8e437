//! Reading the HTML fragments returned by the question endpoints.
//!
//! An answer looks like
//!
//! ```text
//! <p>answer body…</p>
//! <div class="thumbs-rating"> … data-message-id="…" … </div>
//! <small class="answer-meta" data-agent="finance" data-level="3">
//!     Answered by: Kofi (finance · Level 3)
//! </small>
//! ```
//!
//! Every part except the body is optional.

use regex::Regex;
use std::sync::LazyLock;

static META_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<small[^>]*class="answer-meta"([^>]*)>(.*?)</small>"#).unwrap()
});
static RATING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<div[^>]*class="thumbs-rating"[^>]*>.*?</div>"#).unwrap());
static ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-([a-z-]+)="([^"]*)""#).unwrap());
static MESSAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-message-id="([^"]+)""#).unwrap());
static ANSWERED_BY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Answered by:\s*([^(\n]+?)\s*\(").unwrap());
static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>|</p>|</div>|</li>|</h[1-6]>|</pre>").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<li[^>]*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n[ \t]*\n(\s*\n)+").unwrap());

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnswer {
    /// Answer body as plain text.
    pub text: String,
    /// The fragment exactly as received.
    pub html: String,
    /// Specialty of the agent that answered (`data-agent`).
    pub agent: Option<String>,
    pub level: Option<u32>,
    /// Display name from the "Answered by" line.
    pub agent_name: Option<String>,
    /// Id the backend expects back when the answer is rated.
    pub message_id: Option<String>,
    /// Text of the answer-meta line, e.g. "Answered by: Kofi (finance · Level 3)".
    pub meta_note: Option<String>,
}

pub fn parse_answer(fragment: &str) -> ParsedAnswer {
    let mut parsed = ParsedAnswer {
        html: fragment.to_string(),
        ..ParsedAnswer::default()
    };

    if let Some(caps) = MESSAGE_ID_RE.captures(fragment) {
        parsed.message_id = Some(caps[1].to_string());
    }

    if let Some(caps) = META_RE.captures(fragment) {
        for attr in ATTR_RE.captures_iter(&caps[1]) {
            match &attr[1] {
                "agent" => parsed.agent = Some(attr[2].to_string()).filter(|s| !s.is_empty()),
                "level" => parsed.level = attr[2].trim().parse().ok(),
                _ => {}
            }
        }
        let note = collapse_whitespace(&html_to_text(&caps[2]));
        if let Some(name) = ANSWERED_BY_RE.captures(&note) {
            parsed.agent_name = Some(name[1].trim().to_string());
        }
        if !note.is_empty() {
            parsed.meta_note = Some(note);
        }
    }

    let body = META_RE.replace_all(fragment, "");
    let body = RATING_RE.replace_all(&body, "");
    parsed.text = html_to_text(&body);
    parsed
}

/// Strip tags, keep line structure, and decode the common entities.
pub fn html_to_text(html: &str) -> String {
    let text = html.replace("\\n", "\n");
    let text = BREAK_RE.replace_all(&text, "\n");
    let text = BULLET_RE.replace_all(&text, "• ");
    let text = TAG_RE.replace_all(&text, "");
    let text = decode_entities(&text);

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANSWER: &str = r#"<p>Buy low, <b>sell</b> high.</p><p>Diversify &amp; rebalance.</p>
        <div class="thumbs-rating">
            Was this helpful?
            <span class="thumb-up" data-value="1" data-agent="finance" data-message-id="m-123" title="Helpful">👍</span>
            <span class="thumb-down" data-value="-1" data-agent="finance" data-message-id="m-123" title="Not helpful">👎</span>
        </div>
        <small class="answer-meta" data-agent="finance" data-level="3">
            Answered by: Kofi (finance · Level 3) · Read-only session (global learning only)
        </small>"#;

    #[test]
    fn test_full_answer() {
        let parsed = parse_answer(ANSWER);
        assert_eq!(parsed.agent.as_deref(), Some("finance"));
        assert_eq!(parsed.level, Some(3));
        assert_eq!(parsed.agent_name.as_deref(), Some("Kofi"));
        assert_eq!(parsed.message_id.as_deref(), Some("m-123"));
        assert_eq!(parsed.text, "Buy low, sell high.\nDiversify & rebalance.");
        assert!(parsed.meta_note.unwrap().starts_with("Answered by: Kofi"));
    }

    #[test]
    fn test_plain_text_answer() {
        let parsed = parse_answer("Please ask a question.");
        assert_eq!(parsed.text, "Please ask a question.");
        assert_eq!(parsed.agent, None);
        assert_eq!(parsed.message_id, None);
    }

    #[test]
    fn test_escaped_newlines_and_lists() {
        let text = html_to_text("Steps:\\n<ul><li>one</li><li>two</li></ul>");
        assert_eq!(text, "Steps:\n• one\n• two");
    }

    #[test]
    fn test_blank_runs_collapse() {
        let text = html_to_text("<p>a</p><br><br><br><p>b</p>");
        assert_eq!(text, "a\n\nb");
    }
}
