//! Anchor text and a bounded window of surrounding sentences for a link.
//!
//! Sentence splitting is purely syntactic: abbreviations, decimals and
//! quotations split imperfectly, which is accepted.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::dom::{DomTree, NodePath};

/// Block-level containers searched for the surrounding text.
const CONTAINER_TAGS: &[&str] = &["p", "div", "article", "section", "li"];

const FALLBACK_CHARS: usize = 300;
const MAX_CONTEXT_CHARS: usize = 500;
const SENTENCES_BEFORE: usize = 2;
const SENTENCES_AFTER: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContext {
    pub anchor_text: String,
    pub surrounding_context: String,
    pub success: bool,
}

impl ExtractedContext {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Find the link element for `target`: the last-interacted link if it points
/// there, otherwise the first anchor in the document that does.
pub fn resolve_link(doc: &DomTree, last: Option<&NodePath>, target: &str) -> Option<NodePath> {
    let canonical = Url::parse(target).map(String::from).ok();
    let matches = |addr: &str| addr == target || canonical.as_deref() == Some(addr);

    if let Some(path) = last {
        if doc.link_address(path).is_some_and(|addr| matches(&addr)) {
            return Some(path.clone());
        }
    }

    doc.links()
        .into_iter()
        .find(|(_, addr)| matches(addr))
        .map(|(path, _)| path)
}

pub fn extract_link_context(doc: &DomTree, last: Option<&NodePath>, target: &str) -> ExtractedContext {
    let Some(path) = resolve_link(doc, last, target) else {
        log::debug!("No link element found for {}", target);
        return ExtractedContext::empty();
    };
    let Some(link) = doc.node_at(&path) else {
        return ExtractedContext::empty();
    };

    ExtractedContext {
        anchor_text: link.text_content().trim().to_string(),
        surrounding_context: surrounding_text(doc, &path),
        success: true,
    }
}

/// Surrounding text for the link at `path`, taken from its nearest
/// block-level ancestor (or its parent when there is none).
pub fn surrounding_text(doc: &DomTree, path: &[usize]) -> String {
    let container = doc
        .root
        .closest_ancestor(path, CONTAINER_TAGS)
        .or_else(|| path.split_last().map(|(_, parent)| parent.to_vec()));
    let (Some(container), Some(link)) = (container.and_then(|c| doc.node_at(&c)), doc.node_at(path))
    else {
        return String::new();
    };

    surrounding_window(&container.text_content(), &link.text_content())
}

/// Up to two sentence fragments either side of the first occurrence of
/// `anchor_text`, joined with single spaces and cut to 500 characters. When
/// the anchor cannot be found the first 300 characters are returned instead.
pub fn surrounding_window(container_text: &str, anchor_text: &str) -> String {
    let full = container_text.trim();
    let anchor = anchor_text.trim();

    let Some(pos) = full.find(anchor) else {
        return truncate_chars(full, FALLBACK_CHARS).to_string();
    };

    let before = sentence_fragments(&full[..pos]);
    let after = sentence_fragments(&full[pos + anchor.len()..]);

    let mut parts: Vec<&str> = before
        .iter()
        .skip(before.len().saturating_sub(SENTENCES_BEFORE))
        .copied()
        .collect();
    parts.push(anchor);
    parts.extend(after.iter().take(SENTENCES_AFTER));

    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&joined, MAX_CONTEXT_CHARS).to_string()
}

/// Non-empty trimmed pieces between runs of `.`, `!` and `?`.
fn sentence_fragments(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parser::parse_html;

    const PAGE: &str = "https://example.com/blog/entry";

    #[test]
    fn window_keeps_neighbouring_fragments() {
        let ctx = surrounding_window("A. Link here is great. B.", "Link here");
        assert_eq!(ctx, "A Link here is great B");
        assert!(ctx.len() <= 500);
    }

    #[test]
    fn window_takes_last_two_before_and_first_two_after() {
        let text = "One. Two. Three. Four! The link. Five? Six. Seven.";
        assert_eq!(
            surrounding_window(text, "The link"),
            "Three Four The link Five Six"
        );
    }

    #[test]
    fn missing_anchor_falls_back_to_prefix() {
        let text = "x".repeat(400);
        assert_eq!(surrounding_window(&text, "absent").len(), 300);
    }

    #[test]
    fn window_is_capped_at_500_chars() {
        let long = "word ".repeat(200);
        let text = format!("{long}. Anchor. {long}.");
        let ctx = surrounding_window(&text, "Anchor");
        assert_eq!(ctx.chars().count(), 500);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "é".repeat(400);
        assert_eq!(surrounding_window(&text, "zzz").chars().count(), 300);
    }

    #[test]
    fn extracts_from_enclosing_paragraph() {
        let doc = parse_html(
            r#"<html><body><div><p>Intro here. Read <a href="/deep">the deep dive</a> today. Then rest.</p></div></body></html>"#,
            PAGE,
        );
        let ctx = extract_link_context(&doc, None, "https://example.com/deep");
        assert!(ctx.success);
        assert_eq!(ctx.anchor_text, "the deep dive");
        assert_eq!(ctx.surrounding_context, "Intro here Read the deep dive today Then rest");
    }

    #[test]
    fn prefers_last_interacted_link_when_it_matches() {
        let doc = parse_html(
            r#"<html><body>
                <li>First mention <a href="/x">X</a>.</li>
                <li>Second mention <a href="/x">X</a>.</li>
            </body></html>"#,
            PAGE,
        );
        let links = doc.links();
        let second = links[1].0.clone();
        assert_eq!(resolve_link(&doc, Some(&second), "https://example.com/x"), Some(second.clone()));
        // A stale reference to another address falls back to the document scan.
        let first = links[0].0.clone();
        assert_eq!(resolve_link(&doc, None, "https://example.com/x"), Some(first));

        let ctx = extract_link_context(&doc, Some(&second), "https://example.com/x");
        assert!(ctx.surrounding_context.starts_with("Second mention"));
    }

    #[test]
    fn unknown_target_is_unsuccessful() {
        let doc = parse_html(r#"<html><body><p><a href="/a">a</a></p></body></html>"#, PAGE);
        let ctx = extract_link_context(&doc, None, "https://other.example/");
        assert_eq!(ctx, ExtractedContext::empty());
        assert!(!ctx.success);
    }

    #[test]
    fn non_canonical_target_still_matches() {
        let doc = parse_html(r#"<html><body><p><a href="https://example.com">home</a></p></body></html>"#, PAGE);
        assert!(resolve_link(&doc, None, "https://example.com").is_some());
    }

    #[test]
    fn context_serialises_camel_case() {
        let json = serde_json::to_value(ExtractedContext {
            anchor_text: "a".into(),
            surrounding_context: "b".into(),
            success: true,
        })
        .unwrap();
        assert_eq!(json["anchorText"], "a");
        assert_eq!(json["surroundingContext"], "b");
    }
}
