//! Decides whether hover summaries are on for a page.
//!
//! Closed-world: a page is content-rich only when an explicit structural,
//! address or metadata signal says so. A per-domain user override, when
//! present, always wins.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dom::DomTree;
use crate::page::storage::LocalStorage;

const MAIN_TEXT_THRESHOLD: usize = 1000;
const OVERRIDE_KEY_PREFIX: &str = "usher_hover_override_";

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static pattern"))
        .collect()
}

/// Never content-rich, whatever else the page says.
static HARD_EXCLUDES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"^https?://[^/]*/?$",
        r"/pricing",
        r"/contact",
        r"/signin?",
        r"/signup",
        r"/login",
        r"/dashboard",
        r"/settings",
        r"/admin",
        r"/cart",
        r"/checkout",
    ])
});

static ARTICLE_URLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"/blog/",
        r"/article/",
        r"/news/",
        r"/post/",
        r"/story/",
        r"/guide/",
        r"/tutorial/",
        r"/docs/",
        r"/documentation/",
        r"[/.]wikipedia\.org/wiki/",
        r"[/.]medium\.com/@",
        r"\d{4}/\d{2}/\d{2}/",
    ])
});

/// Paths on which the toggle control is not offered.
static TOGGLE_HIDDEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(signin|signup|login|admin|dashboard)").expect("static pattern"));

pub fn is_hard_excluded(href: &str) -> bool {
    HARD_EXCLUDES.iter().any(|re| re.is_match(href))
}

pub fn is_article_url(href: &str) -> bool {
    ARTICLE_URLS.iter().any(|re| re.is_match(href))
}

/// Heuristic content-richness of the page. Signals short-circuit in order.
pub fn is_content_rich(doc: &DomTree) -> bool {
    let href = doc.url.as_str();
    if is_hard_excluded(href) {
        return false;
    }

    if doc.root.find_first(|n| n.is_element("article")).is_some() {
        return true;
    }

    let main = doc
        .root
        .find_first(|n| n.is_element("main") || n.attr("role") == Some("main"));
    if let Some((_, main)) = main {
        if main.text_content().trim().chars().count() > MAIN_TEXT_THRESHOLD {
            return true;
        }
    }

    if is_article_url(href) {
        return true;
    }

    if matches!(doc.meta_property("og:type"), Some("article") | Some("blog")) {
        return true;
    }

    doc.has_meta_property("article:published_time") || doc.has_meta_property("datePublished")
}

pub fn toggle_visible(path: &str) -> bool {
    !TOGGLE_HIDDEN.is_match(path)
}

/// Auto-detected flag plus optional user override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageClassification {
    pub auto_detected: bool,
    pub override_enabled: Option<bool>,
}

impl PageClassification {
    pub fn enabled(&self) -> bool {
        self.override_enabled.unwrap_or(self.auto_detected)
    }
}

/// Hover enablement for one page load: classified once at construction,
/// override persisted per hostname.
pub struct HoverPreference {
    storage: Arc<dyn LocalStorage>,
    hostname: String,
    classification: PageClassification,
}

impl HoverPreference {
    pub fn load(doc: &DomTree, storage: Arc<dyn LocalStorage>) -> Self {
        let hostname = doc.hostname();
        let override_enabled = read_override(storage.as_ref(), &hostname);
        Self {
            storage,
            hostname,
            classification: PageClassification {
                auto_detected: is_content_rich(doc),
                override_enabled,
            },
        }
    }

    pub fn classification(&self) -> PageClassification {
        self.classification
    }

    pub fn enabled(&self) -> bool {
        self.classification.enabled()
    }

    /// Persist `enabled` as this domain's override, or clear it with `None`.
    pub fn set_override(&mut self, enabled: Option<bool>) {
        write_override(self.storage.as_ref(), &self.hostname, enabled);
        self.classification.override_enabled = enabled;
    }

    /// Toggle-control click. The first click inverts auto-detection; later
    /// clicks flip the effective state. Returns the new effective state.
    pub fn toggle(&mut self) -> bool {
        let next = match self.classification.override_enabled {
            None => !self.classification.auto_detected,
            Some(_) => !self.enabled(),
        };
        self.set_override(Some(next));
        next
    }
}

pub fn override_key(hostname: &str) -> String {
    format!("{}{}", OVERRIDE_KEY_PREFIX, hostname)
}

/// Stored override for `hostname`. Anything other than `"true"` reads as off.
pub fn read_override(storage: &dyn LocalStorage, hostname: &str) -> Option<bool> {
    storage
        .get_item(&override_key(hostname))
        .map(|v| v == "true")
}

/// Persist or clear the override for `hostname`.
pub fn write_override(storage: &dyn LocalStorage, hostname: &str, enabled: Option<bool>) {
    let key = override_key(hostname);
    match enabled {
        Some(v) => storage.set_item(&key, if v { "true" } else { "false" }),
        None => storage.remove_item(&key),
    }
}
