//! `[cite: url, url, ...]` directives.
//!
//! Directives are found left to right and each cleaned URL receives an
//! ordinal the first time it is seen; repeats reuse it.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

const LEADING_JUNK: &[char] = &[
    '"', '\'', '`', '<', '(', '[', '{', '\u{201C}', '\u{2018}', '\u{00AB}', '\u{300C}',
];
const TRAILING_JUNK: &[char] = &[
    '"', '\'', '`', '>', ')', ']', '}', '.', ',', ';', ':', '!', '?', '\u{201D}', '\u{2019}',
    '\u{00BB}', '\u{300D}', '\u{3002}', '\u{FF0C}',
];

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\[\s*cite\s*:([^\]]*)\]").expect("citation regex"))
}

/// First-seen URL numbering for one render (or several, if shared).
#[derive(Debug, Clone, Default)]
pub struct CitationIndex {
    ordinals: HashMap<String, usize>,
    order: Vec<String>,
}

impl CitationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordinal_for(&mut self, url: &str) -> usize {
        if let Some(&n) = self.ordinals.get(url) {
            return n;
        }
        self.order.push(url.to_string());
        let n = self.order.len();
        self.ordinals.insert(url.to_string(), n);
        n
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(ordinal, url)` in ordinal order.
    pub fn sources(&self) -> impl Iterator<Item = (usize, &str)> {
        self.order.iter().enumerate().map(|(i, url)| (i + 1, url.as_str()))
    }
}

/// Strip surrounding whitespace, leading quote/bracket characters and
/// trailing punctuation or closing-bracket artifacts.
pub fn clean_url(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(LEADING_JUNK)
        .trim_end_matches(TRAILING_JUNK)
        .trim()
        .to_string()
}

/// The cleaned, non-empty URLs of a directive body, in order.
pub fn split_urls(body: &str) -> Vec<String> {
    body.split(',')
        .map(clean_url)
        .filter(|url| !url.is_empty())
        .collect()
}

/// Ordinal of a `sourceN` link label.
pub fn citation_ordinal(label: &str) -> Option<usize> {
    let digits = label.strip_prefix("source")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Replace every directive with whatever `emit` builds from its numbered URLs.
pub fn replace_citations<F>(text: &str, index: &mut CitationIndex, mut emit: F) -> String
where
    F: FnMut(&[(usize, String)]) -> String,
{
    directive_regex()
        .replace_all(text, |caps: &Captures| emit(&number_urls(&caps[1], index)))
        .into_owned()
}

fn number_urls(body: &str, index: &mut CitationIndex) -> Vec<(usize, String)> {
    split_urls(body)
        .into_iter()
        .map(|url| (index.ordinal_for(&url), url))
        .collect()
}

/// Rewrite directives into space-joined `[sourceN](<url>)` markdown links.
pub fn expand_citations(text: &str, index: &mut CitationIndex) -> String {
    directive_regex()
        .replace_all(text, |caps: &Captures| {
            let links = number_urls(&caps[1], index)
                .iter()
                .map(|(n, url)| format!("[source{}](<{}>)", n, link_destination(url)))
                .collect::<Vec<_>>()
                .join(" ");
            let start = caps.get(0).map_or(0, |m| m.start());
            // "![" would start an image.
            if !links.is_empty() && text[..start].ends_with('!') {
                format!(" {}", links)
            } else {
                links
            }
        })
        .into_owned()
}

/// Make a URL safe inside a `<...>` link destination.
fn link_destination(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\\' => out.push_str("%5C"),
            c if c.is_whitespace() => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}
