//! Markdown to HTML with pulldown-cmark.
//!
//! The event stream is rewritten before HTML generation:
//! - raw HTML (block or inline) becomes escaped text
//! - soft line breaks become `<br>`
//! - bare `http(s)://` and `www.` URLs in prose become links
//! - links labelled `sourceN` are emitted as citation anchors

use pulldown_cmark::{html, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::OnceLock;

use super::citations::{citation_ordinal, clean_url};

const URL_TRAILING_PUNCT: &[char] = &['.', ',', ';', ':', '!', '?', ']', '}', '\'', '"'];

fn bare_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"'`]+"#).expect("bare url regex")
    })
}

fn markdown_options() -> Options {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_SMART_PUNCTUATION);
    opts
}

/// Render markdown to (unsanitized) HTML.
pub(crate) fn markdown_to_html(markdown: &str) -> String {
    let events = rewrite_events(Parser::new_ext(markdown, markdown_options()));
    let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut html_output, events.into_iter());
    html_output
}

fn rewrite_events<'a>(parser: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut out = Vec::new();
    let mut link: Option<Vec<Event<'a>>> = None;
    // The parser splits prose at punctuation; URLs are only visible once merged.
    let mut prose = String::new();
    let mut code_block_depth = 0usize;

    for event in parser {
        let event = match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::SoftBreak => Event::HardBreak,
            other => other,
        };

        if let Some(buffer) = link.as_mut() {
            let closes = matches!(event, Event::End(TagEnd::Link));
            buffer.push(event);
            if closes {
                if let Some(buffer) = link.take() {
                    out.extend(finish_link(buffer));
                }
            }
            continue;
        }

        if let Event::Text(text) = &event {
            if code_block_depth == 0 {
                prose.push_str(text);
                continue;
            }
        }
        flush_prose(&mut prose, &mut out);

        match event {
            Event::Start(Tag::Link { .. }) => link = Some(vec![event]),
            Event::Start(Tag::CodeBlock(_)) => {
                code_block_depth += 1;
                out.push(event);
            }
            Event::End(TagEnd::CodeBlock) => {
                code_block_depth = code_block_depth.saturating_sub(1);
                out.push(event);
            }
            other => out.push(other),
        }
    }

    flush_prose(&mut prose, &mut out);
    // Unterminated link: emit what we buffered.
    if let Some(buffer) = link {
        out.extend(buffer);
    }
    out
}

fn flush_prose(prose: &mut String, out: &mut Vec<Event<'_>>) {
    if !prose.is_empty() {
        linkify(std::mem::take(prose), out);
    }
}

/// Turn a buffered `[sourceN](url)` link into a citation anchor.
fn finish_link(buffer: Vec<Event<'_>>) -> Vec<Event<'_>> {
    if let [Event::Start(Tag::Link { dest_url, .. }), Event::Text(label), Event::End(TagEnd::Link)] =
        buffer.as_slice()
    {
        if citation_ordinal(label).is_some() {
            let anchor = citation_anchor(dest_url, label);
            return vec![Event::Html(CowStr::from(anchor))];
        }
    }
    buffer
}

fn citation_anchor(dest_url: &str, label: &str) -> String {
    format!(
        r#"<a class="cite" href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
        escape_html(&clean_url(dest_url)),
        escape_html(label)
    )
}

/// Drop trailing punctuation. A closing paren stays while it balances one
/// inside the URL.
fn trim_url_end(url: &str) -> &str {
    let mut url = url;
    loop {
        let trimmed = url.trim_end_matches(URL_TRAILING_PUNCT);
        if trimmed.ends_with(')') && trimmed.matches(')').count() > trimmed.matches('(').count() {
            url = &trimmed[..trimmed.len() - 1];
        } else {
            return trimmed;
        }
    }
}

fn linkify(text: String, out: &mut Vec<Event<'_>>) {
    if !bare_url_regex().is_match(&text) {
        out.push(Event::Text(CowStr::from(text)));
        return;
    }

    let mut last = 0;
    for m in bare_url_regex().find_iter(&text) {
        let url = trim_url_end(m.as_str());
        if url.is_empty() || url.eq_ignore_ascii_case("www.") {
            continue;
        }
        if m.start() > last {
            out.push(Event::Text(CowStr::from(text[last..m.start()].to_string())));
        }

        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: CowStr::from(href),
            title: CowStr::from(""),
            id: CowStr::from(""),
        }));
        out.push(Event::Text(CowStr::from(url.to_string())));
        out.push(Event::End(TagEnd::Link));
        last = m.start() + url.len();
    }
    if last < text.len() {
        out.push(Event::Text(CowStr::from(text[last..].to_string())));
    }
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_html_is_escaped() {
        let html = markdown_to_html("hi <b>there</b>\n\n<script>alert(1)</script>");
        assert!(!html.contains("<b>"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_soft_breaks_become_br() {
        let html = markdown_to_html("line one\nline two");
        assert_eq!(html, "<p>line one<br />\nline two</p>\n");
    }

    #[test]
    fn test_citation_link_gets_anchor_attributes() {
        let html = markdown_to_html("see [source3](<https://a.com/x>)");
        assert!(html.contains(
            r#"<a class="cite" href="https://a.com/x" target="_blank" rel="noopener noreferrer">source3</a>"#
        ));
    }

    #[test]
    fn test_regular_links_untouched() {
        let html = markdown_to_html("[docs](https://docs.rs)");
        assert!(html.contains(r#"<a href="https://docs.rs">docs</a>"#));
    }

    #[test]
    fn test_bare_urls_are_linked() {
        let html = markdown_to_html("visit https://example.com/page. or www.rust-lang.org");
        assert!(html.contains(r#"<a href="https://example.com/page">https://example.com/page</a>."#));
        assert!(html.contains(r#"<a href="http://www.rust-lang.org">www.rust-lang.org</a>"#));
    }

    #[test]
    fn test_bare_url_keeps_balanced_parens() {
        let html = markdown_to_html("see https://en.wikipedia.org/wiki/Rust_(programming_language).");
        assert!(html.contains(
            r#"<a href="https://en.wikipedia.org/wiki/Rust_(programming_language)">"#
        ));

        let html = markdown_to_html("(see https://a.com/x)");
        assert!(html.contains(r#"<a href="https://a.com/x">https://a.com/x</a>)"#));
    }

    #[test]
    fn test_no_linkify_in_code() {
        let html = markdown_to_html("```\nhttps://example.com\n```\n\n`https://inline.dev`");
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_smart_punctuation() {
        let html = markdown_to_html("\"quoted\" -- dash");
        assert!(html.contains('\u{201C}'));
        assert!(html.contains('\u{2013}'));
    }
}
