//! Answer rendering: citation directives, markdown, sanitization.
//!
//! `render_markdown` is the only entry point meant to produce HTML for
//! display; it always ends with the sanitizer.

pub mod citations;
mod markdown;
pub mod sanitize;

pub use citations::{clean_url, expand_citations, CitationIndex};
pub use sanitize::sanitize_html;

/// Render an answer to sanitized HTML with citation numbering local to this call.
pub fn render_markdown(text: &str) -> String {
    let mut index = CitationIndex::new();
    render_markdown_with(text, &mut index)
}

/// Render with a caller-owned citation index, so ordinals can be shared
/// across several messages.
pub fn render_markdown_with(text: &str, index: &mut CitationIndex) -> String {
    let expanded = expand_citations(text, index);
    let html = markdown::markdown_to_html(&expanded);
    let clean = sanitize_html(&html);
    tracing::trace!(
        input_len = text.len(),
        output_len = clean.len(),
        citations = index.len(),
        "Rendered answer"
    );
    clean
}

/// Plain-text rendering for terminals: directives become `[n]` markers and the
/// numbered sources are listed at the end.
pub fn render_terminal(text: &str) -> String {
    let mut index = CitationIndex::new();
    let mut body = citations::replace_citations(text, &mut index, |numbered| {
        numbered.iter().map(|(n, _)| format!("[{}]", n)).collect()
    });

    if !index.is_empty() {
        body.push_str("\n\nSources:");
        for (n, url) in index.sources() {
            body.push_str(&format!("\n  [{}] {}", n, url));
        }
    }
    body
}
