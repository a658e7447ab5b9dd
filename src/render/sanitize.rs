use std::collections::HashSet;

/// Allow-list HTML sanitizer applied to every rendered answer.
///
/// Scripts, event handler attributes, styles and non-http(s)/mailto URLs are
/// removed. Citation anchors keep `class="cite"` and `target`, and every link
/// gets `rel="noopener noreferrer"`.
pub fn sanitize_html(html: &str) -> String {
    builder().clean(html).to_string()
}

fn builder() -> ammonia::Builder<'static> {
    let mut builder = ammonia::Builder::default();
    builder
        .url_schemes(HashSet::from(["http", "https", "mailto"]))
        .add_tag_attributes("a", &["target"])
        .add_allowed_classes("a", &["cite"])
        .link_rel(Some("noopener noreferrer"));
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_script_and_handlers() {
        let out = sanitize_html(r#"<p onclick="x()">hi</p><script>alert(1)</script><img src="a.png" onerror="y()">"#);
        assert!(!out.contains("<script"));
        assert!(!out.contains("onclick"));
        assert!(!out.contains("onerror"));
        assert!(out.contains("<p>hi</p>"));
    }

    #[test]
    fn test_javascript_href_removed() {
        let out = sanitize_html(r#"<a href="javascript:alert(1)">x</a>"#);
        assert!(!out.contains("javascript:"));
    }

    #[test]
    fn test_citation_anchor_survives() {
        let anchor = r#"<a class="cite" href="https://a.com" target="_blank" rel="noopener noreferrer">source1</a>"#;
        let out = sanitize_html(anchor);
        assert!(out.contains(r#"class="cite""#));
        assert!(out.contains(r#"target="_blank""#));
        assert!(out.contains(r#"rel="noopener noreferrer""#));
        assert!(out.contains(r#"href="https://a.com""#));
    }

    #[test]
    fn test_unknown_classes_dropped() {
        let out = sanitize_html(r#"<a class="cite evil" href="https://a.com">s</a>"#);
        assert!(out.contains(r#"class="cite""#));
        assert!(!out.contains("evil"));
    }

    #[test]
    fn test_idempotent() {
        let once = sanitize_html(r#"<p>a &amp; b <a href="https://x.y" target="_blank">l</a></p>"#);
        assert_eq!(sanitize_html(&once), once);
    }
}
