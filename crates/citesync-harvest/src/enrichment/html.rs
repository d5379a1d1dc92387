use scraper::{ElementRef, Html, Node};

/// Inline tags abstracts may keep.
const KEPT_TAGS: [&str; 7] = ["b", "i", "em", "strong", "sub", "sup", "u"];
/// Tags whose content is dropped entirely.
const DROPPED_TAGS: [&str; 4] = ["script", "style", "iframe", "object"];

/// Reduces an HTML (or JATS) abstract to text with a few inline tags.
pub fn sanitize_html(input: &str) -> String {
    let fragment = Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    render(fragment.root_element(), &mut out);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_escaped(&**text, out),
            Node::Element(_) => {
                let Some(el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = el.value().name().to_ascii_lowercase();
                let local = name.rsplit(':').next().unwrap_or(&name).to_string();
                if DROPPED_TAGS.contains(&local.as_str()) {
                    continue;
                }
                if KEPT_TAGS.contains(&local.as_str()) {
                    out.push('<');
                    out.push_str(&local);
                    out.push('>');
                    render(el, out);
                    out.push_str("</");
                    out.push_str(&local);
                    out.push('>');
                } else {
                    out.push(' ');
                    render(el, out);
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

fn push_escaped(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_keeps_inline_tags() {
        let html = "<jats:p>We study <i>E. coli</i> in H<sub>2</sub>O.</jats:p><script>alert(1)</script>";
        assert_eq!(sanitize_html(html), "We study <i>E. coli</i> in H<sub>2</sub>O.");
    }

    #[test]
    fn escapes_text_and_collapses_whitespace() {
        assert_eq!(sanitize_html("a &lt; b\n\n  <p>and c</p>"), "a &lt; b and c");
        assert_eq!(sanitize_html("plain"), "plain");
    }
}
