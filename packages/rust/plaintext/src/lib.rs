//! Rich-text to plain-text flattening for QnA answers.
//!
//! Answers authored in an XHTML editor are parsed with `scraper`, reduced to
//! their text nodes with block boundaries turned into line breaks, and then
//! run through a small cleanup pipeline. The knowledge-base service only
//! accepts plain text.

mod cleanup;

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::{instrument, trace};

/// Elements whose content never reaches the output.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "iframe"];

/// Elements that start a new line in the flattened text.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr",
    "ul",
];

/// Flatten an HTML fragment to plain text.
///
/// Entities are decoded, markup is dropped, block elements become line
/// breaks and runs of whitespace collapse to single spaces. Returns an empty
/// string for markup with no visible text.
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn flatten_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let doc = Html::parse_fragment(html);
    let mut raw = String::with_capacity(html.len());
    walk(doc.root_element(), &mut raw);

    let text = cleanup::run_pipeline(&raw);
    trace!(text_len = text.len(), "flattened rich text");
    text
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    out.push('\n');
                }
                walk(child_el, out);
                if is_block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_simple_paragraph() {
        assert_eq!(flatten_html("<p>We are open <strong>daily</strong>.</p>"), "We are open daily.");
    }

    #[test]
    fn flatten_keeps_block_boundaries() {
        let html = "<p>First line.</p><p>Second   line.</p>";
        assert_eq!(flatten_html(html), "First line.\nSecond line.");
    }

    #[test]
    fn flatten_converts_breaks_and_lists() {
        let html = "Call us:<br/>Mon-Fri<ul><li>Phone</li><li>Email</li></ul>";
        assert_eq!(flatten_html(html), "Call us:\nMon-Fri\nPhone\nEmail");
    }

    #[test]
    fn flatten_decodes_entities() {
        assert_eq!(flatten_html("<p>Fish &amp; chips&nbsp;&lt;3</p>"), "Fish & chips <3");
    }

    #[test]
    fn flatten_drops_scripts_and_styles() {
        let html = "<style>p{color:red}</style><p>Visible</p><script>alert(1)</script>";
        assert_eq!(flatten_html(html), "Visible");
    }

    #[test]
    fn flatten_table_cells_are_separated() {
        let html = "<table><tr><td>Mon</td><td>9-17</td></tr></table>";
        assert_eq!(flatten_html(html), "Mon\n9-17");
    }

    #[test]
    fn flatten_empty_markup_is_blank() {
        assert_eq!(flatten_html(""), "");
        assert_eq!(flatten_html("<p> </p><div><br></div>"), "");
    }

    #[test]
    fn flatten_plain_text_passes_through() {
        assert_eq!(flatten_html("  just text  "), "just text");
    }
}
