//! Plain-text rendering of HTML bodies.
//!
//! The text alternative of every generated message is derived from its HTML
//! by walking the parsed DOM, so entities are decoded and tokens inside
//! attributes never leak into the output.

use scraper::{ElementRef, Html, Node};

/// Elements that start and end on their own line.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "pre", "section", "table", "tr", "ul",
];

/// Elements whose content is never visible text.
const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "template", "title"];

/// Render HTML as plain text.
///
/// Whitespace is collapsed, block elements and `<br>` become line breaks,
/// paragraphs are separated by a blank line and link targets are written in
/// parentheses after the link text.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = TextBuffer::default();
    walk(fragment.root_element(), &mut out);
    out.finish()
}

/// Escape text for interpolation into an HTML body.
pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn walk(element: ElementRef<'_>, out: &mut TextBuffer) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_text(text),
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };

                match el.name() {
                    name if SKIPPED_ELEMENTS.contains(&name) => {}
                    "br" => out.line_break(),
                    "p" => {
                        out.paragraph_break();
                        walk(child_ref, out);
                        out.paragraph_break();
                    }
                    "a" => {
                        walk(child_ref, out);
                        if let Some(href) = el.attr("href") {
                            let label: String = child_ref.text().collect();
                            out.push_link_target(label.trim(), href.trim());
                        }
                    }
                    name if BLOCK_ELEMENTS.contains(&name) => {
                        out.block_break();
                        walk(child_ref, out);
                        out.block_break();
                    }
                    _ => walk(child_ref, out),
                }
            }
            _ => {}
        }
    }
}

/// Accumulates text while collapsing whitespace and line breaks.
#[derive(Default)]
struct TextBuffer {
    out: String,
    pending_space: bool,
    pending_breaks: usize,
}

impl TextBuffer {
    fn push_text(&mut self, text: &str) {
        for c in text.chars() {
            if c.is_whitespace() {
                self.pending_space = !self.out.is_empty();
            } else {
                self.flush();
                self.out.push(c);
            }
        }
    }

    fn push_link_target(&mut self, label: &str, href: &str) {
        let bare = href.strip_prefix("mailto:").unwrap_or(href);
        if href.is_empty() || label == href || label == bare {
            return;
        }

        if !label.is_empty() {
            self.pending_space = true;
        }
        self.push_text(&format!("({href})"));
    }

    fn line_break(&mut self) {
        if !self.out.is_empty() {
            self.pending_breaks = (self.pending_breaks + 1).min(2);
        }
    }

    fn block_break(&mut self) {
        if !self.out.is_empty() {
            self.pending_breaks = self.pending_breaks.max(1);
        }
    }

    fn paragraph_break(&mut self) {
        if !self.out.is_empty() {
            self.pending_breaks = 2;
        }
    }

    fn flush(&mut self) {
        if self.pending_breaks > 0 {
            for _ in 0..self.pending_breaks {
                self.out.push('\n');
            }
        } else if self.pending_space {
            self.out.push(' ');
        }
        self.pending_breaks = 0;
        self.pending_space = false;
    }

    fn finish(self) -> String {
        self.out
    }
}
