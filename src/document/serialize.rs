//! HTML serialization for [`Document`]

use super::{Document, NodeId, NodeKind};

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

enum Step {
    Open(NodeId),
    Close(NodeId),
}

pub(super) fn to_html(doc: &Document) -> String {
    let mut out = String::new();
    let mut stack: Vec<Step> = doc
        .children(doc.root())
        .iter()
        .rev()
        .map(|&id| Step::Open(id))
        .collect();

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(id) => match doc.kind(id) {
                NodeKind::Document => {}
                NodeKind::Doctype {
                    name,
                    public_id,
                    system_id,
                } => {
                    out.push_str("<!DOCTYPE ");
                    out.push_str(name);
                    if !public_id.is_empty() {
                        out.push_str(" PUBLIC \"");
                        out.push_str(public_id);
                        out.push('"');
                    }
                    if !system_id.is_empty() {
                        if public_id.is_empty() {
                            out.push_str(" SYSTEM");
                        }
                        out.push_str(" \"");
                        out.push_str(system_id);
                        out.push('"');
                    }
                    out.push('>');
                }
                NodeKind::Element(el) => {
                    out.push('<');
                    out.push_str(&el.name);
                    for (k, v) in &el.attrs {
                        out.push(' ');
                        out.push_str(k);
                        out.push_str("=\"");
                        escape_into(&mut out, v, true);
                        out.push('"');
                    }
                    out.push('>');

                    if VOID_ELEMENTS.contains(&el.name.as_str()) {
                        continue;
                    }

                    stack.push(Step::Close(id));
                    for &child in doc.children(id).iter().rev() {
                        stack.push(Step::Open(child));
                    }
                }
                NodeKind::Text(text) => {
                    let raw_parent = doc
                        .parent(id)
                        .and_then(|p| doc.tag_name(p))
                        .filter(|name| RAW_TEXT_ELEMENTS.contains(name));
                    match raw_parent {
                        Some(name) => push_raw_text(&mut out, text, name),
                        None => escape_into(&mut out, text, false),
                    }
                }
                NodeKind::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
            },
            Step::Close(id) => {
                if let Some(name) = doc.tag_name(id) {
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
        }
    }

    out
}

fn escape_into(out: &mut String, text: &str, attr_mode: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

/// Emit raw text, breaking up any `</name` sequence that would otherwise end
/// the enclosing element early (e.g. a `"</script>"` literal inside an
/// inlined script).
fn push_raw_text(out: &mut String, text: &str, element: &str) {
    let needle = format!("</{}", element);
    let mut rest = text;
    while let Some(pos) = find_ascii_case_insensitive(rest, &needle) {
        out.push_str(&rest[..pos]);
        out.push_str("<\\/");
        rest = &rest[pos + 2..];
    }
    out.push_str(rest);
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let hay = haystack.as_bytes();
    let pat = needle.as_bytes();
    if pat.is_empty() || hay.len() < pat.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| hay[i..i + pat.len()].eq_ignore_ascii_case(pat))
}
