use super::{Document, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

// Elements whose text children are emitted verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub(super) fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    write_node(doc, doc.root(), &mut out, false);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String, raw_text: bool) {
    match &doc.node(id).data {
        NodeData::Document => {
            for &child in &doc.node(id).children {
                write_node(doc, child, out, false);
            }
        }
        NodeData::Doctype {
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
                if !system_id.is_empty() {
                    out.push_str(" \"");
                    out.push_str(system_id);
                    out.push('"');
                }
            } else if !system_id.is_empty() {
                out.push_str(" SYSTEM \"");
                out.push_str(system_id);
                out.push('"');
            }
            out.push('>');
        }
        NodeData::Comment(contents) => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::Text(contents) => {
            if raw_text {
                out.push_str(contents);
            } else {
                escape_text(contents, out);
            }
        }
        NodeData::Element { name, attrs } => {
            out.push('<');
            out.push_str(name);
            for (attr, value) in attrs {
                out.push(' ');
                out.push_str(attr);
                out.push_str("=\"");
                escape_attribute(value, out);
                out.push('"');
            }

            if VOID_ELEMENTS.contains(&name.as_str()) {
                if doc.is_xhtml() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                }
                return;
            }
            out.push('>');

            let raw = RAW_TEXT_ELEMENTS.contains(&name.as_str());
            for &child in &doc.node(id).children {
                write_node(doc, child, out, raw);
            }

            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
