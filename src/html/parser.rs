use super::{Document, NodeData, NodeId};
use crate::error::CspError;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

/// Parses an HTML string into a [`Document`].
pub fn parse_document(html: &str) -> Result<Document, CspError> {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: false,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = html5ever::parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| CspError::ParseError(e.to_string()))?;

    let mut doc = Document::empty();
    let root = doc.root();
    for child in dom.document.children.borrow().iter() {
        convert_node(&mut doc, child, root);
    }

    // XHTML-convention documents carry xmlns on the root element.
    let xhtml = doc
        .elements_by_tag("html")
        .into_iter()
        .next()
        .and_then(|id| doc.get_attribute(id, "xmlns").map(|_| ()))
        .is_some();
    doc.set_xhtml(xhtml);

    Ok(doc)
}

fn convert_node(doc: &mut Document, handle: &Handle, parent: NodeId) {
    let data = match handle.data {
        RcNodeData::Document | RcNodeData::ProcessingInstruction { .. } => return,
        RcNodeData::Doctype {
            ref name,
            ref public_id,
            ref system_id,
        } => NodeData::Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        },
        RcNodeData::Text { ref contents } => NodeData::Text(contents.borrow().to_string()),
        RcNodeData::Comment { ref contents } => NodeData::Comment(contents.to_string()),
        RcNodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            let mut attributes = Vec::new();
            for attr in attrs.borrow().iter() {
                // Namespaced attributes (xlink:href, xml:lang in foreign
                // content) keep their prefix in the serialized form.
                let qualified = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                attributes.push((qualified, attr.value.to_string()));
            }
            NodeData::Element {
                name: name.local.to_string(),
                attrs: attributes,
            }
        }
    };

    let id = doc.push_node(data, parent);

    // The tree builder parks template children in a separate fragment;
    // fold them back in so serialization reproduces the template body.
    if let RcNodeData::Element {
        ref template_contents,
        ..
    } = handle.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            for child in contents.children.borrow().iter() {
                convert_node(doc, child, id);
            }
        }
    }

    for child in handle.children.borrow().iter() {
        convert_node(doc, child, id);
    }
}
