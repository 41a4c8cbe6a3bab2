//! HTML parsing
//!
//! html5ever builds an `RcDom`, which is then copied into the arena so the
//! rest of the crate works with plain [`NodeId`]s.

use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use super::tree::{Document, NodeId};

/// Parse a full HTML document (html5ever fills in missing html/head/body)
pub fn parse_html(html: &str) -> Document {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);

    let mut doc = Document::new();
    let root = doc.root();
    for child in dom.document.children.borrow().iter() {
        convert(&mut doc, root, child);
    }
    doc
}

fn convert(doc: &mut Document, parent: NodeId, handle: &Handle) {
    let id = match &handle.data {
        RcNodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let element = doc.create_element(&name.local);
            for attr in attrs.borrow().iter() {
                doc.set_attr(element, &attr.name.local, &attr.value);
            }
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    convert(doc, element, child);
                }
            }
            element
        }
        RcNodeData::Text { contents } => doc.create_text(&contents.borrow()),
        RcNodeData::Comment { contents } => doc.create_comment(contents),
        RcNodeData::Document
        | RcNodeData::Doctype { .. }
        | RcNodeData::ProcessingInstruction { .. } => return,
    };

    if doc.append_child(parent, id).is_err() {
        return;
    }

    for child in handle.children.borrow().iter() {
        convert(doc, id, child);
    }
}
