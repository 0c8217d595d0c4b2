//! Stable, indented serialization of an [`XmlDocument`].
//!
//! Output rules:
//! - a UTF-8 XML declaration is always written first;
//! - element-only content is indented by two spaces per level;
//! - an element with character data is written inline, so leaf text and
//!   mixed content keep their exact whitespace;
//! - childless elements are self-closed.
//!
//! Parsing the output and serializing again yields identical text.

use crate::common::xml::document::{NodeId, NodeKind, XmlDocument};
use crate::common::xml::escape::escape_attr;

/// Declaration written at the top of every serialized document.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const INDENT: &str = "  ";

impl XmlDocument {
    /// Serialize the document to formatted XML text.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(4096);
        out.push_str(XML_DECLARATION);
        for &child in self.children(self.document_node()) {
            if matches!(self.kind(child), NodeKind::Text(_)) {
                continue;
            }
            out.push('\n');
            self.write_node(&mut out, child, Some(0));
        }
        out.push('\n');
        out
    }

    /// Serialize one element and its subtree without a declaration.
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, Some(0));
        out
    }

    /// Write a node. `depth` is `None` inside mixed content, where no
    /// formatting whitespace may be introduced.
    fn write_node(&self, out: &mut String, id: NodeId, depth: Option<usize>) {
        match self.kind(id) {
            NodeKind::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }

                let mixed = depth.is_none() || self.has_significant_text(id);
                let children: Vec<NodeId> = self
                    .children(id)
                    .iter()
                    .copied()
                    .filter(|&c| mixed || !matches!(self.kind(c), NodeKind::Text(_)))
                    .collect();

                if children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');

                match depth {
                    Some(level) if !mixed => {
                        for child in children {
                            out.push('\n');
                            push_indent(out, level + 1);
                            self.write_node(out, child, Some(level + 1));
                        }
                        out.push('\n');
                        push_indent(out, level);
                    },
                    _ => {
                        for child in children {
                            self.write_node(out, child, None);
                        }
                    },
                }

                out.push_str("</");
                out.push_str(name);
                out.push('>');
            },
            NodeKind::Text(raw) => out.push_str(raw),
            NodeKind::CData(data) => {
                out.push_str("<![CDATA[");
                out.push_str(data);
                out.push_str("]]>");
            },
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            },
            NodeKind::ProcessingInstruction(text) => {
                out.push_str("<?");
                out.push_str(text);
                out.push_str("?>");
            },
            NodeKind::DocType(text) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(text);
                out.push('>');
            },
            NodeKind::Document => {},
        }
    }
}

#[inline]
fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}
