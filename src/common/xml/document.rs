//! Mutable XML tree backed by an index arena.
//!
//! Nodes live in a single `Vec` and refer to each other through [`NodeId`]
//! indices, so parent lookups are O(1) and ancestor walks are O(depth).
//! Detached nodes stay in the arena until the document is dropped; nothing
//! reachable from the document node ever points at them.
//!
//! Text is stored exactly as it appeared in the source (still escaped), so
//! entity references the reader does not know about survive a round trip.
//! Attribute values are stored unescaped and re-escaped on output.

use crate::common::bom::strip_bom_str;
use crate::common::xml::escape::{escape_text, unescape_xml};
use crate::common::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use smallvec::SmallVec;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of a node inside an [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A single attribute with its qualified name and unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Local part of the attribute name.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Prefix of the attribute name, if any.
    pub fn prefix(&self) -> Option<&str> {
        prefix_part(&self.name)
    }

    /// Whether this attribute is a namespace declaration (`xmlns` or `xmlns:*`).
    pub fn is_namespace_decl(&self) -> bool {
        self.name == "xmlns" || self.name.starts_with("xmlns:")
    }
}

/// Attribute storage; most elements carry only a handful.
pub type Attributes = SmallVec<[Attribute; 4]>;

/// Content of one node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Document,
    Element { name: String, attrs: Attributes },
    /// Character data, kept escaped as read
    Text(String),
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
    DocType(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed, mutable XML document.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

const DOCUMENT: NodeId = NodeId(0);

/// Local part of a qualified name.
#[inline]
pub fn local_part(qname: &str) -> &str {
    match qname.rfind(':') {
        Some(pos) => &qname[pos + 1..],
        None => qname,
    }
}

/// Prefix of a qualified name.
#[inline]
pub fn prefix_part(qname: &str) -> Option<&str> {
    qname.find(':').map(|pos| &qname[..pos])
}

impl Default for XmlDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlDocument {
    /// Create an empty document holding only the document node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse a document from text.
    ///
    /// A leading byte-order mark is ignored. Whitespace-only text inside
    /// element-only content is dropped so that re-serialization can apply
    /// its own indentation.
    ///
    /// # Errors
    /// Returns [`Error::Xml`] for malformed markup, unbalanced tags or a
    /// document without a root element.
    pub fn parse(xml: &str) -> Result<Self> {
        let xml = strip_bom_str(xml);
        let mut doc = Self::new();
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<NodeId> = vec![DOCUMENT];

        loop {
            let parent = *stack.last().unwrap_or(&DOCUMENT);
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let id = doc.element_from_start(e)?;
                    doc.attach(parent, id);
                    stack.push(id);
                },
                Ok(Event::Empty(ref e)) => {
                    let id = doc.element_from_start(e)?;
                    doc.attach(parent, id);
                },
                Ok(Event::End(_)) => {
                    if stack.len() <= 1 {
                        return Err(Error::Xml("unexpected closing tag".to_string()));
                    }
                    stack.pop();
                },
                Ok(Event::Text(ref t)) => {
                    if parent != DOCUMENT {
                        doc.push_raw_text(parent, std::str::from_utf8(t)?);
                    }
                },
                Ok(Event::GeneralRef(ref r)) => {
                    if parent != DOCUMENT {
                        let entity = format!("&{};", std::str::from_utf8(r)?);
                        doc.push_raw_text(parent, &entity);
                    }
                },
                Ok(Event::CData(ref c)) => {
                    let id = doc.push_node(NodeKind::CData(std::str::from_utf8(c)?.to_string()));
                    doc.attach(parent, id);
                },
                Ok(Event::Comment(ref c)) => {
                    let id = doc.push_node(NodeKind::Comment(std::str::from_utf8(c)?.to_string()));
                    doc.attach(parent, id);
                },
                Ok(Event::PI(ref p)) => {
                    let id = doc.push_node(NodeKind::ProcessingInstruction(
                        std::str::from_utf8(p)?.to_string(),
                    ));
                    doc.attach(parent, id);
                },
                Ok(Event::DocType(ref d)) => {
                    let id = doc.push_node(NodeKind::DocType(
                        std::str::from_utf8(d)?.trim().to_string(),
                    ));
                    doc.attach(parent, id);
                },
                // The declaration is always synthesized on output
                Ok(Event::Decl(_)) => {},
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "{} at position {}",
                        e,
                        reader.error_position()
                    )));
                },
            }
        }

        if stack.len() != 1 {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }
        if doc.root_element().is_none() {
            return Err(Error::Xml("document has no root element".to_string()));
        }

        doc.drop_formatting_whitespace();
        Ok(doc)
    }

    fn element_from_start(&mut self, e: &BytesStart<'_>) -> Result<NodeId> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut attrs = Attributes::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?;
            let raw = std::str::from_utf8(&attr.value)?;
            attrs.push(Attribute::new(key, unescape_xml(raw)));
        }
        Ok(self.push_node(NodeKind::Element { name, attrs }))
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Append raw (escaped) text, merging with a preceding text node.
    fn push_raw_text(&mut self, parent: NodeId, raw: &str) {
        let last = self.nodes[parent.0].children.last().copied();
        if let Some(last) = last {
            if let NodeKind::Text(existing) = &mut self.nodes[last.0].kind {
                existing.push_str(raw);
                return;
            }
        }
        let id = self.push_node(NodeKind::Text(raw.to_string()));
        self.attach(parent, id);
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn drop_formatting_whitespace(&mut self) {
        for id in self.elements() {
            if self.has_significant_text(id) {
                continue;
            }
            let kept: Vec<NodeId> = self.nodes[id.0]
                .children
                .iter()
                .copied()
                .filter(|&c| !matches!(self.nodes[c.0].kind, NodeKind::Text(_)))
                .collect();
            self.nodes[id.0].children = kept;
        }
    }

    /// Whether an element carries non-whitespace character data, which
    /// makes its content mixed and rules out re-indentation.
    pub(crate) fn has_significant_text(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.iter().any(|&c| match &self.nodes[c.0].kind {
            NodeKind::Text(t) => !t.trim().is_empty(),
            NodeKind::CData(_) => true,
            _ => false,
        })
    }

    // ---------------------------------------------------------------------
    // Structure queries
    // ---------------------------------------------------------------------

    /// The document node (parent of the root element).
    #[inline]
    pub fn document_node(&self) -> NodeId {
        DOCUMENT
    }

    /// The root element, if the document has one.
    pub fn root_element(&self) -> Option<NodeId> {
        self.nodes[DOCUMENT.0]
            .children
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Content of a node.
    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    #[inline]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[inline]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Element children of a node, in document order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0]
            .children
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// Ancestors of a node, nearest first, excluding the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
            .filter(|&p| p != DOCUMENT)
    }

    /// Descendant elements of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id.0].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.is_element(next) {
                out.push(next);
                stack.extend(self.nodes[next.0].children.iter().rev().copied());
            }
        }
        out
    }

    /// All elements attached to the document, in document order.
    pub fn elements(&self) -> Vec<NodeId> {
        self.descendants(DOCUMENT)
    }

    /// Whether `id` is still reachable from the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current == DOCUMENT
    }

    /// First element (document order) whose local name is one of `names`.
    pub fn find_first_local(&self, names: &[&str]) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|&id| names.contains(&self.local_name(id)))
    }

    /// All elements (document order) whose local name is one of `names`.
    pub fn find_all_local(&self, names: &[&str]) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|&id| names.contains(&self.local_name(id)))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Names and attributes
    // ---------------------------------------------------------------------

    /// Qualified name of an element; empty for other node kinds.
    pub fn name(&self, id: NodeId) -> &str {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => name,
            _ => "",
        }
    }

    #[inline]
    pub fn local_name(&self, id: NodeId) -> &str {
        local_part(self.name(id))
    }

    #[inline]
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        prefix_part(self.name(id))
    }

    pub fn set_name(&mut self, id: NodeId, new_name: impl Into<String>) {
        if let NodeKind::Element { name, .. } = &mut self.nodes[id.0].kind {
            *name = new_name.into();
        }
    }

    /// Attributes of an element; empty for other node kinds.
    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs,
            _ => &[],
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let value = value.into();
            match attrs.iter_mut().find(|a| a.name == name) {
                Some(existing) => existing.value = value,
                None => attrs.push(Attribute::new(name, value)),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let pos = attrs.iter().position(|a| a.name == name)?;
            return Some(attrs.remove(pos).value);
        }
        None
    }

    /// Replace the complete attribute list of an element.
    pub fn set_attrs(&mut self, id: NodeId, new_attrs: Attributes) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            *attrs = new_attrs;
        }
    }

    // ---------------------------------------------------------------------
    // Namespaces
    // ---------------------------------------------------------------------

    /// Resolve a prefix (or the default namespace for `None`) in the scope
    /// of `id`. An empty `xmlns=""` undeclares the default namespace.
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NAMESPACE);
        }
        let decl = match prefix {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|node| self.attr(node, &decl))
            .filter(|uri| !uri.is_empty())
    }

    /// Namespace URI of an element under standard resolution.
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        self.lookup_namespace(id, self.prefix(id))
    }

    // ---------------------------------------------------------------------
    // Text
    // ---------------------------------------------------------------------

    /// Concatenated, unescaped character data below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(raw) => out.push_str(&unescape_xml(raw)),
            NodeKind::CData(data) => out.push_str(data),
            NodeKind::Element { .. } | NodeKind::Document => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            },
            _ => {},
        }
    }

    /// Replace all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[child.0].parent = None;
        }
        if !text.is_empty() {
            let node = self.push_node(NodeKind::Text(escape_text(text)));
            self.attach(id, node);
        }
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, name: impl Into<String>) -> NodeId {
        self.push_node(NodeKind::Element {
            name: name.into(),
            attrs: Attributes::new(),
        })
    }

    /// Create a detached element with attributes.
    pub fn create_element_with(&mut self, name: impl Into<String>, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs.iter().map(|(k, v)| Attribute::new(*k, *v)).collect();
        self.push_node(NodeKind::Element {
            name: name.into(),
            attrs,
        })
    }

    /// Create a detached text node from unescaped text.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(escape_text(text)))
    }

    /// Detach a node from its parent. The node and its subtree stay valid
    /// and can be re-attached elsewhere.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.remove(child);
        self.attach(parent, child);
    }

    /// Insert `new` immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.remove(new);
        let siblings = &mut self.nodes[parent.0].children;
        let pos = siblings.iter().position(|&c| c == reference).unwrap_or(siblings.len());
        siblings.insert(pos, new);
        self.nodes[new.0].parent = Some(parent);
    }

    /// Insert `new` immediately after `reference`.
    pub fn insert_after(&mut self, reference: NodeId, new: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        self.remove(new);
        let siblings = &mut self.nodes[parent.0].children;
        let pos = siblings
            .iter()
            .position(|&c| c == reference)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(pos, new);
        self.nodes[new.0].parent = Some(parent);
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        self.insert_before(old, new);
        self.remove(old);
    }

    /// Replace an element by its own children.
    pub fn unwrap_element(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let Some(pos) = self.nodes[parent.0].children.iter().position(|&c| c == id) else {
            return;
        };
        let children = std::mem::take(&mut self.nodes[id.0].children);
        self.nodes[parent.0]
            .children
            .splice(pos..=pos, children.iter().copied());
        for child in children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[id.0].parent = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:default" xmlns:x="urn:x">
    <x:child id="a &amp; b">Hello &amp; <b>bold</b> world</x:child>
    <empty/>
    <!-- note -->
</root>"#;

    #[test]
    fn test_parse_structure() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let root = doc.root_element().unwrap();
        assert_eq!(doc.name(root), "root");

        let children = doc.element_children(root);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.name(children[0]), "x:child");
        assert_eq!(doc.local_name(children[0]), "child");
        assert_eq!(doc.prefix(children[0]), Some("x"));
        assert_eq!(doc.attr(children[0], "id"), Some("a & b"));
        assert_eq!(doc.text_content(children[0]), "Hello & bold world");
    }

    #[test]
    fn test_formatting_whitespace_dropped() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let root = doc.root_element().unwrap();
        // two elements and a comment, no whitespace text
        assert_eq!(doc.children(root).len(), 3);
    }

    #[test]
    fn test_namespace_resolution() {
        let doc = XmlDocument::parse(SAMPLE).unwrap();
        let root = doc.root_element().unwrap();
        let children = doc.element_children(root);
        assert_eq!(doc.namespace_uri(root), Some("urn:default"));
        assert_eq!(doc.namespace_uri(children[0]), Some("urn:x"));
        assert_eq!(doc.namespace_uri(children[1]), Some("urn:default"));
    }

    #[test]
    fn test_unbalanced_document_fails() {
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("<a>").is_err());
        assert!(XmlDocument::parse("").is_err());
    }

    #[test]
    fn test_bom_is_ignored() {
        let doc = XmlDocument::parse("\u{FEFF}<a/>").unwrap();
        assert_eq!(doc.name(doc.root_element().unwrap()), "a");
    }

    #[test]
    fn test_replace_and_unwrap() {
        let mut doc = XmlDocument::parse("<a><b><c/><d/></b><e/></a>").unwrap();
        let root = doc.root_element().unwrap();
        let b = doc.element_children(root)[0];
        doc.unwrap_element(b);
        let names: Vec<_> = doc
            .element_children(root)
            .into_iter()
            .map(|id| doc.name(id).to_string())
            .collect();
        assert_eq!(names, ["c", "d", "e"]);

        let e = doc.element_children(root)[2];
        let f = doc.create_element("f");
        doc.replace(e, f);
        assert!(!doc.is_attached(e));
        assert!(doc.is_attached(f));
        assert_eq!(doc.name(doc.element_children(root)[2]), "f");
    }

    #[test]
    fn test_unwrap_last_child() {
        let mut doc = XmlDocument::parse("<a><x/><b><c/></b></a>").unwrap();
        let root = doc.root_element().unwrap();
        let b = doc.element_children(root)[1];
        doc.unwrap_element(b);
        let names: Vec<_> = doc
            .element_children(root)
            .into_iter()
            .map(|id| doc.name(id).to_string())
            .collect();
        assert_eq!(names, ["x", "c"]);
    }

    #[test]
    fn test_set_attr_preserves_order() {
        let mut doc = XmlDocument::parse(r#"<a one="1" two="2"/>"#).unwrap();
        let root = doc.root_element().unwrap();
        doc.set_attr(root, "one", "uno");
        doc.set_attr(root, "three", "3");
        let names: Vec<_> = doc.attrs(root).iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);
        assert_eq!(doc.remove_attr(root, "two").as_deref(), Some("2"));
        assert_eq!(doc.attr(root, "two"), None);
    }
}
