//! Identifiers and item references inside tests and items.

use crate::common::xml::{NodeId, XmlDocument};
use crate::package::packpath::normalize_href;

/// Element names, in both vocabularies, of a test's reference to an item
pub const ITEM_REF_ELEMENTS: [&str; 2] = ["qti-assessment-item-ref", "assessmentItemRef"];

const ASSESSMENT_ROOTS: [&str; 6] = [
    "qti-assessment-item",
    "qti-assessment-test",
    "assessment-item",
    "assessment-test",
    "assessmentItem",
    "assessmentTest",
];

/// A test's reference to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRef {
    pub node: NodeId,
    pub identifier: String,
    /// Reference as written in the test
    pub href: String,
}

impl ItemRef {
    /// `href` with leading `./` and `/` stripped.
    pub fn normalized_href(&self) -> &str {
        normalize_href(&self.href)
    }
}

/// All item references of a test, in document order.
pub fn item_refs(doc: &XmlDocument) -> Vec<ItemRef> {
    doc.find_all_local(&ITEM_REF_ELEMENTS)
        .into_iter()
        .map(|node| ItemRef {
            node,
            identifier: doc.attr(node, "identifier").unwrap_or_default().to_string(),
            href: doc.attr(node, "href").unwrap_or_default().to_string(),
        })
        .collect()
}

/// Rewrite the identifier of one item reference.
pub fn set_item_ref_identifier(doc: &mut XmlDocument, item_ref: &ItemRef, identifier: &str) {
    doc.set_attr(item_ref.node, "identifier", identifier);
}

/// The identifier a test or item declares for itself.
///
/// Read from the assessment element, which is normally the root; falls back
/// to the root element's own `identifier`.
pub fn declared_identifier(doc: &XmlDocument) -> Option<String> {
    doc.find_first_local(&ASSESSMENT_ROOTS)
        .or_else(|| doc.root_element())
        .and_then(|id| doc.attr(id, "identifier"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_refs_both_vocabularies() {
        let doc = XmlDocument::parse(
            r#"<qti-assessment-test identifier="T">
                <qti-test-part identifier="P">
                    <qti-assessment-section identifier="S">
                        <qti-assessment-item-ref identifier="WRONG" href="./items/a.xml"/>
                        <assessmentItemRef identifier="B" href="items/b.xml"/>
                    </qti-assessment-section>
                </qti-test-part>
            </qti-assessment-test>"#,
        )
        .unwrap();

        let refs = item_refs(&doc);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].identifier, "WRONG");
        assert_eq!(refs[0].normalized_href(), "items/a.xml");
        assert_eq!(refs[1].identifier, "B");
        assert_eq!(declared_identifier(&doc).as_deref(), Some("T"));
    }

    #[test]
    fn test_set_item_ref_identifier() {
        let mut doc = XmlDocument::parse(
            r#"<qti-assessment-test><qti-assessment-item-ref identifier="WRONG" href="a.xml"/></qti-assessment-test>"#,
        )
        .unwrap();
        let refs = item_refs(&doc);
        set_item_ref_identifier(&mut doc, &refs[0], "ITM-a");
        assert_eq!(item_refs(&doc)[0].identifier, "ITM-a");
    }

    #[test]
    fn test_declared_identifier_prefixed() {
        let doc = XmlDocument::parse(
            r#"<q:qti-assessment-item xmlns:q="urn:q" identifier="ITM-a" title="A"/>"#,
        )
        .unwrap();
        assert_eq!(declared_identifier(&doc).as_deref(), Some("ITM-a"));

        let none = XmlDocument::parse("<qti-assessment-item/>").unwrap();
        assert_eq!(declared_identifier(&none), None);
    }
}
