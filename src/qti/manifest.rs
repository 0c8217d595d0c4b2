//! Manifest (`imsmanifest.xml`) access and normalization.
//!
//! Resources are read as views over the manifest tree: every call walks the
//! document again, so they are always consistent with the latest rewrite.
//! Mutations go through the helpers in this module, which know where new
//! elements belong and which qualified names to give them.

use std::collections::HashSet;

use tracing::debug;

use crate::common::xml::{Attribute, Attributes, NodeId, XmlDocument, escape_attr};
use crate::common::Result;
use crate::package::packpath::{normalize_href, resolve_lexical};
use crate::qti::constants::{MANIFEST_SCHEMA_LOCATION, namespace, resource_type};
use crate::qti::namespace::{PromoteOutcome, promote_to_default};

/// Resource type, mapped onto the fixed 3.0 vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceType {
    Item,
    Test,
    WebContent,
    AssociatedContent,
    ControlFile,
    /// A type string none of the known families matches
    Other(String),
}

impl ResourceType {
    /// Map a declared type string by substring, regardless of the version
    /// or casing the package was written with.
    pub fn from_declared(declared: &str) -> Self {
        let lower = declared.to_ascii_lowercase();
        if lower.contains("associatedcontent") {
            Self::AssociatedContent
        } else if lower.contains("controlfile") {
            Self::ControlFile
        } else if lower.contains("webcontent") {
            Self::WebContent
        } else if lower.contains("test") {
            Self::Test
        } else if lower.contains("item") {
            Self::Item
        } else {
            Self::Other(declared.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Item => resource_type::ITEM,
            Self::Test => resource_type::TEST,
            Self::WebContent => resource_type::WEBCONTENT,
            Self::AssociatedContent => resource_type::ASSOCIATED_CONTENT,
            Self::ControlFile => resource_type::CONTROL_FILE,
            Self::Other(s) => s,
        }
    }
}

/// One `resource` element of a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub node: NodeId,
    pub identifier: String,
    pub resource_type: ResourceType,
    pub href: String,
    /// `identifierref` values of the `dependency` children
    pub dependencies: Vec<String>,
    /// `href` values of the `file` children
    pub files: Vec<String>,
}

/// What [`normalize_manifest`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeSummary {
    pub promotion: PromoteOutcome,
    pub retyped: usize,
    pub deduplicated: usize,
}

/// Whether two references name the same package file.
pub fn same_href(a: &str, b: &str) -> bool {
    if normalize_href(a) == normalize_href(b) {
        return true;
    }
    match (resolve_lexical(a), resolve_lexical(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn is_resource(doc: &XmlDocument, id: NodeId) -> bool {
    doc.local_name(id) == "resource"
        && doc
            .parent(id)
            .is_some_and(|p| doc.is_element(p) && doc.local_name(p) == "resources")
}

fn child_values(doc: &XmlDocument, id: NodeId, local: &str, attr: &str) -> Vec<String> {
    doc.element_children(id)
        .into_iter()
        .filter(|&c| doc.local_name(c) == local)
        .filter_map(|c| doc.attr(c, attr).map(str::to_string))
        .collect()
}

fn read_resource(doc: &XmlDocument, id: NodeId) -> Resource {
    Resource {
        node: id,
        identifier: doc.attr(id, "identifier").unwrap_or_default().to_string(),
        resource_type: ResourceType::from_declared(doc.attr(id, "type").unwrap_or_default()),
        href: doc.attr(id, "href").unwrap_or_default().to_string(),
        dependencies: child_values(doc, id, "dependency", "identifierref"),
        files: child_values(doc, id, "file", "href"),
    }
}

/// All resources in document order.
pub fn resources(doc: &XmlDocument) -> Vec<Resource> {
    doc.elements()
        .into_iter()
        .filter(|&id| is_resource(doc, id))
        .map(|id| read_resource(doc, id))
        .collect()
}

/// Resource with the given identifier.
pub fn find_by_identifier(doc: &XmlDocument, identifier: &str) -> Option<Resource> {
    resources(doc).into_iter().find(|r| r.identifier == identifier)
}

/// Resource whose `href` names the same file as `href`.
pub fn find_by_href(doc: &XmlDocument, href: &str) -> Option<Resource> {
    resources(doc)
        .into_iter()
        .find(|r| !r.href.is_empty() && same_href(&r.href, href))
}

/// Rename a resource identifier and every dependency that refers to it.
///
/// Returns the number of attributes rewritten.
pub fn rename_resource(doc: &mut XmlDocument, old: &str, new: &str) -> usize {
    if old == new {
        return 0;
    }
    let mut rewritten = 0;
    for id in doc.elements() {
        let attr = match doc.local_name(id) {
            "resource" if is_resource(doc, id) => "identifier",
            "dependency" => "identifierref",
            _ => continue,
        };
        if doc.attr(id, attr) == Some(old) {
            doc.set_attr(id, attr, new);
            rewritten += 1;
        }
    }
    rewritten
}

/// Qualified name for a new element placed under `parent`, using the
/// parent's prefix so the new element lands in the same namespace.
fn qualified_under(doc: &XmlDocument, parent: NodeId, local: &str) -> String {
    match doc.prefix(parent) {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// The `resources` container, created at the end of the root if missing.
pub fn ensure_resources(doc: &mut XmlDocument) -> Option<NodeId> {
    let root = doc.root_element()?;
    if let Some(existing) = doc
        .element_children(root)
        .into_iter()
        .find(|&c| doc.local_name(c) == "resources")
    {
        return Some(existing);
    }
    let name = qualified_under(doc, root, "resources");
    let resources = doc.create_element(name);
    doc.append_child(root, resources);
    Some(resources)
}

/// Append a resource with a single `file` child for its href.
pub fn add_resource(
    doc: &mut XmlDocument,
    identifier: &str,
    kind: &ResourceType,
    href: &str,
) -> Option<NodeId> {
    let container = ensure_resources(doc)?;
    let resource_name = qualified_under(doc, container, "resource");
    let file_name = qualified_under(doc, container, "file");
    let resource = doc.create_element_with(
        resource_name,
        &[("identifier", identifier), ("type", kind.as_str()), ("href", href)],
    );
    let file = doc.create_element_with(file_name, &[("href", href)]);
    doc.append_child(resource, file);
    doc.append_child(container, resource);
    Some(resource)
}

/// Add a `dependency` on `identifierref` unless the resource already has
/// one. Returns whether an element was added.
pub fn add_dependency(doc: &mut XmlDocument, resource: NodeId, identifierref: &str) -> bool {
    let exists = doc
        .element_children(resource)
        .into_iter()
        .any(|c| doc.local_name(c) == "dependency" && doc.attr(c, "identifierref") == Some(identifierref));
    if exists {
        return false;
    }
    let name = qualified_under(doc, resource, "dependency");
    let dependency = doc.create_element_with(name, &[("identifierref", identifierref)]);
    doc.append_child(resource, dependency);
    true
}

/// Enforce identifier uniqueness across resources.
///
/// The first resource with an identifier wins. A later one pointing at the
/// same file is dropped; one pointing elsewhere is renamed with a `-N`
/// suffix. Returns how many resources were dropped or renamed.
pub fn dedupe_identifiers(doc: &mut XmlDocument) -> usize {
    let all = resources(doc);
    let mut taken: HashSet<String> = all.iter().map(|r| r.identifier.clone()).collect();
    let mut first_href: Vec<(String, String)> = Vec::new();
    let mut changed = 0;

    for resource in all {
        let Some((_, href)) = first_href.iter().find(|(id, _)| *id == resource.identifier) else {
            first_href.push((resource.identifier.clone(), resource.href.clone()));
            continue;
        };
        if same_href(href, &resource.href) {
            debug!(identifier = %resource.identifier, "dropping duplicate manifest resource");
            doc.remove(resource.node);
        } else {
            let renamed = first_free(&resource.identifier, &taken);
            debug!(from = %resource.identifier, to = %renamed, "renaming colliding manifest resource");
            doc.set_attr(resource.node, "identifier", renamed.clone());
            taken.insert(renamed);
        }
        changed += 1;
    }
    changed
}

/// `base-N` for the smallest `N` from 1 not in `taken`.
fn first_free(base: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// An identifier derived from `base` that no resource uses yet.
pub fn unused_identifier(doc: &XmlDocument, base: &str) -> String {
    let taken: HashSet<String> = resources(doc).into_iter().map(|r| r.identifier).collect();
    first_free(base, &taken)
}

/// Prefix bound to `uri` on the root element.
fn root_prefix_for(doc: &XmlDocument, root: NodeId, uri: &str) -> Option<String> {
    doc.attrs(root)
        .iter()
        .find(|a| a.prefix() == Some("xmlns") && a.value == uri)
        .map(|a| a.local_name().to_string())
}

/// Bring a manifest onto the 3.0 packaging vocabulary.
///
/// Promotes the packaging namespace to the default namespace, points every
/// packaging namespace declaration at the 3.0 URI, declares the metadata
/// and schema-instance namespaces, rewrites the schema location, remaps
/// resource types and removes identifier collisions.
pub fn normalize_manifest(doc: &mut XmlDocument) -> NormalizeSummary {
    let promotion = promote_to_default(doc, namespace::IMSCP_MARKER);
    if promotion == PromoteOutcome::NamespaceNotFound {
        debug!("manifest declares no prefixed packaging namespace");
    }

    for id in doc.elements() {
        let stale: Vec<String> = doc
            .attrs(id)
            .iter()
            .filter(|a| {
                a.is_namespace_decl()
                    && a.value != namespace::IMSCP_V3
                    && a.value.to_ascii_lowercase().contains(namespace::IMSCP_MARKER)
            })
            .map(|a| a.name.clone())
            .collect();
        for name in stale {
            doc.set_attr(id, &name, namespace::IMSCP_V3);
        }
    }

    if let Some(root) = doc.root_element() {
        declare_root_namespaces(doc, root);
    }

    let mut retyped = 0;
    for resource in resources(doc) {
        let mapped = resource.resource_type.as_str();
        if doc.attr(resource.node, "type").is_some_and(|t| t != mapped) {
            doc.set_attr(resource.node, "type", mapped.to_string());
            retyped += 1;
        }
    }

    let deduplicated = dedupe_identifiers(doc);
    NormalizeSummary {
        promotion,
        retyped,
        deduplicated,
    }
}

fn declare_root_namespaces(doc: &mut XmlDocument, root: NodeId) {
    let mut attrs: Attributes = doc.attrs(root).iter().cloned().collect();
    if doc.prefix(root).is_none() && !attrs.iter().any(|a| a.name == "xmlns") {
        attrs.insert(0, Attribute::new("xmlns", namespace::IMSCP_V3));
    }

    let has_imsmd = attrs
        .iter()
        .any(|a| a.prefix() == Some("xmlns") && a.value == namespace::IMSMD);
    let imsmd_decl = format!("xmlns:{}", namespace::IMSMD_PREFIX);
    if !has_imsmd && !attrs.iter().any(|a| a.name == imsmd_decl) {
        attrs.push(Attribute::new(imsmd_decl, namespace::IMSMD));
    }
    doc.set_attrs(root, attrs);

    let xsi = match root_prefix_for(doc, root, namespace::XSI) {
        Some(prefix) => prefix,
        None => {
            doc.set_attr(root, "xmlns:xsi", namespace::XSI);
            "xsi".to_string()
        },
    };
    doc.set_attr(root, &format!("{}:schemaLocation", xsi), MANIFEST_SCHEMA_LOCATION);
}

/// A fresh, empty 3.0 manifest.
///
/// # Errors
/// Only fails if the identifier produces malformed markup, which escaping
/// rules out; the `Result` keeps the parse path honest.
pub fn new_manifest(identifier: &str) -> Result<XmlDocument> {
    let xml = format!(
        r#"<manifest xmlns="{ns}" xmlns:{md_prefix}="{md}" xmlns:xsi="{xsi}" identifier="{id}" xsi:schemaLocation="{location}"><metadata><schema>QTI Package</schema><schemaversion>3.0.0</schemaversion></metadata><organizations/><resources/></manifest>"#,
        ns = namespace::IMSCP_V3,
        md_prefix = namespace::IMSMD_PREFIX,
        md = namespace::IMSMD,
        xsi = namespace::XSI,
        id = escape_attr(identifier),
        location = MANIFEST_SCHEMA_LOCATION,
    );
    XmlDocument::parse(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V2_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest xmlns="http://www.imsglobal.org/xsd/imscp_v1p1" identifier="M1">
  <organizations/>
  <resources>
    <resource identifier="T1" type="imsqti_test_xmlv2p1" href="tests/test.xml">
      <file href="tests/test.xml"/>
      <dependency identifierref="I1"/>
    </resource>
    <resource identifier="I1" type="imsqti_item_xmlv2p1" href="items/a.xml">
      <file href="items/a.xml"/>
      <file href="media/a.png"/>
    </resource>
    <resource identifier="CSS" type="webcontent" href="style/main.css"/>
  </resources>
</manifest>"#;

    #[test]
    fn test_resource_type_mapping() {
        assert_eq!(ResourceType::from_declared("imsqti_item_xmlv2p1"), ResourceType::Item);
        assert_eq!(ResourceType::from_declared("imsqti_test_xmlv2p2"), ResourceType::Test);
        assert_eq!(ResourceType::from_declared("webcontent"), ResourceType::WebContent);
        assert_eq!(
            ResourceType::from_declared("associatedcontent/imsqti_xmlv2p1/learning-application-resource"),
            ResourceType::AssociatedContent
        );
        assert_eq!(ResourceType::from_declared("controlfile/xmlv1p0"), ResourceType::ControlFile);
        assert_eq!(ResourceType::Item.as_str(), "imsqti_item_xmlv3p0");
        assert_eq!(ResourceType::from_declared("custom").as_str(), "custom");
    }

    #[test]
    fn test_resources_view() {
        let doc = XmlDocument::parse(V2_MANIFEST).unwrap();
        let all = resources(&doc);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].identifier, "T1");
        assert_eq!(all[0].resource_type, ResourceType::Test);
        assert_eq!(all[0].dependencies, ["I1"]);
        assert_eq!(all[1].files, ["items/a.xml", "media/a.png"]);

        assert_eq!(find_by_identifier(&doc, "I1").unwrap().href, "items/a.xml");
        assert_eq!(find_by_href(&doc, "./items/a.xml").unwrap().identifier, "I1");
        assert!(find_by_href(&doc, "items/b.xml").is_none());
    }

    #[test]
    fn test_rename_updates_dependencies() {
        let mut doc = XmlDocument::parse(V2_MANIFEST).unwrap();
        assert_eq!(rename_resource(&mut doc, "I1", "ITM-a"), 2);
        assert!(find_by_identifier(&doc, "I1").is_none());
        assert_eq!(find_by_identifier(&doc, "T1").unwrap().dependencies, ["ITM-a"]);
    }

    #[test]
    fn test_normalize_v2_manifest() {
        let mut doc = XmlDocument::parse(V2_MANIFEST).unwrap();
        let summary = normalize_manifest(&mut doc);
        assert_eq!(summary.promotion, PromoteOutcome::NamespaceNotFound);
        assert_eq!(summary.retyped, 2);
        assert_eq!(summary.deduplicated, 0);

        let root = doc.root_element().unwrap();
        assert_eq!(doc.attr(root, "xmlns"), Some(namespace::IMSCP_V3));
        assert_eq!(doc.attr(root, "xmlns:imsmd"), Some(namespace::IMSMD));
        assert_eq!(doc.attr(root, "xsi:schemaLocation"), Some(MANIFEST_SCHEMA_LOCATION));

        let types: Vec<_> = resources(&doc).into_iter().map(|r| r.resource_type).collect();
        assert_eq!(types, [ResourceType::Test, ResourceType::Item, ResourceType::WebContent]);
        assert_eq!(doc.attr(resources(&doc)[1].node, "type"), Some("imsqti_item_xmlv3p0"));
    }

    #[test]
    fn test_normalize_prefixed_manifest() {
        let mut doc = XmlDocument::parse(
            r#"<x:manifest xmlns:x="http://www.imsglobal.org/xsd/imscp_v1p1/" identifier="M">
                <x:resources>
                    <x:resource identifier="R" type="imsqti_item_xmlv2p1" href="a.xml"/>
                </x:resources>
            </x:manifest>"#,
        )
        .unwrap();
        let summary = normalize_manifest(&mut doc);
        assert!(matches!(summary.promotion, PromoteOutcome::Promoted { .. }));

        let out = doc.serialize();
        assert!(!out.contains("x:"));
        assert!(out.contains(&format!(r#"<manifest xmlns="{}""#, namespace::IMSCP_V3)));
        assert_eq!(resources(&doc).len(), 1);
    }

    #[test]
    fn test_normalize_is_stable() {
        let mut doc = XmlDocument::parse(V2_MANIFEST).unwrap();
        normalize_manifest(&mut doc);
        let once = doc.serialize();
        let mut again = XmlDocument::parse(&once).unwrap();
        let summary = normalize_manifest(&mut again);
        assert_eq!(summary.retyped, 0);
        assert_eq!(again.serialize(), once);
    }

    #[test]
    fn test_dedupe_identifiers() {
        let mut doc = XmlDocument::parse(
            r#"<manifest><resources>
                <resource identifier="A" href="a.xml"/>
                <resource identifier="A" href="./a.xml"/>
                <resource identifier="A" href="b.xml"/>
                <resource identifier="A-1" href="c.xml"/>
            </resources></manifest>"#,
        )
        .unwrap();
        assert_eq!(dedupe_identifiers(&mut doc), 2);

        let ids: Vec<_> = resources(&doc).into_iter().map(|r| r.identifier).collect();
        assert_eq!(ids, ["A", "A-2", "A-1"]);
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_add_resource_and_dependency() {
        let mut doc = new_manifest("MANIFEST-1").unwrap();
        let node = add_resource(&mut doc, "ITM-a", &ResourceType::Item, "items/a.xml").unwrap();
        assert!(add_dependency(&mut doc, node, "CSS"));
        assert!(!add_dependency(&mut doc, node, "CSS"));

        let res = find_by_href(&doc, "items/a.xml").unwrap();
        assert_eq!(res.identifier, "ITM-a");
        assert_eq!(res.resource_type, ResourceType::Item);
        assert_eq!(res.files, ["items/a.xml"]);
        assert_eq!(res.dependencies, ["CSS"]);
    }

    #[test]
    fn test_add_resource_creates_container() {
        let mut doc = XmlDocument::parse("<manifest identifier=\"M\"/>").unwrap();
        add_resource(&mut doc, "T", &ResourceType::Test, "test.xml").unwrap();
        assert_eq!(
            doc.serialize(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<manifest identifier=\"M\">\n  <resources>\n    <resource identifier=\"T\" type=\"imsqti_test_xmlv3p0\" href=\"test.xml\">\n      <file href=\"test.xml\"/>\n    </resource>\n  </resources>\n</manifest>\n"
        );
    }

    #[test]
    fn test_unused_identifier() {
        let doc = XmlDocument::parse(
            r#"<manifest><resources><resource identifier="A" href="a.xml"/><resource identifier="A-1" href="b.xml"/></resources></manifest>"#,
        )
        .unwrap();
        assert_eq!(unused_identifier(&doc, "A"), "A-2");
        assert_eq!(unused_identifier(&doc, "B"), "B-1");
    }
}
