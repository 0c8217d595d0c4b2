//! Second-pass repair of item references across documents.
//!
//! Authoring tools sometimes give the same item different identifiers in the
//! test, the manifest and the item file itself. For every item reference
//! whose identifier is unknown to the manifest, the reconciler locates the
//! item file through the reference's href and makes the item's own
//! identifier authoritative: the reference and the manifest resource at
//! that href are both rewritten to it.
//!
//! Reconciliation needs the complete working set and therefore only runs
//! after every entry has been converted.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::common::{NodeId, Result, XmlDocument};
use crate::convert::report::ReconcileWarning;
use crate::package::packpath::{dirname, from_root_marker, join, resolve_lexical};
use crate::package::WorkingSet;
use crate::qti::assessment::{ItemRef, declared_identifier, item_refs, set_item_ref_identifier};
use crate::qti::classify::Classification;
use crate::qti::manifest::{
    dedupe_identifiers, find_by_href, find_by_identifier, rename_resource, resources, same_href,
    unused_identifier,
};

/// Repairs identifier mismatches between tests, items and the manifest.
#[derive(Debug, Clone, Default)]
pub struct ManifestReconciler {
    root_marker: Option<String>,
}

impl ManifestReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor resolved paths at the last segment named `marker`.
    pub fn with_root_marker(mut self, marker: Option<String>) -> Self {
        self.root_marker = marker;
        self
    }

    /// Turn an item href, relative to the test at `test_href`, into a
    /// package path.
    pub fn resolve_item_path(&self, test_href: &str, item_href: &str) -> Option<String> {
        let joined = join(dirname(test_href), item_href);
        match &self.root_marker {
            Some(marker) => {
                let anchored = from_root_marker(&joined, marker)?;
                Some(resolve_lexical(&anchored).unwrap_or(anchored))
            },
            None => resolve_lexical(&joined).filter(|p| !p.is_empty()),
        }
    }

    /// Reconcile every test in the working set.
    ///
    /// Runs in three steps so that tests sharing an item agree on its
    /// identifier:
    ///
    /// 1. every reference unknown to the manifest is resolved to an item,
    ///    whose declared identifier becomes the reference's target;
    /// 2. the manifest resource at each such item's href takes the item's
    ///    identifier. A resource elsewhere that already holds it is moved
    ///    to a fresh identifier first;
    /// 3. every reference is pointed at the current identifier of the
    ///    resource it resolved to, including references that matched the
    ///    manifest before step 2 renamed their resource.
    ///
    /// Tests are re-serialized only when one of their references changed.
    ///
    /// # Errors
    /// Only fails if a document in the working set cannot be parsed.
    pub fn reconcile(&self, set: &mut WorkingSet) -> Result<Vec<ReconcileWarning>> {
        let manifest_path = set.manifest_path();
        let mut manifest = match &manifest_path {
            Some(path) => set.parse_document(path)?,
            None => None,
        };
        // Identifiers as first declared; nodes stay put across renames
        let known: HashMap<String, NodeId> = manifest
            .as_ref()
            .map(|m| resources(m).into_iter().rev().map(|r| (r.identifier, r.node)).collect())
            .unwrap_or_default();

        let mut item_ids: HashMap<String, Option<String>> = HashMap::new();
        for path in set.paths_of(Classification::Item) {
            let id = set.parse_document(&path)?.and_then(|doc| declared_identifier(&doc));
            item_ids.insert(path, id);
        }

        let mut warnings = Vec::new();
        let mut planned: Vec<(String, String)> = Vec::new();
        let mut tests: Vec<(String, XmlDocument, Vec<(ItemRef, Option<String>)>)> = Vec::new();
        for test_path in set.paths_of(Classification::Test) {
            let Some(test) = set.parse_document(&test_path)? else {
                continue;
            };
            let test_href = manifest
                .as_ref()
                .and_then(|m| find_by_href(m, &test_path))
                .map_or_else(|| test_path.clone(), |r| r.href);

            let mut refs = Vec::new();
            for item_ref in item_refs(&test) {
                if known.contains_key(&item_ref.identifier) {
                    refs.push((item_ref, None));
                    continue;
                }
                let target = self.resolve_target(&test_path, &test_href, &item_ref, &item_ids, &mut warnings);
                if let Some((path, item_id)) = &target
                    && !planned.iter().any(|(href, _)| same_href(href, path))
                {
                    planned.push((path.clone(), item_id.clone()));
                }
                refs.push((item_ref, target.map(|(_, item_id)| item_id)));
            }
            tests.push((test_path, test, refs));
        }

        let manifest_changed = match manifest.as_mut() {
            Some(doc) => planned
                .iter()
                .fold(false, |changed, (href, item_id)| claim_identifier(doc, href, item_id) || changed),
            None => false,
        };

        for (test_path, mut test, refs) in tests {
            let mut test_changed = false;
            for (item_ref, target) in refs {
                let current = target.or_else(|| {
                    let doc = manifest.as_ref()?;
                    let node = known.get(&item_ref.identifier)?;
                    doc.attr(*node, "identifier").map(str::to_string)
                });
                if let Some(current) = current
                    && current != item_ref.identifier
                {
                    debug!(test = %test_path, from = %item_ref.identifier, to = %current, "rewriting item reference");
                    set_item_ref_identifier(&mut test, &item_ref, &current);
                    test_changed = true;
                }
            }
            if test_changed {
                set.store_document(&test_path, &test);
            }
        }

        if manifest_changed && let (Some(path), Some(doc)) = (&manifest_path, manifest.as_mut()) {
            dedupe_identifiers(doc);
            set.store_document(path, doc);
        }
        Ok(warnings)
    }

    /// Package path and declared identifier of the item a reference points
    /// at. Failures are recorded as warnings.
    fn resolve_target(
        &self,
        test_path: &str,
        test_href: &str,
        item_ref: &ItemRef,
        item_ids: &HashMap<String, Option<String>>,
        warnings: &mut Vec<ReconcileWarning>,
    ) -> Option<(String, String)> {
        let Some(resolved) = self.resolve_item_path(test_href, &item_ref.href) else {
            let warning = ReconcileWarning::RootNotFound {
                test_path: test_path.to_string(),
                identifier: item_ref.identifier.clone(),
                href: item_ref.href.clone(),
            };
            warn!("{}", warning);
            warnings.push(warning);
            return None;
        };
        match item_ids.get(&resolved) {
            Some(Some(item_id)) => {
                let item_id = item_id.clone();
                Some((resolved, item_id))
            },
            _ => {
                let warning = ReconcileWarning::UnresolvedItemRef {
                    test_path: test_path.to_string(),
                    identifier: item_ref.identifier.clone(),
                    attempted: resolved,
                };
                warn!("{}", warning);
                warnings.push(warning);
                None
            },
        }
    }
}

/// Give the resource at `href` the identifier `identifier`. A resource at
/// another href holding it is renamed out of the way first. Returns
/// whether the manifest changed.
fn claim_identifier(doc: &mut XmlDocument, href: &str, identifier: &str) -> bool {
    let Some(resource) = find_by_href(doc, href) else {
        return false;
    };
    if resource.identifier == identifier {
        return false;
    }
    if let Some(holder) = find_by_identifier(doc, identifier)
        && !same_href(&holder.href, &resource.href)
    {
        let moved = unused_identifier(doc, identifier);
        debug!(href = %holder.href, from = %identifier, to = %moved, "moving resource off a reconciled identifier");
        rename_resource(doc, identifier, &moved);
    }
    debug!(from = %resource.identifier, to = %identifier, "rewriting manifest resource identifier");
    rename_resource(doc, &resource.identifier, identifier);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageEntry;
    use proptest::prelude::*;

    fn manifest_xml(resources: &[(&str, &str, &str)]) -> String {
        let mut xml = String::from(r#"<manifest xmlns="http://www.imsglobal.org/xsd/qti/qtiv3p0/imscp_v1p1" identifier="M"><resources>"#);
        for (id, kind, href) in resources {
            xml.push_str(&format!(
                r#"<resource identifier="{}" type="{}" href="{}"><file href="{}"/></resource>"#,
                id, kind, href, href
            ));
        }
        xml.push_str("</resources></manifest>");
        xml
    }

    fn test_xml(refs: &[(&str, &str)]) -> String {
        let mut xml = String::from(r#"<qti-assessment-test identifier="T"><qti-test-part identifier="P"><qti-assessment-section identifier="S">"#);
        for (id, href) in refs {
            xml.push_str(&format!(r#"<qti-assessment-item-ref identifier="{}" href="{}"/>"#, id, href));
        }
        xml.push_str("</qti-assessment-section></qti-test-part></qti-assessment-test>");
        xml
    }

    fn item_xml(id: &str) -> String {
        format!(r#"<qti-assessment-item identifier="{}" title="x"/>"#, id)
    }

    fn set_of(entries: Vec<PackageEntry>) -> WorkingSet {
        entries.into_iter().collect()
    }

    #[test]
    fn test_divergent_identifier_is_repaired() {
        let mut set = set_of(vec![
            PackageEntry::text(
                "imsmanifest.xml",
                manifest_xml(&[
                    ("TEST", "imsqti_test_xmlv3p0", "test.xml"),
                    ("OLD-a", "imsqti_item_xmlv3p0", "items/a.xml"),
                ]),
                Classification::Manifest,
            ),
            PackageEntry::text("test.xml", test_xml(&[("WRONG", "items/a.xml")]), Classification::Test),
            PackageEntry::text("items/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);

        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert!(warnings.is_empty());

        let test = set.parse_document("test.xml").unwrap().unwrap();
        assert_eq!(item_refs(&test)[0].identifier, "ITM-a");
        let manifest = set.parse_document("imsmanifest.xml").unwrap().unwrap();
        assert_eq!(find_by_href(&manifest, "items/a.xml").unwrap().identifier, "ITM-a");
        assert!(find_by_identifier(&manifest, "OLD-a").is_none());
    }

    #[test]
    fn test_consistent_test_is_not_rewritten() {
        let original = test_xml(&[("ITM-a", "items/a.xml")]);
        let mut set = set_of(vec![
            PackageEntry::text(
                "imsmanifest.xml",
                manifest_xml(&[("ITM-a", "imsqti_item_xmlv3p0", "items/a.xml")]),
                Classification::Manifest,
            ),
            PackageEntry::text("test.xml", original.clone(), Classification::Test),
            PackageEntry::text("items/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);
        ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert_eq!(set.get("test.xml").unwrap().content.as_text(), Some(original.as_str()));
    }

    #[test]
    fn test_relative_href_from_test_directory() {
        let mut set = set_of(vec![
            PackageEntry::text("tests/test.xml", test_xml(&[("X", "../items/a.xml")]), Classification::Test),
            PackageEntry::text("items/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);
        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert!(warnings.is_empty());
        let test = set.parse_document("tests/test.xml").unwrap().unwrap();
        assert_eq!(item_refs(&test)[0].identifier, "ITM-a");
    }

    #[test]
    fn test_missing_item_is_reported() {
        let mut set = set_of(vec![PackageEntry::text(
            "tests/test.xml",
            test_xml(&[("X", "items/missing.xml"), ("Y", "../../escape.xml")]),
            Classification::Test,
        )]);
        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert_eq!(
            warnings,
            [
                ReconcileWarning::UnresolvedItemRef {
                    test_path: "tests/test.xml".to_string(),
                    identifier: "X".to_string(),
                    attempted: "tests/items/missing.xml".to_string(),
                },
                ReconcileWarning::RootNotFound {
                    test_path: "tests/test.xml".to_string(),
                    identifier: "Y".to_string(),
                    href: "../../escape.xml".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_root_marker_resolution() {
        let reconciler = ManifestReconciler::new().with_root_marker(Some("content".to_string()));
        assert_eq!(
            reconciler.resolve_item_path("content/tests/test.xml", "../content/items/a.xml").as_deref(),
            Some("content/items/a.xml")
        );
        assert_eq!(reconciler.resolve_item_path("tests/test.xml", "items/a.xml"), None);

        let mut set = set_of(vec![PackageEntry::text(
            "tests/test.xml",
            test_xml(&[("X", "items/a.xml")]),
            Classification::Test,
        )]);
        let warnings = reconciler.reconcile(&mut set).unwrap();
        assert!(matches!(warnings[0], ReconcileWarning::RootNotFound { .. }));
    }

    #[test]
    fn test_manifest_declared_test_href_is_the_base() {
        let mut set = set_of(vec![
            PackageEntry::text(
                "imsmanifest.xml",
                manifest_xml(&[("T", "imsqti_test_xmlv3p0", "./tests/test.xml")]),
                Classification::Manifest,
            ),
            PackageEntry::text("tests/test.xml", test_xml(&[("X", "a.xml")]), Classification::Test),
            PackageEntry::text("tests/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);
        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_identifier_held_elsewhere_moves_aside() {
        let mut set = set_of(vec![
            PackageEntry::text(
                "imsmanifest.xml",
                manifest_xml(&[
                    ("ITM-a", "webcontent", "other.html"),
                    ("OLD", "imsqti_item_xmlv3p0", "items/a.xml"),
                ]),
                Classification::Manifest,
            ),
            PackageEntry::text("test.xml", test_xml(&[("WRONG", "items/a.xml")]), Classification::Test),
            PackageEntry::text("items/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);

        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert!(warnings.is_empty());

        let test = set.parse_document("test.xml").unwrap().unwrap();
        assert_eq!(item_refs(&test)[0].identifier, "ITM-a");
        let manifest = set.parse_document("imsmanifest.xml").unwrap().unwrap();
        assert_eq!(find_by_identifier(&manifest, "ITM-a").unwrap().href, "items/a.xml");
        assert_eq!(find_by_href(&manifest, "other.html").unwrap().identifier, "ITM-a-1");
        assert!(find_by_identifier(&manifest, "OLD").is_none());
    }

    #[test]
    fn test_tests_sharing_an_item_agree() {
        let mut set = set_of(vec![
            PackageEntry::text(
                "imsmanifest.xml",
                manifest_xml(&[
                    ("A", "imsqti_test_xmlv3p0", "a-test.xml"),
                    ("B", "imsqti_test_xmlv3p0", "b-test.xml"),
                    ("OLD-a", "imsqti_item_xmlv3p0", "items/a.xml"),
                ]),
                Classification::Manifest,
            ),
            PackageEntry::text("a-test.xml", test_xml(&[("OLD-a", "items/a.xml")]), Classification::Test),
            PackageEntry::text("b-test.xml", test_xml(&[("WRONG", "items/a.xml")]), Classification::Test),
            PackageEntry::text("items/a.xml", item_xml("ITM-a"), Classification::Item),
        ]);

        let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");

        for path in ["a-test.xml", "b-test.xml"] {
            let test = set.parse_document(path).unwrap().unwrap();
            assert_eq!(item_refs(&test)[0].identifier, "ITM-a", "{path}");
        }
        let manifest = set.parse_document("imsmanifest.xml").unwrap().unwrap();
        assert_eq!(find_by_href(&manifest, "items/a.xml").unwrap().identifier, "ITM-a");
    }

    proptest! {
        #[test]
        fn prop_reconciliation_converges(
            wrong in "[A-Z][A-Za-z0-9_]{0,8}",
            own in "ITM-[a-z0-9]{1,8}",
            stale in "RES-[a-z0-9]{1,8}",
            file in "[a-z]{1,8}",
        ) {
            let href = format!("items/{}.xml", file);
            let mut set = set_of(vec![
                PackageEntry::text(
                    "imsmanifest.xml",
                    manifest_xml(&[(stale.as_str(), "imsqti_item_xmlv3p0", href.as_str())]),
                    Classification::Manifest,
                ),
                PackageEntry::text("test.xml", test_xml(&[(wrong.as_str(), href.as_str())]), Classification::Test),
                PackageEntry::text(href.clone(), item_xml(&own), Classification::Item),
            ]);

            let warnings = ManifestReconciler::new().reconcile(&mut set).unwrap();
            prop_assert!(warnings.is_empty());

            let test = set.parse_document("test.xml").unwrap().unwrap();
            let manifest = set.parse_document("imsmanifest.xml").unwrap().unwrap();
            prop_assert_eq!(&item_refs(&test)[0].identifier, &own);
            prop_assert_eq!(find_by_href(&manifest, &href).unwrap().identifier, own);
        }
    }
}
