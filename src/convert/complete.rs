//! Manifest completion: every test and item gets a resource.

use tracing::{debug, info};

use crate::common::{Result, XmlDocument};
use crate::convert::reconcile::ManifestReconciler;
use crate::package::packpath::basename;
use crate::package::{PackageEntry, WorkingSet};
use crate::qti::assessment::{declared_identifier, item_refs};
use crate::qti::classify::Classification;
use crate::qti::constants::MANIFEST_FILENAME;
use crate::qti::manifest::{
    ResourceType, add_dependency, add_resource, dedupe_identifiers, find_by_href, new_manifest,
};

/// Identifier given to a manifest created from scratch
const GENERATED_MANIFEST_ID: &str = "MANIFEST-QTI-1";

/// What [`complete_manifest`] added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionSummary {
    pub created_manifest: bool,
    pub added_resources: usize,
    pub added_dependencies: usize,
    pub deduplicated: usize,
}

/// Identifier for a document that declares none: its file name stem.
fn fallback_identifier(path: &str) -> String {
    let name = basename(path);
    name.rsplit_once('.').map_or(name, |(stem, _)| stem).to_string()
}

/// Add resources for tests and items the manifest does not list, and
/// dependencies from tests to the items they reference.
///
/// Items are registered before tests so test dependencies can point at
/// them. A manifest is created when the package has none.
pub fn complete_manifest(set: &mut WorkingSet, reconciler: &ManifestReconciler) -> Result<CompletionSummary> {
    let mut summary = CompletionSummary::default();
    let (manifest_path, mut manifest) = match set.manifest_path() {
        Some(path) => match set.parse_document(&path)? {
            Some(doc) => (path, doc),
            None => return Ok(summary),
        },
        None => {
            summary.created_manifest = true;
            (MANIFEST_FILENAME.to_string(), new_manifest(GENERATED_MANIFEST_ID)?)
        },
    };

    for (classification, kind) in [
        (Classification::Item, ResourceType::Item),
        (Classification::Test, ResourceType::Test),
    ] {
        for path in set.paths_of(classification) {
            if find_by_href(&manifest, &path).is_some() {
                continue;
            }
            let doc = set.parse_document(&path)?;
            let identifier = doc
                .as_ref()
                .and_then(declared_identifier)
                .unwrap_or_else(|| fallback_identifier(&path));
            debug!(path = %path, identifier = %identifier, "adding manifest resource");
            if add_resource(&mut manifest, &identifier, &kind, &path).is_some() {
                summary.added_resources += 1;
            }
        }
    }

    for test_path in set.paths_of(Classification::Test) {
        let Some(test) = set.parse_document(&test_path)? else {
            continue;
        };
        summary.added_dependencies += add_test_dependencies(&mut manifest, &test_path, &test, reconciler);
    }

    summary.deduplicated = dedupe_identifiers(&mut manifest);

    if summary.created_manifest {
        set.insert(PackageEntry::text(
            manifest_path,
            manifest.serialize(),
            Classification::Manifest,
        ));
    } else if summary.added_resources + summary.added_dependencies + summary.deduplicated > 0 {
        set.store_document(&manifest_path, &manifest);
    }

    if summary != CompletionSummary::default() {
        info!(
            resources = summary.added_resources,
            dependencies = summary.added_dependencies,
            created = summary.created_manifest,
            "completed manifest"
        );
    }
    Ok(summary)
}

fn add_test_dependencies(
    manifest: &mut XmlDocument,
    test_path: &str,
    test: &XmlDocument,
    reconciler: &ManifestReconciler,
) -> usize {
    let Some(test_resource) = find_by_href(manifest, test_path) else {
        return 0;
    };
    let mut added = 0;
    for item_ref in item_refs(test) {
        let Some(item_path) = reconciler.resolve_item_path(&test_resource.href, &item_ref.href) else {
            continue;
        };
        let Some(item_resource) = find_by_href(manifest, &item_path) else {
            continue;
        };
        if !test_resource.dependencies.contains(&item_resource.identifier)
            && add_dependency(manifest, test_resource.node, &item_resource.identifier)
        {
            added += 1;
        }
    }
    added
}
