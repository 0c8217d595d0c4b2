//! Promotion of a prefixed namespace to the default namespace.
//!
//! Manifests are frequently authored with the packaging namespace bound to a
//! prefix (`<imscp:manifest xmlns:imscp="...">`). Downstream consumers expect
//! it as the default namespace, so [`promote_to_default`] rewrites the tree
//! until the target namespace is unprefixed while every element keeps its
//! namespace-qualified identity.
//!
//! The rewrite runs in two phases. A worklist walk carries the inherited
//! namespace scope (input default, output default, whether the prefix is
//! bound to the target) down the tree and records one rewrite per element.
//! The rewrites are then applied bottom-up, so the result does not depend
//! on the mutation order of the tree.
//!
//! When the document already has a different default namespace, elements in
//! it are moved to the `olddefault` prefix first; otherwise they would be
//! captured by the promoted namespace.

use tracing::debug;

use crate::common::xml::{Attribute, Attributes, NodeId, XmlDocument, local_part};
use crate::qti::constants::namespace::OLD_DEFAULT_PREFIX;

/// What [`promote_to_default`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteOutcome {
    /// The target namespace was bound to `prefix` and is now the default.
    Promoted {
        prefix: String,
        /// Elements moved from the displaced default namespace to the
        /// holding prefix.
        rehomed: usize,
    },
    /// No prefix is bound to the target namespace; the document is untouched.
    NamespaceNotFound,
}

/// Inherited namespace context of one element.
#[derive(Debug, Clone)]
struct Scope {
    /// Default namespace in scope in the input document
    source_default: Option<String>,
    /// Default namespace in scope in the rewritten document
    output_default: Option<String>,
    /// Whether the promoted prefix is bound to the target here
    target_bound: bool,
}

/// Pending change to one element.
#[derive(Debug)]
struct Rewrite {
    id: NodeId,
    name: String,
    attrs: Attributes,
}

/// Compare namespace URIs the way authoring tools vary them: ignoring case
/// and a trailing slash.
fn same_namespace(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

fn matches_target(uri: &str, needle: &str) -> bool {
    uri.to_ascii_lowercase().contains(needle)
}

/// Make the namespace matching `target_uri` the default namespace.
///
/// `target_uri` is matched case-insensitively as a substring of the
/// declared namespace URIs, so `imscp_v1p1` finds both the 2.x and the 3.0
/// packaging namespace. The declared URI is kept as written.
pub fn promote_to_default(doc: &mut XmlDocument, target_uri: &str) -> PromoteOutcome {
    let needle = target_uri.trim_end_matches('/').to_ascii_lowercase();

    let Some((prefix, bound_uri)) = find_prefix_binding(doc, &needle) else {
        debug!(target = target_uri, "no prefix bound to namespace, nothing to promote");
        return PromoteOutcome::NamespaceNotFound;
    };

    let Some(root) = doc.root_element() else {
        return PromoteOutcome::NamespaceNotFound;
    };

    let displaced = doc
        .attr(root, "xmlns")
        .filter(|uri| !uri.is_empty() && !same_namespace(uri, &bound_uri))
        .map(str::to_string);
    let holding_prefix = displaced.as_ref().map(|_| unused_prefix(doc, OLD_DEFAULT_PREFIX));

    let plan = Planner {
        doc: &*doc,
        prefix: &prefix,
        needle: &needle,
        bound_uri: &bound_uri,
        displaced: displaced.as_deref(),
        holding_prefix: holding_prefix.as_deref(),
    };
    let (rewrites, rehomed) = plan.collect(root);

    // Apply bottom-up
    for rewrite in rewrites.into_iter().rev() {
        doc.set_name(rewrite.id, rewrite.name);
        doc.set_attrs(rewrite.id, rewrite.attrs);
    }

    debug!(prefix = %prefix, rehomed, "promoted namespace to default");
    PromoteOutcome::Promoted { prefix, rehomed }
}

/// First `xmlns:<prefix>` declaration (document order) bound to the target.
fn find_prefix_binding(doc: &XmlDocument, needle: &str) -> Option<(String, String)> {
    doc.elements().into_iter().find_map(|id| {
        doc.attrs(id)
            .iter()
            .find(|a| a.name.starts_with("xmlns:") && matches_target(&a.value, needle))
            .map(|a| (a.local_name().to_string(), a.value.clone()))
    })
}

/// A prefix not declared anywhere in the document.
fn unused_prefix(doc: &XmlDocument, base: &str) -> String {
    let declared: Vec<String> = doc
        .elements()
        .into_iter()
        .flat_map(|id| {
            doc.attrs(id)
                .iter()
                .filter_map(|a| a.name.strip_prefix("xmlns:").map(str::to_string))
                .collect::<Vec<_>>()
        })
        .collect();
    let mut candidate = base.to_string();
    let mut n = 1;
    while declared.contains(&candidate) {
        candidate = format!("{}{}", base, n);
        n += 1;
    }
    candidate
}

struct Planner<'a> {
    doc: &'a XmlDocument,
    prefix: &'a str,
    needle: &'a str,
    bound_uri: &'a str,
    displaced: Option<&'a str>,
    holding_prefix: Option<&'a str>,
}

impl Planner<'_> {
    fn collect(&self, root: NodeId) -> (Vec<Rewrite>, usize) {
        let mut rewrites = Vec::new();
        let mut rehomed = 0;
        let mut work = vec![(
            root,
            Scope {
                source_default: None,
                output_default: None,
                target_bound: false,
            },
        )];

        while let Some((id, scope)) = work.pop() {
            let (rewrite, child_scope, moved) = self.plan_element(id, &scope);
            if moved {
                rehomed += 1;
            }
            if let Some(rewrite) = rewrite {
                rewrites.push(rewrite);
            }
            for child in self.doc.element_children(id).into_iter().rev() {
                work.push((child, child_scope.clone()));
            }
        }

        // Document order, so the caller can apply in reverse
        rewrites.sort_by_key(|r| r.id);
        (rewrites, rehomed)
    }

    fn plan_element(&self, id: NodeId, scope: &Scope) -> (Option<Rewrite>, Scope, bool) {
        let doc = self.doc;
        let prefixed_decl = format!("xmlns:{}", self.prefix);
        let attr_prefix = format!("{}:", self.prefix);

        let own_default = doc.attr(id, "xmlns");
        let source_default = match own_default {
            Some("") => None,
            Some(uri) => Some(uri.to_string()),
            None => scope.source_default.clone(),
        };
        let target_bound = match doc.attr(id, &prefixed_decl) {
            Some(uri) => matches_target(uri, self.needle),
            None => scope.target_bound,
        };

        let mut output_default = scope.output_default.clone();
        let mut attrs = Attributes::new();
        let mut promoted_at: Option<usize> = None;
        let mut keeps_other_default = false;

        for attr in doc.attrs(id) {
            if attr.name == prefixed_decl && matches_target(&attr.value, self.needle) {
                promoted_at = Some(attrs.len());
                continue;
            }
            if attr.name == "xmlns" {
                match (self.displaced, self.holding_prefix) {
                    (Some(old), Some(holding)) if same_namespace(&attr.value, old) => {
                        attrs.push(Attribute::new(format!("xmlns:{}", holding), attr.value.clone()));
                    },
                    _ => {
                        output_default = Some(attr.value.clone()).filter(|v| !v.is_empty());
                        keeps_other_default = !same_namespace(&attr.value, self.bound_uri);
                        attrs.push(attr.clone());
                    },
                }
                continue;
            }
            if target_bound && attr.name.starts_with(&attr_prefix) {
                let local = local_part(&attr.name);
                if doc.attr(id, local).is_none() {
                    attrs.push(Attribute::new(local, attr.value.clone()));
                }
                continue;
            }
            attrs.push(attr.clone());
        }

        // The prefixed declaration turns into a bare default declaration
        // unless the element pins a different default of its own.
        if let Some(pos) = promoted_at
            && !keeps_other_default
        {
            if !attrs.iter().any(|a| a.name == "xmlns") {
                attrs.insert(pos, Attribute::new("xmlns", self.bound_uri));
            }
            output_default = Some(self.bound_uri.to_string());
        }

        let local = doc.local_name(id);
        let mut moved = false;
        let (name, required_default) = match doc.prefix(id) {
            Some(p) if p == self.prefix && target_bound => {
                (local.to_string(), Some(Some(self.bound_uri.to_string())))
            },
            Some(_) => (doc.name(id).to_string(), None),
            None => match (self.displaced, self.holding_prefix) {
                (Some(old), Some(holding))
                    if source_default.as_deref().is_some_and(|d| same_namespace(d, old)) =>
                {
                    moved = true;
                    (format!("{}:{}", holding, local), None)
                },
                _ => (local.to_string(), Some(source_default.clone())),
            },
        };

        // Unprefixed output elements must see the namespace they had before
        if let Some(required) = required_default {
            let in_scope = output_default.as_deref();
            let satisfied = match (in_scope, required.as_deref()) {
                (Some(a), Some(b)) => same_namespace(a, b),
                (None, None) => true,
                _ => false,
            };
            if !satisfied {
                let value = required.clone().unwrap_or_default();
                match attrs.iter_mut().find(|a| a.name == "xmlns") {
                    Some(existing) => existing.value = value,
                    None => attrs.insert(promoted_at.unwrap_or(0), Attribute::new("xmlns", value)),
                }
                output_default = required;
            }
        }

        let changed = name != doc.name(id) || attrs.as_slice() != doc.attrs(id);
        let rewrite = changed.then(|| Rewrite { id, name, attrs });
        let child_scope = Scope {
            source_default,
            output_default,
            target_bound,
        };
        (rewrite, child_scope, moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qti::constants::namespace::{IMSCP_MARKER, IMSCP_V2};

    /// (namespace, local name) of every element in document order.
    fn expanded_names(doc: &XmlDocument) -> Vec<(Option<String>, String)> {
        doc.elements()
            .into_iter()
            .map(|id| {
                (
                    doc.namespace_uri(id).map(|u| u.trim_end_matches('/').to_ascii_lowercase()),
                    doc.local_name(id).to_string(),
                )
            })
            .collect()
    }

    fn promote(xml: &str) -> (XmlDocument, XmlDocument, PromoteOutcome) {
        let before = XmlDocument::parse(xml).unwrap();
        let mut after = before.clone();
        let outcome = promote_to_default(&mut after, IMSCP_MARKER);
        // Round trip through text to make sure the output re-parses
        let after = XmlDocument::parse(&after.serialize()).unwrap();
        (before, after, outcome)
    }

    #[test]
    fn test_prefixed_manifest_becomes_default() {
        let xml = format!(
            r#"<x:manifest xmlns:x="{IMSCP_V2}" identifier="m"><x:resources><x:resource identifier="r1" x:href="a.xml"/></x:resources></x:manifest>"#
        );
        let (before, after, outcome) = promote(&xml);
        assert_eq!(
            outcome,
            PromoteOutcome::Promoted {
                prefix: "x".to_string(),
                rehomed: 0
            }
        );

        let text = after.serialize();
        assert!(text.contains(&format!(r#"<manifest xmlns="{IMSCP_V2}" identifier="m">"#)));
        assert!(text.contains(r#"<resource identifier="r1" href="a.xml"/>"#));
        assert!(!text.contains("x:"));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }

    #[test]
    fn test_existing_default_is_rehomed() {
        let xml = format!(
            r#"<manifest xmlns="urn:old" xmlns:cp="{IMSCP_V2}"><cp:resources><entry/></cp:resources><other/></manifest>"#
        );
        let (before, after, outcome) = promote(&xml);
        assert_eq!(
            outcome,
            PromoteOutcome::Promoted {
                prefix: "cp".to_string(),
                rehomed: 3
            }
        );
        let text = after.serialize();
        assert!(text.contains(&format!(
            r#"<olddefault:manifest xmlns:olddefault="urn:old" xmlns="{IMSCP_V2}">"#
        )));
        assert!(text.contains("<olddefault:entry/>"));
        assert!(text.contains("<resources>"));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }

    #[test]
    fn test_default_equal_to_target_is_not_rehomed() {
        let xml = format!(
            r#"<manifest xmlns="{IMSCP_V2}" xmlns:cp="{IMSCP_V2}/"><cp:resources><resource/></cp:resources></manifest>"#
        );
        let (before, after, outcome) = promote(&xml);
        assert!(matches!(outcome, PromoteOutcome::Promoted { rehomed: 0, .. }));
        let text = after.serialize();
        assert!(!text.contains("olddefault"));
        assert!(!text.contains("cp:"));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }

    #[test]
    fn test_unqualified_elements_keep_no_namespace() {
        let xml = format!(r#"<x:manifest xmlns:x="{IMSCP_V2}"><plain><x:inner/></plain></x:manifest>"#);
        let (before, after, _) = promote(&xml);
        let text = after.serialize();
        assert!(text.contains(r#"<plain xmlns="">"#));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }

    #[test]
    fn test_nested_foreign_default_untouched() {
        let xml = format!(
            r#"<x:manifest xmlns:x="{IMSCP_V2}"><x:metadata><lom xmlns="http://ltsc.ieee.org/xsd/LOM"><general/></lom></x:metadata></x:manifest>"#
        );
        let (before, after, _) = promote(&xml);
        let text = after.serialize();
        assert!(text.contains(r#"<lom xmlns="http://ltsc.ieee.org/xsd/LOM">"#));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }

    #[test]
    fn test_namespace_not_found_is_noop() {
        let xml = r#"<manifest xmlns="urn:other"><resources/></manifest>"#;
        let mut doc = XmlDocument::parse(xml).unwrap();
        let before = doc.serialize();
        assert_eq!(promote_to_default(&mut doc, IMSCP_MARKER), PromoteOutcome::NamespaceNotFound);
        assert_eq!(doc.serialize(), before);
    }

    #[test]
    fn test_holding_prefix_avoids_collision() {
        let xml = format!(
            r#"<manifest xmlns="urn:old" xmlns:olddefault="urn:taken" xmlns:cp="{IMSCP_V2}"><cp:resources/></manifest>"#
        );
        let (before, after, _) = promote(&xml);
        assert!(after.serialize().contains("<olddefault1:manifest"));
        assert_eq!(expanded_names(&before), expanded_names(&after));
    }
}
