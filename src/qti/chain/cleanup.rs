//! Markup cleanup steps.

use crate::common::xml::{Attribute, Attributes, NodeId, XmlDocument};
use crate::qti::chain::drop_unused_declarations;
use crate::qti::constants::namespace::{MATHML, QTI_V3, SSML_MARKER, XHTML};

/// Styling classes with a semantic equivalent, in nesting order
const STYLE_CLASSES: [(&str, &str); 3] = [
    ("qti-bold", "strong"),
    ("qti-italic", "em"),
    ("qti-underline", "u"),
];

fn is_ssml(prefix: &str, uri: &str) -> bool {
    let uri = uri.to_ascii_lowercase();
    prefix == "ssml" || uri.contains(SSML_MARKER) || uri.ends_with("/synthesis")
}

fn is_ssml_element(doc: &XmlDocument, id: NodeId) -> bool {
    let Some(prefix) = doc.prefix(id) else {
        return false;
    };
    is_ssml(prefix, doc.lookup_namespace(id, Some(prefix)).unwrap_or_default())
}

pub(super) fn flatten_ssml(doc: &mut XmlDocument) -> usize {
    let targets: Vec<NodeId> = doc
        .elements()
        .into_iter()
        .filter(|&id| is_ssml_element(doc, id))
        .collect();
    for &id in targets.iter().rev() {
        doc.unwrap_element(id);
    }
    targets.len()
}

pub(super) fn strip_metadata(doc: &mut XmlDocument) -> usize {
    let root = doc.root_element();
    let blocks: Vec<NodeId> = doc
        .find_all_local(&["metadata", "qti-metadata", "material-info", "qti-material-info"])
        .into_iter()
        .filter(|&id| Some(id) != root)
        .collect();
    for &id in &blocks {
        doc.remove(id);
    }
    blocks.len() + drop_unused_declarations(doc, is_ssml)
}

pub(super) fn clean_markup(doc: &mut XmlDocument) -> usize {
    unprefix_mathml(doc) + semantic_styles(doc) + drop_empty_presentation(doc)
}

/// Rename MathML elements bound through a prefix to their local names.
/// The outermost renamed element of each formula declares MathML as its
/// default namespace.
fn unprefix_mathml(doc: &mut XmlDocument) -> usize {
    let targets: Vec<NodeId> = doc
        .elements()
        .into_iter()
        .filter(|&id| {
            doc.prefix(id)
                .is_some_and(|p| doc.lookup_namespace(id, Some(p)) == Some(MATHML))
        })
        .collect();

    for &id in &targets {
        let outermost = doc
            .parent(id)
            .is_none_or(|p| !targets.contains(&p));
        let local = doc.local_name(id).to_string();
        doc.set_name(id, local);
        if outermost {
            let mut attrs: Attributes = doc
                .attrs(id)
                .iter()
                .filter(|a| a.name != "xmlns")
                .cloned()
                .collect();
            attrs.insert(0, Attribute::new("xmlns", MATHML));
            doc.set_attrs(id, attrs);
        }
    }
    if targets.is_empty() {
        return 0;
    }
    targets.len() + drop_unused_declarations(doc, |_, uri| uri == MATHML)
}

fn semantic_styles(doc: &mut XmlDocument) -> usize {
    let mut changed = 0;
    for id in doc.find_all_local(&["span", "div"]) {
        let Some(class) = doc.attr(id, "class") else {
            continue;
        };
        let tokens: Vec<&str> = class.split_whitespace().collect();
        let tags: Vec<&str> = STYLE_CLASSES
            .iter()
            .filter(|(token, _)| tokens.contains(token))
            .map(|&(_, tag)| tag)
            .collect();
        let Some((&outer, inner)) = tags.split_first() else {
            continue;
        };
        let remaining = tokens
            .iter()
            .filter(|t| !STYLE_CLASSES.iter().any(|(token, _)| token == *t))
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let inner: Vec<&str> = inner.to_vec();

        let prefix = doc.prefix(id).map(str::to_string);
        let qualify = |local: &str| match &prefix {
            Some(p) => format!("{}:{}", p, local),
            None => local.to_string(),
        };

        doc.set_name(id, qualify(outer));
        if remaining.is_empty() {
            doc.remove_attr(id, "class");
        } else {
            doc.set_attr(id, "class", remaining);
        }

        let mut holder = id;
        for tag in inner {
            let wrapper = doc.create_element(qualify(tag));
            for child in doc.children(holder).to_vec() {
                doc.append_child(wrapper, child);
            }
            doc.append_child(holder, wrapper);
            holder = wrapper;
        }
        changed += 1;
    }
    changed
}

fn drop_empty_presentation(doc: &mut XmlDocument) -> usize {
    let mut changed = 0;
    for id in doc.elements() {
        for name in ["class", "style"] {
            if doc.attr(id, name).is_some_and(|v| v.trim().is_empty()) {
                doc.remove_attr(id, name);
                changed += 1;
            }
        }
    }
    changed
}

pub(super) fn convert_dialogs(doc: &mut XmlDocument) -> usize {
    let dialogs: Vec<(NodeId, String)> = doc
        .find_all_local(&["dialog"])
        .into_iter()
        .filter_map(|id| {
            let prefix = doc.prefix(id)?;
            let uri = doc.lookup_namespace(id, Some(prefix)).unwrap_or_default();
            (uri != QTI_V3 && uri != XHTML).then(|| (id, prefix.to_string()))
        })
        .collect();

    for (id, prefix) in &dialogs {
        let dialog_id = doc
            .attr(*id, "identifier")
            .or_else(|| doc.attr(*id, "id"))
            .unwrap_or_default()
            .to_string();
        let mut attrs = Attributes::new();
        attrs.push(Attribute::new("class", "qti-dialog"));
        attrs.push(Attribute::new("data-dialog-id", dialog_id));
        attrs.extend(
            doc.attrs(*id)
                .iter()
                .filter(|a| {
                    !matches!(a.name.as_str(), "identifier" | "id" | "class")
                        && a.prefix() != Some(prefix.as_str())
                })
                .cloned(),
        );
        doc.set_attrs(*id, attrs);
        doc.set_name(*id, "div");
    }

    if dialogs.is_empty() {
        return 0;
    }
    let prefixes: Vec<String> = dialogs.into_iter().map(|(_, p)| p).collect();
    let count = prefixes.len();
    drop_unused_declarations(doc, |prefix, _| prefixes.iter().any(|p| p == prefix));
    count
}
