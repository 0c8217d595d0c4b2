//! File references carried by document attributes.
//!
//! A reference is any value of an attribute in
//! [`REFERENCE_ATTRIBUTES`](crate::qti::constants::REFERENCE_ATTRIBUTES)
//! that points at another file of the package. External URLs, inline data
//! URIs and same-document fragments are not package files and are skipped.

use crate::common::xml::{NodeId, XmlDocument};
use crate::package::packpath::{basename, normalize_href};
use crate::qti::constants::REFERENCE_ATTRIBUTES;

/// One attribute value referring to a package file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    /// Element carrying the attribute
    pub node: NodeId,
    /// Attribute name
    pub attribute: String,
    /// Reference as written, with leading `./` and `/` stripped
    pub href: String,
}

impl FileReference {
    /// Final path segment of the reference.
    pub fn basename(&self) -> &str {
        basename(&self.href)
    }
}

/// Whether a reference value can name a file inside the package.
pub fn is_package_reference(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value.starts_with('#') {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    !(lower.starts_with("data:")
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("mailto:")
        || lower.starts_with("javascript:"))
}

/// All package-file references in document order.
pub fn file_references(doc: &XmlDocument) -> Vec<FileReference> {
    let mut refs = Vec::new();
    for id in doc.elements() {
        for attr in doc.attrs(id) {
            if REFERENCE_ATTRIBUTES.contains(&attr.local_name()) && is_package_reference(&attr.value) {
                refs.push(FileReference {
                    node: id,
                    attribute: attr.name.clone(),
                    href: normalize_href(&attr.value).to_string(),
                });
            }
        }
    }
    refs
}
