//! In-memory working set of one conversion run.

use std::collections::BTreeMap;

use crate::common::{Result, XmlDocument};
use crate::package::entry::{EntryContent, PackageEntry};
use crate::qti::classify::Classification;

/// Converted entries keyed by package path.
///
/// Iteration is in path order, so output archives are reproducible
/// regardless of the order the source yielded its entries in.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    entries: BTreeMap<String, PackageEntry>,
}

impl WorkingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry under its own path, returning the entry it replaced.
    pub fn insert(&mut self, entry: PackageEntry) -> Option<PackageEntry> {
        self.entries.insert(entry.path.clone(), entry)
    }

    pub fn get(&self, path: &str) -> Option<&PackageEntry> {
        self.entries.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut PackageEntry> {
        self.entries.get_mut(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<PackageEntry> {
        self.entries.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageEntry> {
        self.entries.values()
    }

    /// Paths of all entries with the given classification, in path order.
    pub fn paths_of(&self, classification: Classification) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.classification == classification)
            .map(|e| e.path.clone())
            .collect()
    }

    /// Path of the package manifest, if the package has one.
    pub fn manifest_path(&self) -> Option<String> {
        self.paths_of(Classification::Manifest).into_iter().next()
    }

    /// Parse the text of an entry. Binary and missing entries yield `None`.
    ///
    /// # Errors
    /// A malformed document is reported against its path.
    pub fn parse_document(&self, path: &str) -> Result<Option<XmlDocument>> {
        match self.get(path).map(|e| &e.content) {
            Some(EntryContent::Text(text)) => XmlDocument::parse(text)
                .map(Some)
                .map_err(|e| e.in_entry(path)),
            _ => Ok(None),
        }
    }

    /// Replace the text of an existing entry with a serialized document.
    pub fn store_document(&mut self, path: &str, doc: &XmlDocument) {
        if let Some(entry) = self.get_mut(path) {
            entry.content = EntryContent::Text(doc.serialize());
        }
    }

    pub fn into_entries(self) -> impl Iterator<Item = PackageEntry> {
        self.entries.into_values()
    }
}

impl FromIterator<PackageEntry> for WorkingSet {
    fn from_iter<I: IntoIterator<Item = PackageEntry>>(iter: I) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}
