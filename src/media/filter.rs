//! Removal of media files from a converted package.
//!
//! Stripping runs in two passes over the working set. The inventory pass
//! records every binary entry with its size and every file referenced from
//! a test or item. The filters are then resolved into a set of basenames,
//! and the rewrite pass replaces each reference to one of them with an
//! inline placeholder image (or deletes it, for stylesheets and schemas),
//! prunes the manifest and drops the binaries themselves.

use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;

use tracing::{debug, info};

use crate::common::{Error, NodeId, Result, XmlDocument};
use crate::media::placeholder::placeholder_data_uri;
use crate::package::entry::EntryContent;
use crate::package::packpath::{basename, extension};
use crate::package::WorkingSet;
use crate::qti::chain::name_like;
use crate::qti::classify::Classification;
use crate::qti::constants::{MEDIA_INTERACTIONS, NON_REPLACEABLE_EXTENSIONS};
use crate::qti::manifest::resources;
use crate::qti::references::file_references;

/// Broad kind of a media file, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaClass {
    Audio,
    Video,
    Image,
    Unknown,
}

impl MediaClass {
    /// Classify a path by its extension.
    pub fn from_path(path: &str) -> Self {
        match extension(path).as_str() {
            "mp3" | "wav" | "ogg" | "oga" | "m4a" | "aac" | "flac" | "weba" => Self::Audio,
            "mp4" | "m4v" | "webm" | "ogv" | "mov" | "avi" | "mkv" | "wmv" => Self::Video,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "bmp" | "webp" | "tif" | "tiff" => Self::Image,
            _ => Self::Unknown,
        }
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "audio" => Some(Self::Audio),
            "video" => Some(Self::Video),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// One filter selecting media to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFilter {
    /// Every file of a media class (`audio`, `video`, `image`)
    Class(MediaClass),
    /// Files with an extension, stored lowercase without the dot (`.mp3`)
    Extension(String),
    /// Files strictly larger than a byte count (`500kb`, `2mb`)
    LargerThan(u64),
}

impl MediaFilter {
    /// Parse a filter token.
    ///
    /// ```
    /// use qti_migrate::media::{MediaClass, MediaFilter};
    /// assert_eq!(MediaFilter::parse("video").unwrap(), MediaFilter::Class(MediaClass::Video));
    /// assert_eq!(MediaFilter::parse(".MP3").unwrap(), MediaFilter::Extension("mp3".into()));
    /// assert_eq!(MediaFilter::parse("2mb").unwrap(), MediaFilter::LargerThan(2 * 1024 * 1024));
    /// assert!(MediaFilter::parse("huge").is_err());
    /// ```
    ///
    /// # Errors
    /// Returns [`Error::InvalidFilter`] for tokens that are neither a class,
    /// an extension nor a size.
    pub fn parse(token: &str) -> Result<Self> {
        let lower = token.trim().to_ascii_lowercase();
        if let Some(class) = MediaClass::from_keyword(&lower) {
            return Ok(Self::Class(class));
        }
        if let Some(ext) = lower.strip_prefix('.') {
            if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Ok(Self::Extension(ext.to_string()));
            }
            return Err(Error::InvalidFilter(token.to_string()));
        }
        parse_size(&lower)
            .map(Self::LargerThan)
            .ok_or_else(|| Error::InvalidFilter(token.to_string()))
    }

    fn matches(&self, item: &MediaItem) -> bool {
        match self {
            Self::Class(class) => item.class == *class,
            Self::Extension(ext) => extension(&item.basename) == *ext,
            Self::LargerThan(limit) => item.size > *limit,
        }
    }
}

impl FromStr for MediaFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// `NNkb` / `NNmb` in bytes.
fn parse_size(token: &str) -> Option<u64> {
    let (digits, unit) = if let Some(n) = token.strip_suffix("kb") {
        (n, 1024)
    } else if let Some(n) = token.strip_suffix("mb") {
        (n, 1024 * 1024)
    } else {
        return None;
    };
    digits.trim().parse::<u64>().ok()?.checked_mul(unit)
}

/// A file seen during the inventory pass.
#[derive(Debug, Clone)]
struct MediaItem {
    basename: String,
    class: MediaClass,
    /// Zero for files only known from a reference
    size: u64,
}

impl MediaItem {
    fn new(path: &str, size: u64) -> Self {
        Self {
            basename: basename(path).to_string(),
            class: MediaClass::from_path(path),
            size,
        }
    }
}

/// Removes media selected by a set of filters.
#[derive(Debug, Clone, Default)]
pub struct MediaFilterEngine {
    filters: Vec<MediaFilter>,
}

impl MediaFilterEngine {
    pub fn new(filters: Vec<MediaFilter>) -> Self {
        Self { filters }
    }

    /// Build an engine from filter tokens.
    ///
    /// # Errors
    /// Fails on the first token that is not a valid filter.
    pub fn from_tokens<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filters = tokens
            .into_iter()
            .map(|t| MediaFilter::parse(t.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(filters))
    }

    pub fn filters(&self) -> &[MediaFilter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Strip every selected file from the working set.
    ///
    /// Returns the package paths of the binary entries removed, in path
    /// order.
    ///
    /// # Errors
    /// Fails if a test, item or the manifest cannot be parsed.
    pub fn strip(&self, set: &mut WorkingSet) -> Result<Vec<String>> {
        if self.filters.is_empty() {
            return Ok(Vec::new());
        }
        let inventory = inventory(set)?;
        let removed: HashSet<String> = inventory
            .iter()
            .filter(|item| self.filters.iter().any(|f| f.matches(item)))
            .map(|item| item.basename.clone())
            .collect();
        if removed.is_empty() {
            debug!("no media matched the filters");
            return Ok(Vec::new());
        }

        for path in xml_entries(set) {
            let Some(mut doc) = set.parse_document(&path)? else {
                continue;
            };
            if strip_references(&mut doc, &removed) > 0 {
                debug!(path = %path, "replaced removed media references");
                set.store_document(&path, &doc);
            }
        }

        if let Some(path) = set.manifest_path()
            && let Some(mut manifest) = set.parse_document(&path)?
            && prune_manifest(&mut manifest, &removed) > 0
        {
            set.store_document(&path, &manifest);
        }

        let doomed: Vec<String> = set
            .iter()
            .filter(|e| matches!(e.content, EntryContent::Binary(_)))
            .filter(|e| removed.contains(basename(&e.path)))
            .map(|e| e.path.clone())
            .collect();
        for path in &doomed {
            set.remove(path);
        }
        info!(files = doomed.len(), "removed media");
        Ok(doomed)
    }
}

/// Tests and items, the documents whose references are rewritten.
fn xml_entries(set: &WorkingSet) -> Vec<String> {
    let mut paths = set.paths_of(Classification::Test);
    paths.extend(set.paths_of(Classification::Item));
    paths
}

fn inventory(set: &WorkingSet) -> Result<Vec<MediaItem>> {
    let mut items: Vec<MediaItem> = set
        .iter()
        .filter_map(|e| match &e.content {
            EntryContent::Binary(data) => Some(MediaItem::new(&e.path, data.len() as u64)),
            EntryContent::Text(_) => None,
        })
        .collect();
    for path in xml_entries(set) {
        if let Some(doc) = set.parse_document(&path)? {
            items.extend(file_references(&doc).iter().map(|r| MediaItem::new(&r.href, 0)));
        }
    }
    Ok(items)
}

/// Element to replace when the file referenced from `node` goes away.
fn replacement_target(doc: &XmlDocument, node: NodeId) -> NodeId {
    if let Some(wrapper) = std::iter::once(node)
        .chain(doc.ancestors(node))
        .find(|&id| doc.is_element(id) && MEDIA_INTERACTIONS.contains(&doc.local_name(id)))
    {
        return wrapper;
    }
    if doc.local_name(node) == "source"
        && let Some(parent) = doc.parent(node)
        && doc.is_element(parent)
        && matches!(doc.local_name(parent), "video" | "audio")
    {
        return parent;
    }
    node
}

/// Replace or delete every reference to a removed file. Returns the
/// number of elements changed.
fn strip_references(doc: &mut XmlDocument, removed: &HashSet<String>) -> usize {
    let mut changed = 0;
    for reference in file_references(doc) {
        let name = reference.basename();
        if !removed.contains(name) || !doc.is_attached(reference.node) {
            continue;
        }
        if NON_REPLACEABLE_EXTENSIONS.contains(&extension(name).as_str()) {
            doc.remove(reference.node);
            changed += 1;
            continue;
        }
        let target = replacement_target(doc, reference.node);
        let img_name = name_like(doc, target, "img");
        let src = placeholder_data_uri(name);
        let alt = format!("Media removed: {}", name);
        let placeholder = doc.create_element_with(img_name, &[("src", src.as_str()), ("alt", alt.as_str())]);
        doc.replace(target, placeholder);
        changed += 1;
    }
    changed
}

/// Drop `file` elements and resources pointing at removed files, and
/// dependencies on the dropped resources.
fn prune_manifest(manifest: &mut XmlDocument, removed: &HashSet<String>) -> usize {
    let mut changed = 0;
    let mut dropped_ids = BTreeSet::new();
    for resource in resources(manifest) {
        if !resource.href.is_empty() && removed.contains(basename(&resource.href)) {
            manifest.remove(resource.node);
            dropped_ids.insert(resource.identifier);
            changed += 1;
            continue;
        }
        for child in manifest.element_children(resource.node) {
            if manifest.local_name(child) == "file"
                && manifest
                    .attr(child, "href")
                    .is_some_and(|href| removed.contains(basename(href)))
            {
                manifest.remove(child);
                changed += 1;
            }
        }
    }
    if !dropped_ids.is_empty() {
        for resource in resources(manifest) {
            for child in manifest.element_children(resource.node) {
                if manifest.local_name(child) == "dependency"
                    && manifest
                        .attr(child, "identifierref")
                        .is_some_and(|id| dropped_ids.contains(id))
                {
                    manifest.remove(child);
                    changed += 1;
                }
            }
        }
    }
    changed
}
