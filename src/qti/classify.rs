//! Document classification by root-element identity.
//!
//! The lookup table covers both naming conventions: the 2.x camelCase
//! vocabulary (`assessmentItem`) and the 3.0 kebab-case vocabulary
//! (`qti-assessment-item`). Matching uses the element's local name only, so
//! whatever prefix a package binds the QTI namespace to is irrelevant.

use phf::phf_map;

use crate::common::XmlDocument;
use crate::package::packpath::{basename, dirname};
use crate::qti::constants::MANIFEST_FILENAME;

/// Role of one package entry in the conversion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Test,
    Item,
    Manifest,
    /// Binary assets, stylesheets and auxiliary XML
    Other,
}

/// Naming convention a Test or Item document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vocabulary {
    /// camelCase element names, needs structural conversion
    V2,
    /// `qti-` kebab-case element names
    V3,
}

/// Result of classifying one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentClass {
    pub classification: Classification,
    pub vocabulary: Option<Vocabulary>,
}

impl DocumentClass {
    const MANIFEST: Self = Self {
        classification: Classification::Manifest,
        vocabulary: None,
    };

    const OTHER: Self = Self {
        classification: Classification::Other,
        vocabulary: None,
    };

    /// Whether the document still needs the 2.x to 3.0 structural rewrite.
    pub fn needs_structural_conversion(&self) -> bool {
        self.vocabulary == Some(Vocabulary::V2)
            && matches!(self.classification, Classification::Test | Classification::Item)
    }
}

static ASSESSMENT_ELEMENTS: phf::Map<&'static str, (Classification, Vocabulary)> = phf_map! {
    "assessmentTest" => (Classification::Test, Vocabulary::V2),
    "assessmentItem" => (Classification::Item, Vocabulary::V2),
    "assessment-test" => (Classification::Test, Vocabulary::V3),
    "assessment-item" => (Classification::Item, Vocabulary::V3),
    "qti-assessment-test" => (Classification::Test, Vocabulary::V3),
    "qti-assessment-item" => (Classification::Item, Vocabulary::V3),
};

/// Whether `path` is the manifest at the package root.
pub fn is_manifest_path(path: &str) -> bool {
    dirname(path).is_empty() && basename(path).eq_ignore_ascii_case(MANIFEST_FILENAME)
}

/// Whether an entry should be parsed as XML.
pub fn is_xml_path(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".xml")
}

/// Classify a parsed document found at `path`.
///
/// Safe on documents mixing 2.x and 3.0 vocabulary; the first assessment
/// element in document order decides.
pub fn classify(path: &str, doc: &XmlDocument) -> DocumentClass {
    if is_manifest_path(path) {
        return DocumentClass::MANIFEST;
    }
    classify_document(doc)
}

/// Classify a document by content alone.
pub fn classify_document(doc: &XmlDocument) -> DocumentClass {
    doc.elements()
        .into_iter()
        .find_map(|id| ASSESSMENT_ELEMENTS.get(doc.local_name(id)))
        .map_or(DocumentClass::OTHER, |&(classification, vocabulary)| DocumentClass {
            classification,
            vocabulary: Some(vocabulary),
        })
}
