//! Ordered, idempotent rewrites of a single item document.
//!
//! A [`TransformChain`] owns a parsed document; each step mutates it in
//! place and hands the chain back, so steps compose left to right:
//!
//! ```
//! use qti_migrate::qti::chain::TransformChain;
//!
//! let mut chain = TransformChain::parse(
//!     r#"<qti-assessment-item identifier="a"><qti-item-body><qti-choice-interaction response-identifier="R"/></qti-item-body></qti-assessment-item>"#,
//! ).unwrap();
//! let xml = chain.convert_media_objects().default_min_choices().serialize();
//! assert!(xml.contains(r#"min-choices="1""#));
//! ```
//!
//! Steps are not commutative. [`ITEM_PIPELINE`] is the one place the order
//! for item documents is declared; later steps consume what earlier ones
//! produce (the legacy interaction upgrade only recognizes media that the
//! media step has already turned into `video`/`audio`).

mod cleanup;
mod defaults;
mod media;

use tracing::debug;

use crate::common::xml::{NodeId, XmlDocument};
use crate::common::Result;

/// One named rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    ConvertMediaObjects,
    FlattenSsml,
    StripMetadata,
    DefaultMinChoices,
    DefaultScoring,
    CleanMarkup,
    ConvertDialogs,
    UpgradeLegacyInteractions,
}

/// Step order applied to every item document.
pub const ITEM_PIPELINE: [Step; 8] = [
    Step::ConvertMediaObjects,
    Step::FlattenSsml,
    Step::StripMetadata,
    Step::DefaultMinChoices,
    Step::DefaultScoring,
    Step::CleanMarkup,
    Step::ConvertDialogs,
    Step::UpgradeLegacyInteractions,
];

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Self::ConvertMediaObjects => "convert-media-objects",
            Self::FlattenSsml => "flatten-ssml",
            Self::StripMetadata => "strip-metadata",
            Self::DefaultMinChoices => "default-min-choices",
            Self::DefaultScoring => "default-scoring",
            Self::CleanMarkup => "clean-markup",
            Self::ConvertDialogs => "convert-dialogs",
            Self::UpgradeLegacyInteractions => "upgrade-legacy-interactions",
        }
    }

    /// Run the step; returns the number of elements it changed.
    fn run(self, doc: &mut XmlDocument) -> usize {
        match self {
            Self::ConvertMediaObjects => media::convert_media_objects(doc),
            Self::FlattenSsml => cleanup::flatten_ssml(doc),
            Self::StripMetadata => cleanup::strip_metadata(doc),
            Self::DefaultMinChoices => defaults::default_min_choices(doc),
            Self::DefaultScoring => defaults::default_scoring(doc),
            Self::CleanMarkup => cleanup::clean_markup(doc),
            Self::ConvertDialogs => cleanup::convert_dialogs(doc),
            Self::UpgradeLegacyInteractions => media::upgrade_legacy_interactions(doc),
        }
    }
}

/// A document with chainable rewrite steps.
#[derive(Debug, Clone)]
pub struct TransformChain {
    doc: XmlDocument,
}

impl TransformChain {
    /// Parse `xml` and start a chain on it.
    pub fn parse(xml: &str) -> Result<Self> {
        Ok(Self {
            doc: XmlDocument::parse(xml)?,
        })
    }

    pub fn from_document(doc: XmlDocument) -> Self {
        Self { doc }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn into_document(self) -> XmlDocument {
        self.doc
    }

    /// Apply a single step.
    pub fn apply(&mut self, step: Step) -> &mut Self {
        let changed = step.run(&mut self.doc);
        if changed > 0 {
            debug!(step = step.name(), changed, "applied transform step");
        }
        self
    }

    /// Apply every step of [`ITEM_PIPELINE`] in order.
    pub fn run_item_pipeline(&mut self) -> &mut Self {
        for step in ITEM_PIPELINE {
            self.apply(step);
        }
        self
    }

    /// `object` elements with an image, video or audio type become native
    /// `img`, `video` and `audio` elements.
    pub fn convert_media_objects(&mut self) -> &mut Self {
        self.apply(Step::ConvertMediaObjects)
    }

    /// Replace SSML markup by its content.
    pub fn flatten_ssml(&mut self) -> &mut Self {
        self.apply(Step::FlattenSsml)
    }

    /// Remove item-level metadata blocks and stale SSML declarations.
    pub fn strip_metadata(&mut self) -> &mut Self {
        self.apply(Step::StripMetadata)
    }

    /// Give choice interactions an explicit `min-choices`.
    pub fn default_min_choices(&mut self) -> &mut Self {
        self.apply(Step::DefaultMinChoices)
    }

    /// Add `match_correct` processing and a `SCORE` outcome where missing.
    pub fn default_scoring(&mut self) -> &mut Self {
        self.apply(Step::DefaultScoring)
    }

    /// Unprefix MathML, turn styling classes into semantic tags and drop
    /// empty `class`/`style` attributes.
    pub fn clean_markup(&mut self) -> &mut Self {
        self.apply(Step::CleanMarkup)
    }

    /// Turn custom-namespace dialogs into plain `div` dialogs.
    pub fn convert_dialogs(&mut self) -> &mut Self {
        self.apply(Step::ConvertDialogs)
    }

    /// Upgrade custom interactions wrapping a single player to media
    /// interactions.
    pub fn upgrade_legacy_interactions(&mut self) -> &mut Self {
        self.apply(Step::UpgradeLegacyInteractions)
    }

    /// Formatted XML text of the current document.
    pub fn serialize(&self) -> String {
        self.doc.serialize()
    }
}

/// Qualified name for `local` using the prefix of `like`, so a replacement
/// element stays in the namespace of the element it replaces.
pub(crate) fn name_like(doc: &XmlDocument, like: NodeId, local: &str) -> String {
    match doc.prefix(like) {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Whether any element name or attribute below and including `id` uses
/// `prefix`.
fn prefix_in_use(doc: &XmlDocument, id: NodeId, prefix: &str) -> bool {
    std::iter::once(id)
        .chain(doc.descendants(id))
        .any(|node| {
            doc.prefix(node) == Some(prefix)
                || doc
                    .attrs(node)
                    .iter()
                    .any(|a| !a.is_namespace_decl() && a.prefix() == Some(prefix))
        })
}

/// Remove `xmlns:P` declarations accepted by `matches` whose prefix is no
/// longer used in the declaring element's subtree.
pub(crate) fn drop_unused_declarations<F>(doc: &mut XmlDocument, matches: F) -> usize
where
    F: Fn(&str, &str) -> bool,
{
    let mut dropped = 0;
    for id in doc.elements() {
        let candidates: Vec<(String, String)> = doc
            .attrs(id)
            .iter()
            .filter(|a| a.prefix() == Some("xmlns") && matches(a.local_name(), &a.value))
            .map(|a| (a.name.clone(), a.local_name().to_string()))
            .collect();
        for (decl, prefix) in candidates {
            if !prefix_in_use(doc, id, &prefix) {
                doc.remove_attr(id, &decl);
                dropped += 1;
            }
        }
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qti::constants::MATCH_CORRECT_TEMPLATE;

    const LEGACY_ITEM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<qti-assessment-item xmlns="http://www.imsglobal.org/xsd/imsqtiasi_v3p0"
    xmlns:m="http://www.w3.org/1998/Math/MathML"
    xmlns:ssml="http://www.w3.org/2001/10/synthesis"
    xmlns:cx="urn:vendor:dialogs"
    identifier="ITM-1" title="Legacy">
  <qti-response-declaration identifier="RESPONSE" cardinality="single" base-type="identifier">
    <qti-correct-response><qti-value>A</qti-value></qti-correct-response>
  </qti-response-declaration>
  <qti-item-body>
    <metadata><note>authoring</note></metadata>
    <p>Say <ssml:sub alias="hello">hi</ssml:sub> and <span class="qti-bold">look</span>.</p>
    <p><object data="media/a.png" type="image/png" width="40">A picture</object></p>
    <m:math><m:mi>x</m:mi></m:math>
    <cx:dialog identifier="D1" title="Help">Read carefully.</cx:dialog>
    <qti-custom-interaction response-identifier="PLAYED">
      <object data="media/clip.mp4" type="video/mp4"/>
    </qti-custom-interaction>
    <qti-choice-interaction response-identifier="RESPONSE" max-choices="1" class="">
      <qti-simple-choice identifier="A">A</qti-simple-choice>
      <qti-simple-choice identifier="B" style=" ">B</qti-simple-choice>
    </qti-choice-interaction>
  </qti-item-body>
</qti-assessment-item>"#;

    #[test]
    fn test_item_pipeline() {
        let mut chain = TransformChain::parse(LEGACY_ITEM).unwrap();
        let out = chain.run_item_pipeline().serialize();

        assert!(out.contains(r#"<img src="media/a.png" alt="A picture" width="40"/>"#), "{}", out);
        assert!(out.contains("<p>Say hi and <strong>look</strong>.</p>"), "{}", out);
        assert!(!out.contains("ssml"));
        assert!(!out.contains("<metadata>"));
        assert!(out.contains(r#"<math xmlns="http://www.w3.org/1998/Math/MathML">"#), "{}", out);
        assert!(out.contains("<mi>x</mi>"));
        assert!(!out.contains("xmlns:m="));
        assert!(out.contains(r#"<div class="qti-dialog" data-dialog-id="D1" title="Help">Read carefully.</div>"#), "{}", out);
        assert!(!out.contains("xmlns:cx"));
        assert!(out.contains(
            r#"<qti-media-interaction response-identifier="PLAYED" autostart="false" min-plays="0" max-plays="0">"#
        ), "{}", out);
        assert!(out.contains(r#"<source src="media/clip.mp4" type="video/mp4"/>"#));
        assert!(out.contains(r#"<qti-choice-interaction response-identifier="RESPONSE" max-choices="1" min-choices="1">"#), "{}", out);
        assert!(out.contains(r#"<qti-simple-choice identifier="B">B</qti-simple-choice>"#));
        assert!(out.contains(&format!(r#"<qti-response-processing template="{}"/>"#, MATCH_CORRECT_TEMPLATE)));
        assert!(out.contains(r#"<qti-outcome-declaration identifier="SCORE" cardinality="single" base-type="float"/>"#));
    }

    #[test]
    fn test_item_pipeline_is_idempotent() {
        let mut first = TransformChain::parse(LEGACY_ITEM).unwrap();
        let once = first.run_item_pipeline().serialize();

        let mut second = TransformChain::parse(&once).unwrap();
        let twice = second.run_item_pipeline().serialize();
        assert_eq!(once, twice);

        // Re-running on the same tree is a no-op as well
        let again = first.run_item_pipeline().serialize();
        assert_eq!(once, again);
    }

    #[test]
    fn test_upgrade_needs_media_step_first() {
        let xml = r#"<qti-assessment-item><qti-item-body><qti-custom-interaction response-identifier="R"><object data="a.mp3" type="audio/mpeg"/></qti-custom-interaction></qti-item-body></qti-assessment-item>"#;

        let mut out_of_order = TransformChain::parse(xml).unwrap();
        let out = out_of_order.upgrade_legacy_interactions().serialize();
        assert!(out.contains("qti-custom-interaction"));

        let mut in_order = TransformChain::parse(xml).unwrap();
        let out = in_order
            .convert_media_objects()
            .upgrade_legacy_interactions()
            .serialize();
        assert!(out.contains("qti-media-interaction"));
        assert!(out.contains(r#"<audio controls="controls">"#));
    }

    #[test]
    fn test_step_names_are_unique() {
        let mut names: Vec<_> = ITEM_PIPELINE.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ITEM_PIPELINE.len());
    }
}
