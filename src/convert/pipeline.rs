//! The package conversion pipeline.
//!
//! A run has a fixed shape:
//!
//! 1. every entry of the source is converted on its own (manifest
//!    normalization, structural conversion of 2.x tests and items, the item
//!    transform chain) into a [`WorkingSet`];
//! 2. item references are reconciled across the complete working set;
//! 3. missing manifest resources are added;
//! 4. filtered media is stripped;
//! 5. the working set is written to the sink in path order.
//!
//! Any entry failing in step 1 aborts the run before anything is written.

use tracing::{debug, info};

use crate::common::bom::decode_utf8;
use crate::common::{Error, Result, XmlDocument};
use crate::config::ConvertOptions;
use crate::convert::complete::complete_manifest;
use crate::convert::reconcile::ManifestReconciler;
use crate::convert::report::ConversionReport;
use crate::convert::structural::{Passthrough, StructuralConverter};
use crate::media::MediaFilterEngine;
use crate::package::{EntrySource, PackageEntry, PackageSink, RawEntry, WorkingSet};
use crate::qti::chain::TransformChain;
use crate::qti::classify::{Classification, classify, is_xml_path};
use crate::qti::manifest::normalize_manifest;

/// Converts QTI 2.x content packages to QTI 3.0.
///
/// # Examples
///
/// ```no_run
/// use qti_migrate::convert::{PackageConverter, XsltProcessor};
/// use qti_migrate::package::{ArchiveWalker, ArchiveWriter};
/// use qti_migrate::ConvertOptions;
///
/// # async fn run() -> qti_migrate::Result<()> {
/// let converter = PackageConverter::new(XsltProcessor::new("qti2xTo30.xsl"))
///     .with_options(ConvertOptions::new().with_media_filter("video"));
///
/// let mut source = ArchiveWalker::open("package-v2.zip").await?;
/// let mut sink = ArchiveWriter::to_path("package-v3.zip");
/// let report = converter.run(&mut source, &mut sink).await?;
/// for warning in &report.warnings {
///     eprintln!("{}", warning);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PackageConverter<C = Passthrough> {
    converter: C,
    options: ConvertOptions,
}

impl Default for PackageConverter<Passthrough> {
    fn default() -> Self {
        Self::new(Passthrough)
    }
}

impl<C: StructuralConverter> PackageConverter<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            options: ConvertOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    fn reconciler(&self) -> ManifestReconciler {
        ManifestReconciler::new().with_root_marker(self.options.root_marker.clone())
    }

    /// Convert one entry.
    ///
    /// Non-XML entries and XML that is neither a test, an item nor the
    /// manifest keep their original bytes.
    ///
    /// # Errors
    /// Fails when the entry is not well-formed XML, when the structural
    /// converter rejects it, or when its output is still a 2.x document.
    /// The error carries the entry path.
    pub async fn convert_entry(&self, raw: RawEntry) -> Result<PackageEntry> {
        if !is_xml_path(&raw.path) {
            return Ok(PackageEntry::binary(raw.path, raw.data));
        }
        let RawEntry { path, data } = raw;
        match self.convert_xml(&path, &data).await {
            Ok(Some(entry)) => Ok(entry),
            Ok(None) => Ok(PackageEntry::binary(path, data)),
            Err(e) => Err(e.in_entry(path)),
        }
    }

    /// `None` for XML passed through unchanged.
    async fn convert_xml(&self, path: &str, data: &[u8]) -> Result<Option<PackageEntry>> {
        let text = decode_utf8(data)?;
        let mut doc = XmlDocument::parse(text)?;
        let class = classify(path, &doc);
        debug!(path = %path, class = ?class.classification, vocabulary = ?class.vocabulary, "classified entry");

        let output = match class.classification {
            Classification::Manifest => {
                let summary = normalize_manifest(&mut doc);
                debug!(path = %path, ?summary, "normalized manifest");
                doc.serialize()
            },
            Classification::Test => {
                if class.needs_structural_conversion() {
                    self.structural(path, text).await?.serialize()
                } else {
                    text.to_string()
                }
            },
            Classification::Item => {
                let mut chain = if class.needs_structural_conversion() {
                    TransformChain::from_document(self.structural(path, text).await?)
                } else {
                    TransformChain::from_document(doc)
                };
                chain.run_item_pipeline().serialize()
            },
            Classification::Other => return Ok(None),
        };
        Ok(Some(PackageEntry::text(path, output, class.classification)))
    }

    /// Run the structural converter and parse its output.
    async fn structural(&self, path: &str, text: &str) -> Result<XmlDocument> {
        debug!(path = %path, "running structural conversion");
        let converted = self.converter.convert(text).await?;
        let doc = XmlDocument::parse(&converted)?;
        if classify(path, &doc).needs_structural_conversion() {
            return Err(Error::ConversionEngine(format!(
                "structural conversion left {} in 2.x vocabulary",
                path
            )));
        }
        Ok(doc)
    }

    /// Convert every entry of `source` into a working set.
    ///
    /// # Errors
    /// Fails on the first entry that cannot be read or converted.
    pub async fn convert(&self, source: &mut dyn EntrySource) -> Result<WorkingSet> {
        let mut set = WorkingSet::new();
        while let Some(raw) = source.next_entry().await? {
            let entry = self.convert_entry(raw).await?;
            if let Some(previous) = set.insert(entry) {
                debug!(path = %previous.path, "duplicate entry replaced");
            }
        }
        Ok(set)
    }

    /// Run the cross-document passes over a converted working set.
    ///
    /// # Errors
    /// Fails when a filter token is invalid or a document cannot be
    /// re-parsed.
    pub fn finalize(&self, set: &mut WorkingSet) -> Result<ConversionReport> {
        let media = MediaFilterEngine::from_tokens(&self.options.media_filters)?;
        let reconciler = self.reconciler();

        let warnings = reconciler.reconcile(set)?;
        if self.options.complete_manifest {
            complete_manifest(set, &reconciler)?;
        }
        let removed_media = media.strip(set)?;

        Ok(ConversionReport {
            entries_converted: set.len(),
            tests: set.paths_of(Classification::Test).len(),
            items: set.paths_of(Classification::Item).len(),
            warnings,
            removed_media,
        })
    }

    /// Convert a whole package from `source` into `sink`.
    ///
    /// Nothing is written unless every entry converted.
    ///
    /// # Errors
    /// Fails on invalid media filters, on any entry that cannot be
    /// converted, and on I/O errors from the sink.
    pub async fn run(
        &self,
        source: &mut dyn EntrySource,
        sink: &mut dyn PackageSink,
    ) -> Result<ConversionReport> {
        // Reject bad filters before doing any work
        MediaFilterEngine::from_tokens(&self.options.media_filters)?;

        let mut set = self.convert(source).await?;
        let report = self.finalize(&mut set)?;

        for entry in set.into_entries() {
            sink.write_entry(&entry.path, entry.content.to_bytes()).await?;
        }
        sink.finish().await?;

        info!(
            entries = report.entries_converted,
            tests = report.tests,
            items = report.items,
            warnings = report.warnings.len(),
            removed_media = report.removed_media.len(),
            "package converted"
        );
        Ok(report)
    }
}
