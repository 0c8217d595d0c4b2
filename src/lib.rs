//! qti-migrate - Convert QTI 2.x assessment content packages to QTI 3.0
//!
//! A content package is a zip archive (or a directory) holding an
//! `imsmanifest.xml`, assessment tests, assessment items and their media.
//! Conversion rewrites every document into the 3.0 vocabulary and then
//! repairs the package as a whole.
//!
//! # Features
//!
//! - **Manifest normalization**: 3.0 packaging namespace, schema locations
//!   and resource types, with prefixed namespaces promoted to the default
//! - **Structural conversion**: 2.x tests and items are rewritten by an
//!   external XSLT processor behind the [`StructuralConverter`] trait
//! - **Item clean-up**: a fixed chain of idempotent steps (media objects,
//!   SSML, metadata, scoring defaults, markup, dialogs, media interactions)
//! - **Reconciliation**: item references whose identifiers disagree with
//!   the manifest are repaired from the items' own identifiers
//! - **Manifest completion**: missing resources and dependencies are added
//! - **Media stripping**: audio, video, images, extensions or large files
//!   are removed and replaced by placeholder images
//!
//! # Example - Converting an archive
//!
//! ```no_run
//! use qti_migrate::{ConvertOptions, PackageConverter, XsltProcessor};
//! use qti_migrate::package::{ArchiveWalker, ArchiveWriter};
//!
//! # async fn convert() -> qti_migrate::Result<()> {
//! let converter = PackageConverter::new(XsltProcessor::new("qti2xTo30.xsl"))
//!     .with_options(ConvertOptions::new().with_root_marker("content"));
//!
//! let mut source = ArchiveWalker::open("package.zip").await?;
//! let mut sink = ArchiveWriter::to_path("package-qti3.zip");
//! let report = converter.run(&mut source, &mut sink).await?;
//! println!("{} tests, {} items", report.tests, report.items);
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Cleaning up a single item
//!
//! ```
//! use qti_migrate::TransformChain;
//!
//! # fn main() -> qti_migrate::Result<()> {
//! let xml = r#"<qti-assessment-item identifier="I1">
//!   <qti-item-body><object data="a.png" type="image/png"/></qti-item-body>
//! </qti-assessment-item>"#;
//!
//! let out = TransformChain::parse(xml)?.run_item_pipeline().serialize();
//! assert!(out.contains(r#"<img src="a.png" alt="a.png"/>"#));
//! # Ok(())
//! # }
//! ```

/// Error type, XML tree and byte-order-mark handling
pub mod common;

/// Conversion options
pub mod config;

/// Package-level conversion pipeline
pub mod convert;

/// Media stripping
pub mod media;

/// Content package I/O
pub mod package;

/// QTI vocabulary and document rewrites
pub mod qti;

// Re-export commonly used types for convenience
pub use common::{Error, Result, XmlDocument};
pub use config::ConvertOptions;
pub use convert::{
    ConversionReport, ManifestReconciler, PackageConverter, Passthrough, ReconcileWarning,
    StructuralConverter, XsltProcessor,
};
pub use media::{MediaFilter, MediaFilterEngine};
pub use package::{EntrySource, PackageSink, WorkingSet};
pub use qti::{Classification, Step, TransformChain, classify};
