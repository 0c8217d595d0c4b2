//! Package-level conversion: per-entry conversion, reconciliation of item
//! references, manifest completion and the reporting of a run.

pub mod complete;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod structural;

pub use complete::{CompletionSummary, complete_manifest};
pub use pipeline::PackageConverter;
pub use reconcile::ManifestReconciler;
pub use report::{ConversionReport, ReconcileWarning};
pub use structural::{Passthrough, StructuralConverter, XsltProcessor};
