//! QTI vocabulary: classification, manifests, tests and item rewrites.

pub mod assessment;
pub mod chain;
pub mod classify;
pub mod constants;
pub mod manifest;
pub mod namespace;
pub mod references;

pub use assessment::{ItemRef, declared_identifier, item_refs};
pub use chain::{ITEM_PIPELINE, Step, TransformChain};
pub use classify::{Classification, DocumentClass, Vocabulary, classify};
pub use manifest::{Resource, ResourceType, normalize_manifest};
pub use namespace::{PromoteOutcome, promote_to_default};
