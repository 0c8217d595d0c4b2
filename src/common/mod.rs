//! Common types and utilities shared across the pipeline.
//!
//! This module provides the crate-wide error type, byte-order-mark
//! handling and the mutable XML tree every conversion step operates on.

// Submodule declarations
pub mod bom;
pub mod error;
pub mod xml;

// Re-exports for convenience
pub use error::{Error, Result};
pub use xml::{NodeId, XmlDocument};
