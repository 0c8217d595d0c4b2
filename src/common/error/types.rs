//! Unified error type for package conversion.
//!
//! Per-entry failures are fatal to a run and surface through this type.
//! Conditions the pipeline tolerates (unresolved item references, a missing
//! namespace binding) are reported as values, not errors.
use thiserror::Error;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unreadable XML
    #[error("XML error: {0}")]
    Xml(String),

    /// ZIP archive error
    #[error("ZIP error: {0}")]
    Zip(String),

    /// The transformation engine or its stylesheet could not be loaded
    #[error("Conversion engine unavailable: {0}")]
    ConversionEngine(String),

    /// The transformation engine rejected a document
    #[error("Conversion failed: {0}")]
    ConversionFailure(String),

    /// A media filter token that is neither a class, an extension nor a size
    #[error("Invalid media filter: {0}")]
    InvalidFilter(String),

    /// A path that cannot be represented inside a package
    #[error("Invalid package path: {0}")]
    InvalidPath(String),

    /// Failure while converting one package entry
    #[error("Failed to convert '{path}': {source}")]
    Entry {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap this error with the path of the entry being converted.
    pub fn in_entry(self, path: impl Into<String>) -> Self {
        match self {
            // Already attributed to an entry
            Error::Entry { .. } => self,
            other => Error::Entry {
                path: path.into(),
                source: Box::new(other),
            },
        }
    }
}

/// Result type for conversion operations.
pub type Result<T> = std::result::Result<T, Error>;
