//! Outcome of a conversion run.

use std::fmt;

/// A reference the reconciliation pass could not repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileWarning {
    /// No item file exists at the path the reference resolves to.
    UnresolvedItemRef {
        test_path: String,
        identifier: String,
        /// Package path the href was resolved to
        attempted: String,
    },
    /// The reference could not be turned into a package path at all.
    RootNotFound {
        test_path: String,
        identifier: String,
        href: String,
    },
}

impl fmt::Display for ReconcileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnresolvedItemRef {
                test_path,
                identifier,
                attempted,
            } => write!(
                f,
                "{}: item reference '{}' does not resolve (tried '{}')",
                test_path, identifier, attempted
            ),
            Self::RootNotFound {
                test_path,
                identifier,
                href,
            } => write!(
                f,
                "{}: cannot locate package root for item reference '{}' (href '{}')",
                test_path, identifier, href
            ),
        }
    }
}

/// Summary returned by a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Entries written to the output package
    pub entries_converted: usize,
    pub tests: usize,
    pub items: usize,
    pub warnings: Vec<ReconcileWarning>,
    /// Package paths of media removed by filters
    pub removed_media: Vec<String>,
}

impl ConversionReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = ReconcileWarning::UnresolvedItemRef {
            test_path: "tests/test.xml".to_string(),
            identifier: "WRONG".to_string(),
            attempted: "tests/items/x.xml".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "tests/test.xml: item reference 'WRONG' does not resolve (tried 'tests/items/x.xml')"
        );
    }
}
