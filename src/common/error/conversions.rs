//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from the
//! codec crates' error types to the unified Error type.

use super::types::Error;

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for Error {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Error::Xml(format!("attribute error: {}", err))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Error::Xml(format!("invalid UTF-8: {}", err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Error::Xml(format!("invalid UTF-8: {}", err))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Zip(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wrapping_is_not_nested() {
        let err = Error::Xml("bad".to_string()).in_entry("items/a.xml");
        let err = err.in_entry("other.xml");
        match err {
            Error::Entry { path, source } => {
                assert_eq!(path, "items/a.xml");
                assert!(matches!(*source, Error::Xml(_)));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_utf8_error_maps_to_xml() {
        let bytes = vec![0xff, 0xfe, 0x00];
        let err: Error = String::from_utf8(bytes).unwrap_err().into();
        assert!(matches!(err, Error::Xml(_)));
    }
}
