//! Byte Order Mark (BOM) handling for package entries.
//!
//! Entries produced by authoring tools sometimes start with a UTF-8 BOM,
//! which must not survive into the parsed tree or the re-serialized output.
//! UTF-16/32 entries are detected so they can be rejected with a clear
//! message instead of failing somewhere inside the XML reader.

use crate::common::{Error, Result};

/// Supported BOM encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomKind {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl BomKind {
    /// Returns the byte representation of the BOM.
    #[inline]
    pub const fn as_bytes(&self) -> &'static [u8] {
        match self {
            BomKind::Utf8 => &UTF8_BOM,
            BomKind::Utf16Le => &UTF16_LE_BOM,
            BomKind::Utf16Be => &UTF16_BE_BOM,
            BomKind::Utf32Le => &UTF32_LE_BOM,
            BomKind::Utf32Be => &UTF32_BE_BOM,
        }
    }

    /// Returns the length in bytes of the BOM.
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// UTF-8 BOM bytes.
pub const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
/// UTF-16 little-endian BOM bytes.
pub const UTF16_LE_BOM: [u8; 2] = [0xFF, 0xFE];
/// UTF-16 big-endian BOM bytes.
pub const UTF16_BE_BOM: [u8; 2] = [0xFE, 0xFF];
/// UTF-32 little-endian BOM bytes.
pub const UTF32_LE_BOM: [u8; 4] = [0xFF, 0xFE, 0x00, 0x00];
/// UTF-32 big-endian BOM bytes.
pub const UTF32_BE_BOM: [u8; 4] = [0x00, 0x00, 0xFE, 0xFF];

/// Detect the BOM at the start of `bytes`, if any.
pub fn detect_bom(bytes: &[u8]) -> Option<BomKind> {
    // UTF-32 LE shares its first two bytes with UTF-16 LE, check it first
    if bytes.starts_with(&UTF32_BE_BOM) {
        return Some(BomKind::Utf32Be);
    }
    if bytes.starts_with(&UTF32_LE_BOM) {
        return Some(BomKind::Utf32Le);
    }
    if bytes.starts_with(&UTF8_BOM) {
        return Some(BomKind::Utf8);
    }
    if bytes.starts_with(&UTF16_BE_BOM) {
        return Some(BomKind::Utf16Be);
    }
    if bytes.starts_with(&UTF16_LE_BOM) {
        return Some(BomKind::Utf16Le);
    }
    None
}

/// Decode an entry as UTF-8 text, dropping a leading UTF-8 BOM.
pub fn decode_utf8(bytes: &[u8]) -> Result<&str> {
    match detect_bom(bytes) {
        Some(BomKind::Utf8) => Ok(std::str::from_utf8(&bytes[UTF8_BOM.len()..])?),
        Some(kind) => Err(Error::Xml(format!("unsupported text encoding {:?}", kind))),
        None => Ok(std::str::from_utf8(bytes)?),
    }
}

/// Strip a leading BOM character from already-decoded text.
#[inline]
pub fn strip_bom_str(text: &str) -> &str {
    text.strip_prefix('\u{FEFF}').unwrap_or(text)
}
