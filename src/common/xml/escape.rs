use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

// Static initialization: automaton is built only once, thread-safe
static ATTR_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "\n", "\t"])
        .expect("Failed to build attribute escaper")
});

static TEXT_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">"])
        .expect("Failed to build text escaper")
});

// Use LeftmostLongest to ensure longer entities are matched first (e.g., &amp; instead of &lt;)
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape a value for use inside a double-quoted attribute.
///
/// # Examples
///
/// ```
/// use qti_migrate::common::xml::escape_attr;
/// assert_eq!(escape_attr("a & \"b\""), "a &amp; &quot;b&quot;");
/// ```
#[inline]
pub fn escape_attr(s: &str) -> String {
    ATTR_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&#10;", "&#9;"])
}

/// Escape character data for use as element text.
///
/// # Examples
///
/// ```
/// use qti_migrate::common::xml::escape_text;
/// assert_eq!(escape_text("1 < 2 & \"x\""), "1 &lt; 2 &amp; \"x\"");
/// ```
#[inline]
pub fn escape_text(s: &str) -> String {
    TEXT_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;"])
}

/// Unescape XML entity and character references.
///
/// Replaces the five predefined entities and decimal/hexadecimal character
/// references. Unknown or malformed references are left unchanged.
///
/// # Examples
///
/// ```
/// use qti_migrate::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("&lt;a &amp; b&gt;"), "<a & b>");
/// assert_eq!(unescape_xml("&#65;&#x42;"), "AB");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// assert_eq!(unescape_xml("&nbsp;"), "&nbsp;");
/// ```
pub fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let named = if s.contains("&#") {
        unescape_char_refs(s)
    } else {
        s.to_string()
    };
    XML_UNESCAPER.replace_all(&named, &["&", "<", ">", "\"", "'"])
}

/// Expand `&#NN;` and `&#xHH;` references.
///
/// `&#38;` expands to a literal `&` which must not be re-read as the start
/// of a named entity, so it is emitted as `&amp;` and left to the named pass.
fn unescape_char_refs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("&#") {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos + 2..];
        let decoded = tail.find(';').and_then(|end| {
            let body = &tail[..end];
            let code = match body.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => body.parse::<u32>().ok(),
            };
            code.and_then(char::from_u32).map(|c| (c, end))
        });
        match decoded {
            Some(('&', end)) => {
                out.push_str("&amp;");
                rest = &tail[end + 1..];
            },
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            },
            None => {
                out.push_str("&#");
                rest = tail;
            },
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_attr_whitespace() {
        assert_eq!(escape_attr("a\nb\tc"), "a&#10;b&#9;c");
    }

    #[test]
    fn test_unescape_char_ref_ampersand() {
        assert_eq!(unescape_xml("&#38;lt;"), "&lt;");
    }

    #[test]
    fn test_unescape_malformed() {
        assert_eq!(unescape_xml("&#zz;"), "&#zz;");
        assert_eq!(unescape_xml("a & b"), "a & b");
        assert_eq!(unescape_xml("&amp"), "&amp");
    }
}
