//! Path helpers for entries inside a content package.
//!
//! Package paths are POSIX-style, relative to the package root and never
//! start with a slash (`items/item1.xml`). References found inside documents
//! are looser: authoring tools write `./items/a.xml`, `/items/a.xml` or
//! `../items/a.xml`, so every comparison goes through [`normalize_href`].

use std::path::{Component, Path};

use crate::common::{Error, Result};

/// Strip leading `./` and `/` segments from a reference.
///
/// ```
/// use qti_migrate::package::packpath::normalize_href;
/// assert_eq!(normalize_href("./items/a.xml"), "items/a.xml");
/// assert_eq!(normalize_href("/items/a.xml"), "items/a.xml");
/// assert_eq!(normalize_href(".//./a.xml"), "a.xml");
/// ```
pub fn normalize_href(href: &str) -> &str {
    let mut rest = href.trim();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            return rest;
        }
    }
}

/// Directory portion of a package path, without trailing slash.
///
/// Returns an empty string for entries at the package root.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// Final segment of a path or reference.
pub fn basename(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Lowercased extension of a path, without the dot.
pub fn extension(path: &str) -> String {
    let name = basename(path);
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => name[pos + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Join a relative reference onto a directory. No normalization happens.
pub fn join(dir: &str, reference: &str) -> String {
    let reference = normalize_href(reference);
    if dir.is_empty() {
        reference.to_string()
    } else {
        format!("{}/{}", dir.trim_end_matches('/'), reference)
    }
}

/// Resolve `.` and `..` segments lexically.
///
/// Returns `None` when the path climbs above the package root.
pub fn resolve_lexical(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for part in normalize_href(path).split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop()?;
            },
            _ => parts.push(part),
        }
    }
    Some(parts.join("/"))
}

/// Keep the portion of `path` starting at the last segment equal to
/// `marker`. Returns `None` when no segment matches.
///
/// ```
/// use qti_migrate::package::packpath::from_root_marker;
/// assert_eq!(
///     from_root_marker("tests/../content/items/a.xml", "content").as_deref(),
///     Some("content/items/a.xml")
/// );
/// assert_eq!(
///     from_root_marker("content/tests/../content/items/a.xml", "content").as_deref(),
///     Some("content/items/a.xml")
/// );
/// assert_eq!(from_root_marker("items/a.xml", "content"), None);
/// ```
pub fn from_root_marker(path: &str, marker: &str) -> Option<String> {
    let segments: Vec<&str> = normalize_href(path).split('/').collect();
    let start = segments.iter().rposition(|s| *s == marker)?;
    Some(segments[start..].join("/"))
}

/// Whether a path names an OS artifact that never belongs in a package.
pub fn is_hidden_artifact(path: &str) -> bool {
    path.split('/').any(|segment| {
        segment == ".DS_Store"
            || segment == "Thumbs.db"
            || segment == "desktop.ini"
            || segment == "__MACOSX"
            || segment.starts_with("._")
    })
}

/// Convert a filesystem path relative to a package root into a package path.
///
/// # Errors
/// Returns [`Error::InvalidPath`] for absolute paths, parent components or
/// non-UTF-8 names.
pub fn from_relative_path(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::InvalidPath(relative.display().to_string()))?;
                parts.push(part);
            },
            Component::CurDir => {},
            _ => return Err(Error::InvalidPath(relative.display().to_string())),
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidPath(relative.display().to_string()));
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_dirname_and_basename() {
        assert_eq!(dirname("tests/test.xml"), "tests");
        assert_eq!(dirname("test.xml"), "");
        assert_eq!(basename("media/clip.mp4"), "clip.mp4");
        assert_eq!(basename("media/clip.mp4?v=2"), "clip.mp4");
        assert_eq!(basename("clip.mp4"), "clip.mp4");
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("media/Clip.MP4"), "mp4");
        assert_eq!(extension("README"), "");
        assert_eq!(extension("dir.v1/file"), "");
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "items/a.xml"), "items/a.xml");
        assert_eq!(join("tests", "./a.xml"), "tests/a.xml");
        assert_eq!(join("tests/", "../a.xml"), "tests/../a.xml");
    }

    #[test]
    fn test_resolve_lexical() {
        assert_eq!(resolve_lexical("tests/../items/a.xml").as_deref(), Some("items/a.xml"));
        assert_eq!(resolve_lexical("./a/./b.xml").as_deref(), Some("a/b.xml"));
        assert_eq!(resolve_lexical("../a.xml"), None);
    }

    #[test]
    fn test_hidden_artifacts() {
        assert!(is_hidden_artifact(".DS_Store"));
        assert!(is_hidden_artifact("items/.DS_Store"));
        assert!(is_hidden_artifact("__MACOSX/items/a.xml"));
        assert!(is_hidden_artifact("items/._a.xml"));
        assert!(!is_hidden_artifact("items/a.xml"));
    }

    #[test]
    fn test_from_relative_path() {
        let path: PathBuf = ["items", "a.xml"].iter().collect();
        assert_eq!(from_relative_path(&path).unwrap(), "items/a.xml");
        assert!(from_relative_path(Path::new("../a.xml")).is_err());
    }
}
