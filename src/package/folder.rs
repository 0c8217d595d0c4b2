//! Directory trees as package sources and sinks.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::common::{Error, Result};
use crate::package::entry::RawEntry;
use crate::package::packpath::{from_relative_path, is_hidden_artifact, resolve_lexical};
use crate::package::{EntrySource, PackageSink};

/// Reads every file below a root directory, in sorted path order.
///
/// The file list is collected when the walker is opened; contents are read
/// lazily, one entry per call.
pub struct FolderWalker {
    root: PathBuf,
    pending: VecDeque<(String, PathBuf)>,
}

impl FolderWalker {
    /// Scan `root` recursively.
    ///
    /// OS artifacts (`.DS_Store`, `Thumbs.db`, `__MACOSX`, `._*`) are left
    /// out when `skip_hidden` is set.
    pub async fn open<P: AsRef<Path>>(root: P, skip_hidden: bool) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = Vec::new();
        let mut dirs = vec![root.clone()];

        while let Some(dir) = dirs.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let relative = path
                    .strip_prefix(&root)
                    .map_err(|_| Error::InvalidPath(path.display().to_string()))?;
                let package_path = from_relative_path(relative)?;
                if skip_hidden && is_hidden_artifact(&package_path) {
                    debug!(path = %package_path, "skipping hidden file");
                    continue;
                }
                if entry.file_type().await?.is_dir() {
                    dirs.push(path);
                } else {
                    files.push((package_path, path));
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Self {
            root,
            pending: files.into(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries not yet read.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl EntrySource for FolderWalker {
    async fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        let Some((path, file)) = self.pending.pop_front() else {
            return Ok(None);
        };
        let data = tokio::fs::read(&file).await?;
        Ok(Some(RawEntry::new(path, data)))
    }
}

/// Writes entries as files below a root directory.
pub struct FolderWriter {
    root: PathBuf,
    finished: bool,
}

impl FolderWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            finished: false,
        }
    }

    fn target(&self, path: &str) -> Result<PathBuf> {
        let resolved = resolve_lexical(path)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        Ok(resolved.split('/').fold(self.root.clone(), |acc, part| acc.join(part)))
    }
}

#[async_trait]
impl PackageSink for FolderWriter {
    async fn write_entry(&mut self, path: &str, data: Bytes) -> Result<()> {
        if self.finished {
            return Err(Error::InvalidPath(format!("{} (package already finalized)", path)));
        }
        if is_hidden_artifact(path) {
            debug!(path, "not writing hidden artifact");
            return Ok(());
        }
        let target = self.target(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        if !self.finished {
            tokio::fs::create_dir_all(&self.root).await?;
            self.finished = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_folder_roundtrip() {
        let source = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("items")).unwrap();
        std::fs::write(source.path().join("items/b.xml"), "<b/>").unwrap();
        std::fs::write(source.path().join("items/a.xml"), "<a/>").unwrap();
        std::fs::write(source.path().join("imsmanifest.xml"), "<manifest/>").unwrap();
        std::fs::write(source.path().join(".DS_Store"), "junk").unwrap();

        let mut walker = FolderWalker::open(source.path(), true).await.unwrap();
        assert_eq!(walker.remaining(), 3);

        let target = tempfile::tempdir().unwrap();
        let mut writer = FolderWriter::new(target.path().join("out"));
        let mut paths = Vec::new();
        while let Some(entry) = walker.next_entry().await.unwrap() {
            writer.write_entry(&entry.path, entry.data).await.unwrap();
            paths.push(entry.path);
        }
        writer.finish().await.unwrap();

        assert_eq!(paths, ["imsmanifest.xml", "items/a.xml", "items/b.xml"]);
        let written = std::fs::read_to_string(target.path().join("out/items/a.xml")).unwrap();
        assert_eq!(written, "<a/>");
    }

    #[tokio::test]
    async fn test_hidden_files_kept_when_asked() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("Thumbs.db"), "junk").unwrap();
        let walker = FolderWalker::open(source.path(), false).await.unwrap();
        assert_eq!(walker.remaining(), 1);
    }

    #[tokio::test]
    async fn test_writer_rejects_escaping_paths() {
        let target = tempfile::tempdir().unwrap();
        let mut writer = FolderWriter::new(target.path());
        let err = writer
            .write_entry("../outside.xml", Bytes::from_static(b"<a/>"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath(_)));

        writer.write_entry(".DS_Store", Bytes::from_static(b"x")).await.unwrap();
        assert!(!target.path().join(".DS_Store").exists());
    }
}
