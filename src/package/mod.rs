//! Content package I/O.
//!
//! A package is read through an [`EntrySource`] (a zip archive or a
//! directory tree), converted into a [`WorkingSet`], and written back
//! through a [`PackageSink`].

pub mod entry;
pub mod folder;
pub mod packpath;
pub mod phys_pkg;
pub mod working_set;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;

use crate::common::Result;

pub use entry::{EntryContent, PackageEntry, RawEntry};
pub use folder::{FolderWalker, FolderWriter};
pub use phys_pkg::{ArchiveWalker, ArchiveWriter};
pub use working_set::WorkingSet;

/// Forward-only stream of package entries.
#[async_trait]
pub trait EntrySource: Send {
    /// The next entry, or `None` once the source is exhausted.
    async fn next_entry(&mut self) -> Result<Option<RawEntry>>;
}

/// Destination of a converted package.
#[async_trait]
pub trait PackageSink: Send {
    async fn write_entry(&mut self, path: &str, data: Bytes) -> Result<()>;

    /// Complete the package. No entries can be written afterwards.
    async fn finish(&mut self) -> Result<()>;
}

/// Whether a path should be treated as a zip archive.
pub fn is_archive_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Open a zip file or a directory as an entry source.
pub async fn open_source(path: &Path, skip_hidden: bool) -> Result<Box<dyn EntrySource>> {
    if tokio::fs::metadata(path).await?.is_dir() {
        Ok(Box::new(FolderWalker::open(path, skip_hidden).await?))
    } else {
        Ok(Box::new(ArchiveWalker::open(path).await?.with_skip_hidden(skip_hidden)))
    }
}

/// Zip output for `.zip` paths, a directory tree otherwise.
pub fn create_sink(path: &Path) -> Box<dyn PackageSink> {
    if is_archive_path(path) {
        Box::new(ArchiveWriter::to_path(path))
    } else {
        Box::new(FolderWriter::new(path))
    }
}

/// Build a zip archive in memory from `(name, data)` pairs. Names ending
/// in `/` become directory entries.
#[cfg(test)]
pub(crate) fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    use std::io::{Cursor, Write};
    use zip::write::{SimpleFileOptions, ZipWriter};

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in files {
        if name.ends_with('/') {
            writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}
