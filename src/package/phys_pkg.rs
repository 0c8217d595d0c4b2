//! Zip archives as package sources and sinks.
//!
//! Entries are read forward-only, one at a time, in central-directory
//! order. A second pass over the same archive needs a new walker. Output
//! is buffered in memory and written to its destination in a single
//! finalize step; nothing can be appended afterwards.

use std::fs::File;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::common::{Error, Result};
use crate::package::entry::RawEntry;
use crate::package::packpath::{from_relative_path, is_hidden_artifact};
use crate::package::{EntrySource, PackageSink};

/// Sequential reader over the entries of a zip archive.
///
/// Archives opened from disk are read in place; only the member being
/// returned is held in memory.
pub struct ArchiveWalker<R = Cursor<Bytes>> {
    archive: ZipArchive<R>,
    next: usize,
    skip_hidden: bool,
}

impl ArchiveWalker<File> {
    /// Open an archive file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a zip archive.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let archive = tokio::task::spawn_blocking(move || -> Result<ZipArchive<File>> {
            Ok(ZipArchive::new(File::open(path)?)?)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(Self::with_archive(archive))
    }
}

impl ArchiveWalker<Cursor<Bytes>> {
    /// Read an archive held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(data.into()))?;
        Ok(Self::with_archive(archive))
    }
}

impl<R: Read + Seek> ArchiveWalker<R> {
    fn with_archive(archive: ZipArchive<R>) -> Self {
        Self {
            archive,
            next: 0,
            skip_hidden: true,
        }
    }

    /// Whether OS artifacts such as `.DS_Store` are skipped (default: yes).
    pub fn with_skip_hidden(mut self, skip_hidden: bool) -> Self {
        self.skip_hidden = skip_hidden;
        self
    }

    /// Number of members in the archive, directories included.
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    fn read_next(&mut self) -> Result<Option<RawEntry>> {
        while self.next < self.archive.len() {
            let index = self.next;
            self.next += 1;

            let mut file = self.archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let relative = file
                .enclosed_name()
                .ok_or_else(|| Error::InvalidPath(file.name().to_string()))?;
            let path = from_relative_path(&relative)?;
            if self.skip_hidden && is_hidden_artifact(&path) {
                debug!(path = %path, "skipping hidden archive member");
                continue;
            }

            let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or_default());
            file.read_to_end(&mut data)?;
            return Ok(Some(RawEntry::new(path, data)));
        }
        Ok(None)
    }
}

#[async_trait]
impl<R: Read + Seek + Send> EntrySource for ArchiveWalker<R> {
    async fn next_entry(&mut self) -> Result<Option<RawEntry>> {
        self.read_next()
    }
}

/// Deflate-compressed zip output.
pub struct ArchiveWriter {
    writer: Option<ZipWriter<Cursor<Vec<u8>>>>,
    destination: Option<PathBuf>,
    output: Option<Bytes>,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    /// Writer that keeps the finished archive in memory.
    pub fn new() -> Self {
        Self {
            writer: Some(ZipWriter::new(Cursor::new(Vec::new()))),
            destination: None,
            output: None,
        }
    }

    /// Writer that stores the finished archive at `path`.
    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            destination: Some(path.into()),
            ..Self::new()
        }
    }

    /// The finished archive, once [`PackageSink::finish`] has run.
    pub fn bytes(&self) -> Option<&Bytes> {
        self.output.as_ref()
    }

    fn add(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::Zip("archive already finalized".to_string()))?;
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(path, options)?;
        writer.write_all(data)?;
        Ok(())
    }
}

#[async_trait]
impl PackageSink for ArchiveWriter {
    async fn write_entry(&mut self, path: &str, data: Bytes) -> Result<()> {
        if is_hidden_artifact(path) {
            debug!(path, "not writing hidden artifact");
            return Ok(());
        }
        self.add(path, &data)
    }

    async fn finish(&mut self) -> Result<()> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| Error::Zip("archive already finalized".to_string()))?;
        let bytes = Bytes::from(writer.finish()?.into_inner());
        if let Some(destination) = &self.destination {
            if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(destination, &bytes).await?;
        }
        self.output = Some(bytes);
        Ok(())
    }
}
