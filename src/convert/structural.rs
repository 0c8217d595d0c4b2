//! The 2.x to 3.0 structural rewrite of a single document.
//!
//! The rewrite itself is delegated to an engine behind
//! [`StructuralConverter`]. [`XsltProcessor`] runs an external XSLT
//! processor; [`Passthrough`] leaves documents alone.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::common::bom::strip_bom_str;
use crate::common::{Error, Result};

/// Engine rewriting a 2.x test or item into 3.0 vocabulary.
#[async_trait]
pub trait StructuralConverter: Send + Sync {
    /// Convert one document.
    ///
    /// # Errors
    /// [`Error::ConversionEngine`] when the engine cannot run at all,
    /// [`Error::ConversionFailure`] when it rejects the document.
    async fn convert(&self, document: &str) -> Result<String>;
}

/// Returns documents unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl StructuralConverter for Passthrough {
    async fn convert(&self, document: &str) -> Result<String> {
        Ok(document.to_string())
    }
}

/// Runs an external XSLT processor, feeding the document on stdin.
///
/// The command line is `<program> <args...> <stylesheet> -`, which matches
/// `xsltproc` and processors with the same calling convention.
#[derive(Debug, Clone)]
pub struct XsltProcessor {
    program: PathBuf,
    stylesheet: PathBuf,
    args: Vec<String>,
}

impl XsltProcessor {
    /// Default processor program
    pub const DEFAULT_PROGRAM: &'static str = "xsltproc";

    pub fn new(stylesheet: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from(Self::DEFAULT_PROGRAM),
            stylesheet: stylesheet.into(),
            args: Vec::new(),
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Extra arguments placed before the stylesheet.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn stylesheet(&self) -> &Path {
        &self.stylesheet
    }

    async fn check_stylesheet(&self) -> Result<()> {
        match tokio::fs::metadata(&self.stylesheet).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(Error::ConversionEngine(format!(
                "stylesheet not found: {}",
                self.stylesheet.display()
            ))),
        }
    }
}

#[async_trait]
impl StructuralConverter for XsltProcessor {
    async fn convert(&self, document: &str) -> Result<String> {
        self.check_stylesheet().await?;
        debug!(program = %self.program.display(), stylesheet = %self.stylesheet.display(), "running XSLT processor");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.stylesheet)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::ConversionEngine(format!("cannot start {}: {}", self.program.display(), e))
            })?;

        // Feed stdin concurrently so a processor that streams its output
        // cannot block on a full stdout pipe.
        let feeder = child.stdin.take().map(|mut stdin| {
            let input = document.as_bytes().to_vec();
            tokio::spawn(async move {
                let written = stdin.write_all(&input).await;
                drop(stdin);
                written
            })
        });

        let output = child.wait_with_output().await?;
        let fed = match feeder {
            Some(handle) => handle
                .await
                .map_err(|e| Error::ConversionEngine(format!("stdin writer failed: {}", e)))?,
            None => Ok(()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ConversionFailure(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }
        fed?;

        let text = String::from_utf8(output.stdout)?;
        Ok(strip_bom_str(&text).to_string())
    }
}
