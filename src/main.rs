//! qti-migrate - command-line front end of the package converter

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use qti_migrate::package::{create_sink, open_source};
use qti_migrate::{
    ConversionReport, ConvertOptions, PackageConverter, Passthrough, StructuralConverter, XsltProcessor,
};

/// Convert a QTI 2.x content package to QTI 3.0
#[derive(Debug, Parser)]
#[command(name = "qti-migrate", version, about)]
struct Cli {
    /// Input package: a .zip archive or a directory
    input: PathBuf,

    /// Output package: a .zip path produces an archive, anything else a directory
    output: PathBuf,

    /// XSLT stylesheet performing the 2.x to 3.0 rewrite. Without it, a
    /// package containing 2.x tests or items is rejected
    #[arg(long, value_name = "PATH")]
    stylesheet: Option<PathBuf>,

    /// XSLT processor program
    #[arg(long, value_name = "PROG", default_value = XsltProcessor::DEFAULT_PROGRAM)]
    processor: PathBuf,

    /// Directory name anchoring item paths during reconciliation
    #[arg(long, value_name = "NAME")]
    root_marker: Option<String>,

    /// Remove media: audio, video, image, an extension (.mp3) or a size (2mb)
    #[arg(long = "strip-media", value_name = "FILTER")]
    strip_media: Vec<String>,

    /// Do not add manifest resources for tests and items that have none
    #[arg(long)]
    no_complete_manifest: bool,

    /// Include hidden OS artifacts such as .DS_Store when reading
    #[arg(long)]
    keep_hidden: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> ConvertOptions {
        let mut options = ConvertOptions::new()
            .with_media_filters(self.strip_media.iter().cloned())
            .with_complete_manifest(!self.no_complete_manifest)
            .with_skip_hidden(!self.keep_hidden);
        options.root_marker = self.root_marker.clone();
        options
    }
}

async fn convert_with<C: StructuralConverter>(converter: C, cli: &Cli) -> qti_migrate::Result<ConversionReport> {
    let options = cli.options();
    let mut source = open_source(&cli.input, options.skip_hidden).await?;
    let mut sink = create_sink(&cli.output);
    PackageConverter::new(converter)
        .with_options(options)
        .run(source.as_mut(), sink.as_mut())
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    info!(input = %cli.input.display(), output = %cli.output.display(), "converting package");
    let result = match &cli.stylesheet {
        Some(stylesheet) => {
            let processor = XsltProcessor::new(stylesheet).with_program(&cli.processor);
            convert_with(processor, &cli).await
        },
        None => convert_with(Passthrough, &cli).await,
    };

    match result {
        Ok(report) => {
            if report.has_warnings() {
                warn!(count = report.warnings.len(), "package written with unresolved item references");
                for warning in &report.warnings {
                    eprintln!("warning: {}", warning);
                }
            }
            info!(
                entries = report.entries_converted,
                removed_media = report.removed_media.len(),
                "wrote {}",
                cli.output.display()
            );
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("conversion failed: {}", e);
            ExitCode::FAILURE
        },
    }
}
