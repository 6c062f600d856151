mod output;
mod progress;

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use sitm_transfer::{summarize, CancelFlag, TransferConfig, TransferError, TransferService};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use output::{Output, Verbosity};
use progress::{format_bytes, ProgressManager};

/// Exit code used when the user interrupts a copy
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "sitm")]
#[command(version, about = "Copy, download and unpack mod files")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Do not draw progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    /// Configuration file (defaults to config.json in the sitm config directory)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Ignore SITM_* environment variables
    #[arg(long, global = true)]
    no_env: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a directory tree
    CopyDir {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Copy a single file (Ctrl-C cancels)
    CopyFile {
        source: PathBuf,
        destination: PathBuf,
    },

    /// Download a file over HTTP or from the cloud mirror
    Download {
        url: String,

        /// Directory to save into
        #[arg(short = 'o', long, default_value = ".")]
        dest_dir: PathBuf,

        /// File name to save as (defaults to the last URL path segment)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Extract a zip or tar archive
    Extract {
        archive: PathBuf,
        destination: PathBuf,
    },

    /// Open a directory in the file manager
    OpenDir { path: PathBuf },

    /// Open a file with its default application
    OpenFile { path: PathBuf },

    /// Mark a file as executable
    SetExecutable { path: PathBuf },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<u8> {
    let args = Args::parse();
    init_logging(args.quiet, args.verbose);

    let output = Output::new(Verbosity::from_flags(args.quiet, args.verbose));
    let progress =
        ProgressManager::new(output.verbosity() > Verbosity::Quiet && !args.no_progress);

    let config = TransferConfig::build(args.config.as_deref(), !args.no_env)
        .context("Failed to load configuration")?;
    output.verbose(&format!(
        "HTTP timeout {}s, cloud mirror marker '{}'",
        config.http_timeout, config.cloud_mirror_marker
    ));

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| anyhow!("Failed to create async runtime: {}", e))?;
    rt.block_on(execute(args.command, &config, &output, &progress))
}

/// Default log filter; RUST_LOG still overrides it
fn log_filter(quiet: bool, verbose: u8) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "warn,sitm_transfer=info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(quiet: bool, verbose: u8) {
    let filter = log_filter(quiet, verbose);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format_timestamp(None)
        .init();
}

async fn execute(
    command: Commands,
    config: &TransferConfig,
    output: &Output,
    progress: &ProgressManager,
) -> Result<u8> {
    let service = TransferService::from_config(config).context("Failed to set up transfers")?;

    match command {
        Commands::CopyDir { source, destination } => {
            let root = source.clone();
            let summary = tokio::task::spawn_blocking(move || summarize(&root))
                .await?
                .with_context(|| format!("Cannot read {}", source.display()))?;
            output.info(&format!(
                "Copying {} files in {} directories ({})",
                summary.files,
                summary.directories,
                format_bytes(summary.bytes)
            ));

            let bar = progress.create_percent_bar("copying");
            let result = service.copy_directory(&source, &destination, Some(&bar)).await;
            finish_bar(&bar, result.is_ok());
            result.with_context(|| {
                format!("Failed to copy {} to {}", source.display(), destination.display())
            })?;

            output.success(&format!("Copied to {}", destination.display()));
        }

        Commands::CopyFile { source, destination } => {
            let cancel = CancelFlag::new();
            let watcher = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        cancel.cancel();
                    }
                })
            };

            let result = service.copy_file(&source, &destination, Some(&cancel)).await;
            watcher.abort();

            match result {
                Err(TransferError::Cancelled) => {
                    output.warning(&format!("Copy to {} was interrupted", destination.display()));
                    return Ok(EXIT_INTERRUPTED);
                }
                other => other.with_context(|| {
                    format!("Failed to copy {} to {}", source.display(), destination.display())
                })?,
            }

            output.success(&format!("Copied to {}", destination.display()));
        }

        Commands::Download { url, dest_dir, name } => {
            let name = match name {
                Some(name) => name,
                None => file_name_from_url(&url)
                    .ok_or_else(|| anyhow!("Cannot derive a file name from {}, pass --name", url))?,
            };

            let bar = progress.create_percent_bar(&name);
            let ok = service.download_file(&name, &dest_dir, &url, Some(&bar)).await;
            finish_bar(&bar, ok);
            if !ok {
                bail!("Download of {} failed", url);
            }

            output.success(&format!("Saved {}", dest_dir.join(&name).display()));
        }

        Commands::Extract { archive, destination } => {
            let bar = progress.create_percent_bar("extracting");
            let result = service.extract_archive(&archive, &destination, Some(&bar)).await;
            finish_bar(&bar, result.is_ok());
            result.with_context(|| format!("Failed to extract {}", archive.display()))?;

            output.success(&format!("Extracted to {}", destination.display()));
        }

        Commands::OpenDir { path } => {
            warn_if_missing(output, &path);
            service.open_directory(&path).await?;
        }

        Commands::OpenFile { path } => {
            warn_if_missing(output, &path);
            service.open_file(&path).await?;
        }

        Commands::SetExecutable { path } => {
            service
                .set_executable(&path)
                .await
                .with_context(|| format!("Cannot mark {} executable", path.display()))?;
            output.verbose(&format!("{} is now executable", path.display()));
        }
    }

    Ok(0)
}

fn finish_bar(bar: &progress::PercentBar, ok: bool) {
    if ok {
        bar.finish();
    } else {
        bar.abandon();
    }
}

fn warn_if_missing(output: &Output, path: &Path) {
    if !path.exists() {
        output.warning(&format!("{} does not exist", path.display()));
    }
}

/// Last non-empty path segment of a URL, ignoring query and fragment
fn file_name_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next()?;
    let path = without_fragment.split('?').next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, path) = path.split_once('/')?;

    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_string)
}
