//! Audio library import into object storage

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::client::{storage_path, DeleteCounts, StorageClient, StorageConfig, TrackRecord, DEFAULT_BUCKET};
use crate::output::{print_list, print_success, print_warning, render, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum LibraryCommands {
    /// Upload every matching file under a directory
    Upload(UploadArgs),

    /// Delete all audio and sidecar objects, then upload fresh copies
    CleanSlate(CleanSlateArgs),
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local directory, searched recursively
    pub dir: PathBuf,

    /// Storage prefix for uploaded objects
    #[arg(long, default_value = "")]
    pub prefix: String,

    #[arg(long, default_value = "mp3")]
    pub extension: String,

    /// Overwrite existing objects
    #[arg(long)]
    pub upsert: bool,

    /// Register each uploaded file as a track of this channel
    #[arg(long, value_name = "CHANNEL_ID")]
    pub register_channel: Option<String>,

    #[arg(long, default_value = DEFAULT_BUCKET)]
    pub bucket: String,
}

#[derive(Args, Debug)]
pub struct CleanSlateArgs {
    /// Directory of MP3 files
    pub audio_dir: PathBuf,

    /// Directory of JSON sidecars
    pub json_dir: PathBuf,

    /// Confirm deleting every existing object
    #[arg(long)]
    pub yes: bool,

    #[arg(long, default_value = "")]
    pub prefix: String,

    #[arg(long, default_value = DEFAULT_BUCKET)]
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadFailure {
    pub path: String,
    pub error: String,
}

impl TableDisplay for UploadFailure {
    fn headers() -> Vec<&'static str> {
        vec!["Path", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.path.clone(), self.error.clone()]
    }
}

#[derive(Debug, Default, Serialize)]
pub struct UploadReport {
    pub total: usize,
    pub uploaded: Vec<String>,
    pub failed: Vec<UploadFailure>,
    pub registered: usize,
}

impl UploadReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct CleanSlateReport {
    pub deleted_audio: DeleteCounts,
    pub deleted_sidecars: DeleteCounts,
    pub audio: UploadReport,
    pub sidecars: UploadReport,
}

/// Options shared by both upload paths
#[derive(Debug, Clone, Default)]
pub struct UploadOptions<'a> {
    pub prefix: &'a str,
    pub extension: &'a str,
    pub upsert: bool,
    pub register_channel: Option<&'a str>,
    pub progress: bool,
}

/// Files under `dir` with `extension` (case-insensitive), sorted
pub fn find_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let extension = extension.trim_start_matches('.');

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Object names ending in `.{extension}`, qualified with `prefix`
pub fn objects_with_extension(names: &[String], extension: &str, prefix: &str) -> Vec<String> {
    let suffix = format!(".{}", extension.trim_start_matches('.'));
    names
        .iter()
        .filter(|name| name.ends_with(&suffix))
        .map(|name| storage_path(prefix, Path::new(name)))
        .collect()
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {wide_msg}") {
        bar.set_style(style);
    }
    bar
}

pub async fn upload_files(client: &StorageClient, dir: &Path, options: &UploadOptions<'_>) -> Result<UploadReport> {
    let files = find_files(dir, options.extension)?;
    let mut report = UploadReport {
        total: files.len(),
        ..UploadReport::default()
    };
    if files.is_empty() {
        warn!("No .{} files found in {}", options.extension, dir.display());
        return Ok(report);
    }

    let total_bytes: u64 = files
        .iter()
        .filter_map(|f| f.metadata().ok())
        .map(|m| m.len())
        .sum();
    info!(
        "Uploading {} .{} files ({:.2} GB) from {}",
        files.len(),
        options.extension,
        total_bytes as f64 / (1024.0 * 1024.0 * 1024.0),
        dir.display()
    );

    let bar = progress_bar(files.len(), options.progress);
    for file in &files {
        let relative = file.strip_prefix(dir).unwrap_or(file);
        let path = storage_path(options.prefix, relative);
        bar.set_message(path.clone());

        match client.upload(file, &path, options.upsert).await {
            Ok(_) => {
                if let Some(channel) = options.register_channel {
                    match client.register_track(&TrackRecord::new(channel, path.as_str())).await {
                        Ok(()) => report.registered += 1,
                        Err(e) => warn!("Track record for {} not created: {}", path, e),
                    }
                }
                report.uploaded.push(path);
            }
            Err(e) => report.failed.push(UploadFailure {
                path,
                error: e.to_string(),
            }),
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    Ok(report)
}

/// Wipe `.mp3` and `.json` objects, then upload both directories
pub async fn clean_slate(client: &StorageClient, args: &CleanSlateArgs, progress: bool) -> Result<CleanSlateReport> {
    if !args.yes {
        anyhow::bail!(
            "clean-slate deletes every .mp3 and .json object in bucket {:?}; pass --yes to continue",
            args.bucket
        );
    }
    for dir in [&args.audio_dir, &args.json_dir] {
        if !dir.is_dir() {
            anyhow::bail!("{} is not a directory; nothing was deleted", dir.display());
        }
    }
    let mut report = CleanSlateReport::default();

    info!("[1/4] Deleting existing audio files");
    let names = client.list(&args.prefix).await?;
    report.deleted_audio = client.delete(&objects_with_extension(&names, "mp3", &args.prefix)).await;

    info!("[2/4] Deleting existing JSON sidecars");
    let names = client.list(&args.prefix).await?;
    report.deleted_sidecars = client.delete(&objects_with_extension(&names, "json", &args.prefix)).await;

    let mut options = UploadOptions {
        prefix: &args.prefix,
        extension: "mp3",
        progress,
        ..UploadOptions::default()
    };
    info!("[3/4] Uploading audio from {}", args.audio_dir.display());
    report.audio = upload_files(client, &args.audio_dir, &options).await?;

    options.extension = "json";
    info!("[4/4] Uploading sidecars from {}", args.json_dir.display());
    report.sidecars = upload_files(client, &args.json_dir, &options).await?;

    Ok(report)
}

fn print_upload_summary(label: &str, report: &UploadReport, format: OutputFormat) {
    println!(
        "{} {}: {}/{} uploaded",
        if report.success() { "✓".green() } else { "✗".red() },
        label,
        report.uploaded.len(),
        report.total
    );
    if report.registered > 0 {
        println!("  {} track records created", report.registered);
    }
    if !report.success() {
        print_list(&report.failed, format);
    }
}

fn print_delete_summary(label: &str, counts: DeleteCounts) {
    if counts.failed == 0 {
        println!("{} {}: {} deleted", "✓".green(), label, counts.deleted);
    } else {
        print_warning(&format!("{}: {} deleted, {} could not be deleted", label, counts.deleted, counts.failed));
    }
}

fn client_for(bucket: &str) -> Result<StorageClient> {
    let config = StorageConfig::from_env()?.with_bucket(bucket);
    Ok(StorageClient::new(config)?)
}

pub async fn execute(cmd: LibraryCommands, format: OutputFormat) -> Result<()> {
    let progress = !format.is_structured();
    match cmd {
        LibraryCommands::Upload(args) => {
            let client = client_for(&args.bucket)?;
            let options = UploadOptions {
                prefix: &args.prefix,
                extension: &args.extension,
                upsert: args.upsert,
                register_channel: args.register_channel.as_deref(),
                progress,
            };
            let report = upload_files(&client, &args.dir, &options).await?;

            if format.is_structured() {
                println!("{}", render(&report, format));
            } else {
                print_upload_summary("files", &report, format);
            }
            if !report.success() {
                anyhow::bail!("{} of {} uploads failed", report.failed.len(), report.total);
            }
            if !format.is_structured() {
                print_success(&format!("Uploaded {} files to {}", report.uploaded.len(), args.bucket));
            }
        }
        LibraryCommands::CleanSlate(args) => {
            let client = client_for(&args.bucket)?;
            let report = clean_slate(&client, &args, progress).await?;

            if format.is_structured() {
                println!("{}", render(&report, format));
            } else {
                print_delete_summary("audio files", report.deleted_audio);
                print_delete_summary("sidecars", report.deleted_sidecars);
                print_upload_summary("audio", &report.audio, format);
                print_upload_summary("sidecars", &report.sidecars, format);
            }
            let failed = report.audio.failed.len() + report.sidecars.failed.len();
            if failed > 0 {
                anyhow::bail!("{} uploads failed", failed);
            }
            if !format.is_structured() {
                print_success("Clean slate import complete");
            }
        }
    }
    Ok(())
}
