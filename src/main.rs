mod app;
mod cache;
mod codec;
mod config;
mod fs_scan;
mod globs;
mod report;
mod rewrite;
mod types;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::ConfigLayer;
use std::path::{Path, PathBuf};
use types::{Action, RunMode, RunSummary};

#[derive(Parser, Debug)]
#[command(
    name = "img-refactor",
    version,
    about = "Scan project images, compress/convert to WebP, rewrite source references"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, compress, convert to WebP and replace references
    Run {
        #[command(flatten)]
        opts: CommonArgs,
    },
    /// Compress images in place without changing type
    Compress {
        #[command(flatten)]
        opts: CommonArgs,
    },
    /// Convert PNG/JPG to WebP and update references
    Webp {
        #[command(flatten)]
        opts: CommonArgs,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ReportFormat {
    Json,
    Md,
}

/// Every field optional so unset flags leave room for the config file.
/// Boolean switches take an optional value (`--gif`, `--gif false`).
#[derive(Args, Debug)]
struct CommonArgs {
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    dry: Option<bool>,

    #[arg(long, value_enum)]
    mode: Option<RunMode>,

    /// Asset directories to scan recursively (repeatable)
    #[arg(long)]
    dirs: Vec<String>,

    /// Comma-separated extension list, e.g. "jpg,jpeg,png"
    #[arg(long)]
    include: Option<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    gif: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    svg: Option<bool>,

    /// Encode quality, 0-100
    #[arg(long)]
    quality: Option<u8>,

    #[arg(long)]
    warn_mb: Option<f64>,

    #[arg(long)]
    error_mb: Option<f64>,

    /// KB threshold, wins over --warn-mb when positive
    #[arg(long)]
    warn_kb: Option<f64>,

    #[arg(long)]
    error_kb: Option<f64>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    replace_refs: Option<bool>,

    /// Glob patterns for text files to rewrite (repeatable)
    #[arg(long)]
    code_globs: Vec<String>,

    /// Glob patterns to exclude from the rewrite scan (repeatable)
    #[arg(long)]
    ignore_globs: Vec<String>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    force_raster: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    force_webp: Option<bool>,

    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    skip_raster: Option<bool>,

    /// Copy each original to <name>.bak before the first recompression
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    backup: Option<bool>,

    #[arg(long)]
    cache_file: Option<String>,

    /// Write the summary to a report file instead of stdout
    #[arg(long, value_enum)]
    report: Option<ReportFormat>,

    #[arg(long)]
    out_report: Option<PathBuf>,
}

impl CommonArgs {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            dry: self.dry,
            mode: self.mode,
            dirs: if self.dirs.is_empty() { None } else { Some(self.dirs.clone()) },
            include: self.include.clone(),
            gif: self.gif,
            svg: self.svg,
            quality: self.quality,
            warn_mb: self.warn_mb,
            error_mb: self.error_mb,
            warn_kb: self.warn_kb,
            error_kb: self.error_kb,
            replace_refs: self.replace_refs,
            code_globs: if self.code_globs.is_empty() {
                None
            } else {
                Some(self.code_globs.clone())
            },
            ignore_globs: if self.ignore_globs.is_empty() {
                None
            } else {
                Some(self.ignore_globs.clone())
            },
            force_raster: self.force_raster,
            force_webp: self.force_webp,
            skip_raster: self.skip_raster,
            cache_file: self.cache_file.clone(),
            backup: self.backup,
            action: None,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("resolve working directory")?;
    let file_cfg = config::load_file_config(&cwd);

    match cli.cmd {
        Commands::Run { opts: args } => {
            let resolved = config::resolve(
                config::default_options(&cwd),
                file_cfg.as_ref(),
                &args.layer(),
            );
            let summary = app::run(&resolved)?;
            emit(&cwd, &summary, args.report, args.out_report.as_deref(), false)
        }
        Commands::Compress { opts: args } => {
            let mut resolved = config::resolve(
                config::default_options(&cwd),
                file_cfg.as_ref(),
                &args.layer(),
            );
            // fixed by the subcommand, regardless of config
            resolved.action = Some(Action::Compress);
            resolved.mode = RunMode::Dual;
            resolved.replace_refs = Some(false);
            let summary = app::run(&resolved)?;
            emit(&cwd, &summary, args.report, args.out_report.as_deref(), true)
        }
        Commands::Webp { opts: args } => {
            let mut base = config::default_options(&cwd);
            base.mode = RunMode::Replace;
            base.include = config::split_include("jpg,jpeg,png");
            let mut resolved = config::resolve(base, file_cfg.as_ref(), &args.layer());
            resolved.action = Some(Action::Webp);
            let summary = app::run(&resolved)?;
            emit(&cwd, &summary, args.report, args.out_report.as_deref(), true)
        }
    }
}

/// Print the JSON summary to stdout, or write a report file and print its
/// path. `file_by_default` matches the compress/webp subcommands, which
/// always produce a report file.
fn emit(
    cwd: &Path,
    summary: &RunSummary,
    report: Option<ReportFormat>,
    out_report: Option<&Path>,
    file_by_default: bool,
) -> Result<()> {
    let format = report.or(if file_by_default { Some(ReportFormat::Json) } else { None });

    match format {
        None => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        Some(ReportFormat::Json) => {
            let out = out_report
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| cwd.join("img-refactor-report.json"));
            std::fs::write(&out, serde_json::to_string_pretty(summary)?)
                .with_context(|| format!("write report {}", out.display()))?;
            println!("{}", out.display());
        }
        Some(ReportFormat::Md) => {
            let out = out_report
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| cwd.join("img-refactor-report.md"));
            std::fs::write(&out, report::render_markdown(summary))
                .with_context(|| format!("write report {}", out.display()))?;
            println!("{}", out.display());
        }
    }
    Ok(())
}
