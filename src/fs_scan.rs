use crate::types::{FileInfo, RunOptions, SizeFlag, bytes_to_mb, round2};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Conventional asset folders probed when no dirs are configured.
const DEFAULT_DIR_CANDIDATES: &[&str] = &["public/images", "public/assets", "src/assets"];

pub fn default_dirs(cwd: &Path) -> Vec<String> {
    DEFAULT_DIR_CANDIDATES
        .iter()
        .filter(|d| cwd.join(d).is_dir())
        .map(|d| d.to_string())
        .collect()
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// Recursively list all files under each configured directory (relative
/// dirs are resolved against `cwd`). Dotfiles and dot-directories are
/// skipped. Returns absolute paths, sorted.
pub fn list_images(cwd: &Path, dirs: &[String]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for dir in dirs {
        let root = {
            let p = PathBuf::from(dir);
            if p.is_absolute() { p } else { cwd.join(p) }
        };
        if !root.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.with_context(|| format!("scan {}", root.display()))?;
            if entry.file_type().is_file() {
                out.push(entry.into_path());
            }
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

pub fn ext_lower(p: &Path) -> String {
    p.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

/// Extension allowlist AND per-type flags. The flags are a safety switch on
/// top of the include string: `.gif`/`.svg` stay out without their flag even
/// when the include list names them.
pub fn filter_by_ext(files: Vec<PathBuf>, include: &[String], gif: bool, svg: bool) -> Vec<PathBuf> {
    files
        .into_iter()
        .filter(|f| {
            let ext = ext_lower(f);
            if ext == "gif" && !gif {
                return false;
            }
            if ext == "svg" && !svg {
                return false;
            }
            include.iter().any(|e| e.eq_ignore_ascii_case(&ext))
        })
        .collect()
}

pub fn stat_file(p: &Path) -> Result<FileInfo> {
    let meta = std::fs::metadata(p).with_context(|| format!("metadata {}", p.display()))?;
    Ok(FileInfo { path: p.to_path_buf(), size: meta.len() })
}

/// Size snapshots for every discovered file, taken before the pipeline
/// mutates anything. Independent stats, so this fans out.
pub fn stat_files(files: &[PathBuf]) -> Result<Vec<FileInfo>> {
    files.par_iter().map(|f| stat_file(f)).collect()
}

/// Warn/error thresholds in bytes. A positive KB setting wins over MB.
pub fn resolve_thresholds(opts: &RunOptions) -> (u64, u64) {
    let warn = match opts.warn_kb {
        Some(kb) if kb > 0.0 => (kb * 1024.0).round() as u64,
        _ => (opts.warn_mb * 1024.0 * 1024.0).round() as u64,
    };
    let error = match opts.error_kb {
        Some(kb) if kb > 0.0 => (kb * 1024.0).round() as u64,
        _ => (opts.error_mb * 1024.0 * 1024.0).round() as u64,
    };
    (warn, error)
}

/// Bucket into warning/error tiers. Mutually exclusive, error wins.
pub fn classify(
    cwd: &Path,
    infos: &[FileInfo],
    warn_bytes: u64,
    error_bytes: u64,
) -> (Vec<SizeFlag>, Vec<SizeFlag>) {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for info in infos {
        let flag = SizeFlag {
            file: rel_posix(cwd, &info.path),
            size_mb: round2(bytes_to_mb(info.size)),
        };
        if info.size >= error_bytes {
            errors.push(flag);
        } else if info.size >= warn_bytes {
            warnings.push(flag);
        }
    }
    (warnings, errors)
}

/// Project-relative path, forward slashes. Paths outside `cwd` fall back to
/// their full display form.
pub fn rel_posix(cwd: &Path, p: &Path) -> String {
    let rel = p.strip_prefix(cwd).unwrap_or(p);
    rel.to_string_lossy().replace('\\', "/")
}

/// Converted sibling: same directory and stem, `.webp` extension.
pub fn webp_path_for(p: &Path) -> PathBuf {
    p.with_extension("webp")
}
