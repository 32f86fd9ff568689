use crate::fs_scan::{rel_posix, webp_path_for};
use crate::globs::{compile_all, matches_any};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// original rel path -> converted rel path, forward slashes
pub type RefMap = BTreeMap<String, String>;

fn is_raster_candidate(p: &Path) -> bool {
    matches!(crate::fs_scan::ext_lower(p).as_str(), "png" | "jpg" | "jpeg")
}

/// Map every discovered raster candidate to its webp sibling, whether or not
/// this run touched it. References to previously-converted files must keep
/// resolving on runs that skip re-encoding.
pub fn build_mapping(cwd: &Path, images: &[PathBuf]) -> RefMap {
    let mut map = RefMap::new();
    for orig in images.iter().filter(|p| is_raster_candidate(p)) {
        let rel = rel_posix(cwd, orig);
        let rel_out = rel_posix(cwd, &webp_path_for(orig));
        map.insert(rel, rel_out);
    }
    map
}

fn basename(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

/// Literal substring replacement, no semantic parsing. For each mapping
/// entry the full relative path and, independently, the bare filename are
/// replaced everywhere they occur; both can fire on the same entry.
pub fn rewrite_content(content: &str, map: &RefMap) -> (String, bool) {
    let mut out = content.to_string();
    let mut changed = false;
    for (orig, converted) in map {
        if out.contains(orig.as_str()) {
            out = out.replace(orig.as_str(), converted);
            changed = true;
        }
        let orig_name = basename(orig);
        if out.contains(orig_name) {
            out = out.replace(orig_name, basename(converted));
            changed = true;
        }
    }
    (out, changed)
}

/// Candidate text files: everything under `cwd` matching a code glob and no
/// ignore glob. Dotfiles are eligible here, unlike image discovery.
pub fn list_code_files(
    cwd: &Path,
    code_globs: &[String],
    ignore_globs: &[String],
) -> Result<Vec<PathBuf>> {
    let include = compile_all(code_globs)?;
    let ignore = compile_all(ignore_globs)?;

    let mut out = Vec::new();
    for entry in WalkDir::new(cwd).follow_links(true) {
        let entry = entry.with_context(|| format!("scan {}", cwd.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = rel_posix(cwd, entry.path());
        if matches_any(&include, &rel) && !matches_any(&ignore, &rel) {
            out.push(entry.into_path());
        }
    }
    out.sort();
    Ok(out)
}

/// Apply the mapping to every candidate text file. Only genuinely changed
/// files are rewritten (and only when not dry), so untouched files keep
/// their bytes and mtimes. Returns the changed count and rel paths.
pub fn replace_references(
    cwd: &Path,
    code_globs: &[String],
    ignore_globs: &[String],
    map: &RefMap,
    dry: bool,
) -> Result<(usize, Vec<String>)> {
    let mut modified = Vec::new();
    for file in list_code_files(cwd, code_globs, ignore_globs)? {
        // non-text candidates are skipped rather than fatal
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let (next, changed) = rewrite_content(&content, map);
        if changed {
            if !dry {
                std::fs::write(&file, next)
                    .with_context(|| format!("rewrite {}", file.display()))?;
            }
            modified.push(rel_posix(cwd, &file));
        }
    }
    Ok((modified.len(), modified))
}
