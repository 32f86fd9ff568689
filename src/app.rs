use crate::types::{
    Action, CompressedFile, RunMode, RunOptions, RunSummary, bytes_to_mb, round2,
};
use crate::{cache, codec, fs_scan, rewrite};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// One full pass: discovery -> classification -> per-file transform loop
/// (consulting and updating the cache) -> reference rewriting -> summary.
/// No state survives the run except the cache file.
pub fn run(opts: &RunOptions) -> Result<RunSummary> {
    let cwd = opts.cwd.as_path();

    let dirs = if opts.dirs.is_empty() {
        fs_scan::default_dirs(cwd)
    } else {
        opts.dirs.clone()
    };

    let all = fs_scan::list_images(cwd, &dirs)?;
    let images = fs_scan::filter_by_ext(all, &opts.include, opts.gif, opts.svg);

    let mut cache = cache::load_cache(cwd, &opts.cache_file);

    // Size snapshots before any mutation; savings figures depend on it.
    let infos = fs_scan::stat_files(&images)?;
    let (warn_bytes, error_bytes) = fs_scan::resolve_thresholds(opts);
    let (warnings, errors) = fs_scan::classify(cwd, &infos, warn_bytes, error_bytes);

    let do_webp = opts.effective_action() == Action::Webp;

    let mut processed = 0usize;
    let mut compressed: Vec<CompressedFile> = Vec::new();
    let mut webp_generated: Vec<String> = Vec::new();
    let mut skipped_raster = 0usize;
    let mut skipped_webp = 0usize;

    for info in &infos {
        let file = info.path.as_path();
        let ext = fs_scan::ext_lower(file);

        if ext == "svg" {
            if opts.svg {
                process_svg(file, opts.dry)?;
                processed += 1;
            }
            continue;
        }
        if ext == "gif" && !opts.gif {
            continue;
        }

        let raster_candidate = matches!(ext.as_str(), "png" | "jpg" | "jpeg");
        let rel_key = fs_scan::rel_posix(cwd, file);
        let mut source_hash = cache::hash_file(file)?;
        let mut entry = cache.get(&rel_key).cloned().unwrap_or_default();

        let need_raster = raster_candidate
            && !opts.skip_raster
            && (opts.force_raster || entry.raster_hash.as_deref() != Some(source_hash.as_str()));

        if !opts.dry {
            if need_raster {
                if let Some(result) = recompress_in_place(file, &ext, opts)? {
                    // cache records the post-compression digest; conversion
                    // below sees the new bytes too
                    source_hash = result.new_hash.clone();
                    entry.raster_hash = Some(result.new_hash);
                    cache.insert(rel_key.clone(), entry.clone());
                    compressed.push(CompressedFile {
                        file: rel_key.clone(),
                        before_mb: round2(bytes_to_mb(info.size)),
                        after_mb: round2(bytes_to_mb(result.after_size)),
                        saved_mb: round2(bytes_to_mb(info.size.saturating_sub(result.after_size))),
                    });
                }
            } else if raster_candidate {
                skipped_raster += 1;
            }

            let webp_out = fs_scan::webp_path_for(file);
            let need_webp = do_webp
                && raster_candidate
                && (opts.force_webp
                    || !webp_out.exists()
                    || entry.webp_source_hash.as_deref() != Some(source_hash.as_str()));

            if need_webp {
                match convert_to_webp(file, &webp_out, opts.quality) {
                    Ok(()) => {
                        webp_generated.push(fs_scan::rel_posix(cwd, &webp_out));
                        entry.webp_source_hash = Some(source_hash.clone());
                        cache.insert(rel_key.clone(), entry.clone());
                    }
                    Err(_) => skipped_webp += 1,
                }
            } else if do_webp && raster_candidate {
                skipped_webp += 1;
            }

            // Replace mode drops the original whether or not conversion ran
            // this pass; an up-to-date sibling from an earlier run counts.
            if opts.mode == RunMode::Replace && do_webp && raster_candidate {
                std::fs::remove_file(file)
                    .with_context(|| format!("remove original {}", file.display()))?;
            }
        }

        processed += 1;
    }

    if !opts.dry {
        cache::save_cache(cwd, &opts.cache_file, &cache)?;
    }

    let map = rewrite::build_mapping(cwd, &images);
    let (refs_updated, code_modified) = if opts.effective_replace_refs() {
        rewrite::replace_references(cwd, &opts.code_globs, &opts.ignore_globs, &map, opts.dry)?
    } else {
        (0, Vec::new())
    };

    let total_saved_mb = round2(compressed.iter().map(|c| c.saved_mb).sum());

    Ok(RunSummary {
        total_found: images.len(),
        processed,
        refs_updated,
        action: opts.effective_action(),
        compressed,
        webp_generated,
        code_modified,
        total_saved_mb,
        skipped_raster,
        skipped_webp,
        warnings,
        errors,
        mode: opts.mode,
        dry: opts.dry,
    })
}

/* =========================
   Per-file operations
   ========================= */

struct Recompressed {
    after_size: u64,
    new_hash: String,
}

/// In-place recompression. A codec failure returns `Ok(None)`: the file is
/// left untouched, nothing is cached, and the attempt repeats next run.
fn recompress_in_place(file: &Path, ext: &str, opts: &RunOptions) -> Result<Option<Recompressed>> {
    if opts.backup {
        write_backup_once(file)?;
    }
    let bytes = std::fs::read(file).with_context(|| format!("read {}", file.display()))?;
    let Ok(encoded) = codec::compress_raster(&bytes, ext, opts.quality) else {
        return Ok(None);
    };
    std::fs::write(file, &encoded).with_context(|| format!("write {}", file.display()))?;
    Ok(Some(Recompressed {
        after_size: encoded.len() as u64,
        new_hash: cache::hash_bytes(&encoded),
    }))
}

/// `<name>.<ext>.bak`, created once and never overwritten.
fn backup_path(file: &Path) -> PathBuf {
    let mut os = file.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}

fn write_backup_once(file: &Path) -> Result<()> {
    let bak = backup_path(file);
    if !bak.exists() {
        std::fs::copy(file, &bak).with_context(|| format!("backup {}", file.display()))?;
    }
    Ok(())
}

/// Encodes the bytes currently on disk (post-recompression when both
/// operations triggered in the same pass).
fn convert_to_webp(file: &Path, out: &Path, quality: u8) -> Result<()> {
    let bytes = std::fs::read(file)?;
    let encoded = codec::encode_webp(&bytes, quality)?;
    std::fs::write(out, encoded)?;
    Ok(())
}

fn process_svg(file: &Path, dry: bool) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let minified = codec::minify_svg(&content)?;
    if !dry {
        std::fs::write(file, minified).with_context(|| format!("write {}", file.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_options;
    use image::{DynamicImage, ImageFormat};
    use std::path::Path;

    fn write_tinted_png(path: &Path, blue: u8) {
        let img = image::ImageBuffer::from_fn(64, 64, |x, y| {
            image::Rgb([(x * 4) as u8, (y * 4) as u8, blue])
        });
        DynamicImage::ImageRgb8(img).save_with_format(path, ImageFormat::Png).unwrap();
    }

    fn write_test_png(path: &Path) {
        write_tinted_png(path, 200);
    }

    fn write_test_jpeg(path: &Path) {
        let img = image::ImageBuffer::from_fn(64, 64, |x, _| {
            image::Rgb([(x * 4) as u8, 90, 30])
        });
        DynamicImage::ImageRgb8(img).save_with_format(path, ImageFormat::Jpeg).unwrap();
    }

    fn project(dir: &Path) -> RunOptions {
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        write_test_png(&dir.join("assets/logo.png"));
        write_test_jpeg(&dir.join("assets/photo.jpg"));
        let mut opts = default_options(dir);
        opts.dirs = vec!["assets".into()];
        opts
    }

    #[test]
    fn dual_mode_keeps_original_and_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());

        let summary = run(&opts).unwrap();
        assert_eq!(summary.total_found, 2);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.webp_generated.len(), 2);
        assert!(dir.path().join("assets/logo.png").exists());
        assert!(dir.path().join("assets/logo.webp").exists());
        assert!(dir.path().join("assets/photo.jpg").exists());
        assert!(dir.path().join("assets/photo.webp").exists());
    }

    #[test]
    fn replace_mode_drops_originals() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.mode = RunMode::Replace;
        opts.replace_refs = Some(false);

        run(&opts).unwrap();
        assert!(!dir.path().join("assets/logo.png").exists());
        assert!(dir.path().join("assets/logo.webp").exists());
    }

    #[test]
    fn second_run_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());

        let first = run(&opts).unwrap();
        assert_eq!(first.compressed.len(), 2);
        assert_eq!(first.webp_generated.len(), 2);
        assert_eq!(first.skipped_raster, 0);

        let second = run(&opts).unwrap();
        assert!(second.compressed.is_empty());
        assert!(second.webp_generated.is_empty());
        assert_eq!(second.skipped_raster, 2);
        assert_eq!(second.skipped_webp, 2);
    }

    #[test]
    fn mutated_file_retriggers_recompression() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());
        run(&opts).unwrap();

        // out-of-band change to one source file, with different pixel content
        // so the recompressed bytes differ from the cached conversion source
        write_tinted_png(&dir.path().join("assets/logo.png"), 40);

        let summary = run(&opts).unwrap();
        assert_eq!(summary.compressed.len(), 1);
        assert_eq!(summary.compressed[0].file, "assets/logo.png");
        assert_eq!(summary.skipped_raster, 1);
        assert_eq!(summary.webp_generated, vec!["assets/logo.webp"]);
    }

    #[test]
    fn same_content_recompresses_without_reconversion() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());
        run(&opts).unwrap();

        // restore the pre-compression bytes: the raster pass re-fires, but
        // its output matches the cached conversion source, so no new webp
        write_test_png(&dir.path().join("assets/logo.png"));

        let summary = run(&opts).unwrap();
        assert_eq!(summary.compressed.len(), 1);
        assert_eq!(summary.skipped_raster, 1);
        assert!(summary.webp_generated.is_empty());
        assert_eq!(summary.skipped_webp, 2);
    }

    #[test]
    fn dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.dry = true;
        opts.mode = RunMode::Replace;
        std::fs::write(dir.path().join("index.html"), "<img src=\"assets/logo.png\">")
            .unwrap();
        let before_png = std::fs::read(dir.path().join("assets/logo.png")).unwrap();

        let summary = run(&opts).unwrap();
        assert!(summary.dry);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.refs_updated, 1); // reported, not written

        assert_eq!(std::fs::read(dir.path().join("assets/logo.png")).unwrap(), before_png);
        assert!(!dir.path().join("assets/logo.webp").exists());
        assert!(!dir.path().join(crate::config::DEFAULT_CACHE_FILE).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("index.html")).unwrap(),
            "<img src=\"assets/logo.png\">"
        );
    }

    #[test]
    fn corrupt_cache_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());
        std::fs::write(dir.path().join(&opts.cache_file), "{\"bad json").unwrap();

        let summary = run(&opts).unwrap();
        assert_eq!(summary.compressed.len(), 2);
        // cache was rewritten as valid JSON
        let cache = cache::load_cache(dir.path(), &opts.cache_file);
        assert_eq!(cache.len(), 2);
        assert!(cache["assets/logo.png"].raster_hash.is_some());
    }

    #[test]
    fn replace_mode_rewrites_references() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.mode = RunMode::Replace;
        std::fs::write(
            dir.path().join("page.html"),
            "<img src=\"assets/logo.png\"> <img src=\"assets/photo.jpg\">",
        )
        .unwrap();

        let summary = run(&opts).unwrap();
        assert_eq!(summary.refs_updated, 1);
        assert_eq!(summary.code_modified, vec!["page.html"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("page.html")).unwrap(),
            "<img src=\"assets/logo.webp\"> <img src=\"assets/photo.webp\">"
        );
    }

    #[test]
    fn compress_action_skips_conversion_and_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.action = Some(Action::Compress);
        opts.mode = RunMode::Replace; // deletion requires the webp action

        let summary = run(&opts).unwrap();
        assert_eq!(summary.action, Action::Compress);
        assert_eq!(summary.compressed.len(), 2);
        assert!(summary.webp_generated.is_empty());
        assert_eq!(summary.skipped_webp, 0);
        assert!(dir.path().join("assets/logo.png").exists());
        assert!(!dir.path().join("assets/logo.webp").exists());
    }

    #[test]
    fn backup_written_once_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.backup = true;
        opts.action = Some(Action::Compress);

        run(&opts).unwrap();
        let bak = dir.path().join("assets/logo.png.bak");
        assert!(bak.exists());
        let first_backup = std::fs::read(&bak).unwrap();

        // force another recompression; the backup must not be overwritten
        opts.force_raster = true;
        run(&opts).unwrap();
        assert_eq!(std::fs::read(&bak).unwrap(), first_backup);
    }

    #[test]
    fn gif_without_flag_is_invisible() {
        let dir = tempfile::tempdir().unwrap();
        let opts = project(dir.path());
        std::fs::write(dir.path().join("assets/anim.gif"), b"GIF89a\x00").unwrap();

        let summary = run(&opts).unwrap();
        // dropped at the filter, so not even in totalFound
        assert_eq!(summary.total_found, 2);
        assert_eq!(summary.processed, 2);
    }

    #[test]
    fn svg_minified_in_place_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.svg = true;
        let svg = dir.path().join("assets/icon.svg");
        std::fs::write(&svg, "<svg>\n  <!-- x -->\n  <rect/>\n</svg>").unwrap();

        let summary = run(&opts).unwrap();
        assert_eq!(summary.total_found, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(std::fs::read_to_string(&svg).unwrap(), "<svg><rect/></svg>");
        // never converted, never cached
        assert!(!dir.path().join("assets/icon.webp").exists());
        let cache = cache::load_cache(dir.path(), &opts.cache_file);
        assert!(!cache.contains_key("assets/icon.svg"));
    }

    #[test]
    fn size_tiers_reported_from_pre_run_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = project(dir.path());
        opts.warn_kb = Some(0.1);
        opts.error_kb = Some(10_000.0);

        let summary = run(&opts).unwrap();
        // both generated test images are > 100 bytes and < ~10MB
        assert_eq!(summary.warnings.len(), 2);
        assert!(summary.errors.is_empty());
    }
}
