use crate::types::RunSummary;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Markdown rendition of the run summary, for `--report md`.
pub fn render_markdown(summary: &RunSummary) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push("# img-refactor report".to_string());
    if let Ok(ts) = OffsetDateTime::now_utc().format(&Rfc3339) {
        lines.push(format!("- generated: {ts}"));
    }
    lines.push(format!("- totalFound: {}", summary.total_found));
    lines.push(format!("- processed: {}", summary.processed));
    lines.push(format!("- refsUpdated: {}", summary.refs_updated));
    lines.push(format!("- totalSavedMB: {}", summary.total_saved_mb));
    lines.push(format!("- skippedRaster: {}", summary.skipped_raster));
    lines.push(format!("- skippedWebp: {}", summary.skipped_webp));
    lines.push(format!("- mode: {}", lower_token(summary.mode)));
    lines.push(format!("- dry: {}", summary.dry));

    if !summary.compressed.is_empty() {
        lines.push("\n## compressed".to_string());
        for c in &summary.compressed {
            lines.push(format!(
                "- {} ({} MB -> {} MB, saved {} MB)",
                c.file, c.before_mb, c.after_mb, c.saved_mb
            ));
        }
    }
    if !summary.webp_generated.is_empty() {
        lines.push("\n## webp generated".to_string());
        for f in &summary.webp_generated {
            lines.push(format!("- {f}"));
        }
    }
    if !summary.code_modified.is_empty() {
        lines.push("\n## code modified".to_string());
        for f in &summary.code_modified {
            lines.push(format!("- {f}"));
        }
    }
    if !summary.warnings.is_empty() {
        lines.push("\n## warnings".to_string());
        for w in &summary.warnings {
            lines.push(format!("- {} ({} MB)", w.file, w.size_mb));
        }
    }
    if !summary.errors.is_empty() {
        lines.push("\n## errors".to_string());
        for e in &summary.errors {
            lines.push(format!("- {} ({} MB)", e.file, e.size_mb));
        }
    }

    lines.join("\n")
}

fn lower_token<T: serde::Serialize>(v: T) -> String {
    serde_json::to_value(v)
        .ok()
        .and_then(|j| j.as_str().map(|s| s.to_string()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, RunMode, SizeFlag};

    fn summary() -> RunSummary {
        RunSummary {
            total_found: 3,
            processed: 2,
            refs_updated: 1,
            action: Action::Webp,
            compressed: vec![],
            webp_generated: vec!["assets/a.webp".into()],
            code_modified: vec![],
            total_saved_mb: 0.42,
            skipped_raster: 1,
            skipped_webp: 0,
            warnings: vec![SizeFlag { file: "assets/big.png".into(), size_mb: 2.1 }],
            errors: vec![],
            mode: RunMode::Replace,
            dry: false,
        }
    }

    #[test]
    fn markdown_carries_core_fields() {
        let md = render_markdown(&summary());
        assert!(md.starts_with("# img-refactor report"));
        assert!(md.contains("- totalFound: 3"));
        assert!(md.contains("- refsUpdated: 1"));
        assert!(md.contains("- mode: replace"));
        assert!(md.contains("## warnings"));
        assert!(md.contains("- assets/big.png (2.1 MB)"));
        assert!(md.contains("## webp generated"));
        assert!(!md.contains("## errors")); // empty sections are omitted
    }
}
