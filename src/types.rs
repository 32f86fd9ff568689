use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Replace,
    Dual,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Compress,
    Webp,
}

/// Options for one invocation, resolved once (CLI > config file > defaults)
/// and read-only afterwards. The working directory is carried here so the
/// pipeline never reaches for process-global state.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub cwd: PathBuf,
    pub dry: bool,
    pub mode: RunMode,

    /// Asset directories to scan recursively. Empty => probe defaults.
    pub dirs: Vec<String>,
    /// Lowercased extensions allowed into the run (no dots).
    pub include: Vec<String>,
    pub gif: bool,
    pub svg: bool,

    pub quality: u8,

    pub warn_mb: f64,
    pub error_mb: f64,
    /// KB thresholds win over the MB ones when present and > 0.
    pub warn_kb: Option<f64>,
    pub error_kb: Option<f64>,

    /// Explicit setting wins; `None` => on only in replace mode.
    pub replace_refs: Option<bool>,
    pub code_globs: Vec<String>,
    pub ignore_globs: Vec<String>,

    pub force_raster: bool,
    pub force_webp: bool,
    pub skip_raster: bool,
    pub backup: bool,

    /// Cache file path, relative to `cwd`.
    pub cache_file: String,

    /// Explicit action wins; `None` => webp (both modes imply conversion).
    pub action: Option<Action>,
}

impl RunOptions {
    pub fn effective_action(&self) -> Action {
        self.action.unwrap_or(Action::Webp)
    }

    pub fn effective_replace_refs(&self) -> bool {
        self.replace_refs.unwrap_or(self.mode == RunMode::Replace)
    }
}

/// One cache record per project-relative file path. A field is written only
/// after the corresponding operation succeeded, so a failed encode keeps the
/// stale digest and is retried next run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(rename = "rasterHash", default, skip_serializing_if = "Option::is_none")]
    pub raster_hash: Option<String>,

    #[serde(rename = "webpSourceHash", default, skip_serializing_if = "Option::is_none")]
    pub webp_source_hash: Option<String>,
}

/// key = project-relative path, forward slashes
pub type Cache = BTreeMap<String, CacheEntry>;

/// Size snapshot taken before the pipeline mutates anything.
#[derive(Clone, Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompressedFile {
    pub file: String,
    #[serde(rename = "beforeMB")]
    pub before_mb: f64,
    #[serde(rename = "afterMB")]
    pub after_mb: f64,
    #[serde(rename = "savedMB")]
    pub saved_mb: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SizeFlag {
    pub file: String,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
}

/// The single output record of a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "totalFound")]
    pub total_found: usize,
    pub processed: usize,
    #[serde(rename = "refsUpdated")]
    pub refs_updated: usize,
    pub action: Action,
    pub compressed: Vec<CompressedFile>,
    #[serde(rename = "webpGenerated")]
    pub webp_generated: Vec<String>,
    #[serde(rename = "codeModified")]
    pub code_modified: Vec<String>,
    #[serde(rename = "totalSavedMB")]
    pub total_saved_mb: f64,
    #[serde(rename = "skippedRaster")]
    pub skipped_raster: usize,
    #[serde(rename = "skippedWebp")]
    pub skipped_webp: usize,
    pub warnings: Vec<SizeFlag>,
    pub errors: Vec<SizeFlag>,
    pub mode: RunMode,
    pub dry: bool,
}

pub fn bytes_to_mb(b: u64) -> f64 {
    b as f64 / (1024.0 * 1024.0)
}

/// Round to 2 decimals, matching the report's MB fields.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
