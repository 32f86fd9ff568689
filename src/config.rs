use crate::types::{Action, RunMode, RunOptions};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_INCLUDE: &str = "jpg,jpeg,png,gif,svg";
pub const DEFAULT_CACHE_FILE: &str = "img-refactor.cache.json";
pub const DEFAULT_CODE_GLOBS: &[&str] = &["**/*.{js,jsx,ts,tsx,mdx,html,vue,css,scss}"];
pub const DEFAULT_IGNORE_GLOBS: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/.next/**",
    "**/build/**",
    "**/coverage/**",
    "**/.git/**",
];

/// One layer of the configuration surface. Every field optional so layers
/// stack: built-in defaults, then the project config file, then CLI flags.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    pub dry: Option<bool>,
    pub mode: Option<RunMode>,
    pub dirs: Option<Vec<String>>,
    /// Comma-separated extension list, e.g. "jpg,jpeg,png".
    pub include: Option<String>,
    pub gif: Option<bool>,
    pub svg: Option<bool>,
    pub quality: Option<u8>,
    #[serde(rename = "warnMB")]
    pub warn_mb: Option<f64>,
    #[serde(rename = "errorMB")]
    pub error_mb: Option<f64>,
    #[serde(rename = "warnKB")]
    pub warn_kb: Option<f64>,
    #[serde(rename = "errorKB")]
    pub error_kb: Option<f64>,
    pub replace_refs: Option<bool>,
    pub code_globs: Option<Vec<String>>,
    pub ignore_globs: Option<Vec<String>>,
    pub force_raster: Option<bool>,
    pub force_webp: Option<bool>,
    pub skip_raster: Option<bool>,
    pub cache_file: Option<String>,
    pub backup: Option<bool>,
    pub action: Option<Action>,
}

pub fn split_include(s: &str) -> Vec<String> {
    s.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

pub fn default_options(cwd: &Path) -> RunOptions {
    RunOptions {
        cwd: cwd.to_path_buf(),
        dry: false,
        mode: RunMode::Dual,
        dirs: Vec::new(),
        include: split_include(DEFAULT_INCLUDE),
        gif: false,
        svg: false,
        quality: 80,
        warn_mb: 1.0,
        error_mb: 3.0,
        warn_kb: None,
        error_kb: None,
        replace_refs: None,
        code_globs: DEFAULT_CODE_GLOBS.iter().map(|s| s.to_string()).collect(),
        ignore_globs: DEFAULT_IGNORE_GLOBS.iter().map(|s| s.to_string()).collect(),
        force_raster: false,
        force_webp: false,
        skip_raster: false,
        backup: false,
        cache_file: DEFAULT_CACHE_FILE.to_string(),
        action: None,
    }
}

/// Project config file: `img-refactor.config.yaml` preferred,
/// `img-refactor.config.json` fallback. Missing or malformed files are an
/// empty layer, never fatal.
pub fn load_file_config(cwd: &Path) -> Option<ConfigLayer> {
    let yaml = cwd.join("img-refactor.config.yaml");
    if yaml.exists() {
        let s = std::fs::read_to_string(&yaml).ok()?;
        return serde_yaml::from_str(&s).ok();
    }
    let json = cwd.join("img-refactor.config.json");
    if json.exists() {
        let s = std::fs::read_to_string(&json).ok()?;
        return serde_json::from_str(&s).ok();
    }
    None
}

fn apply_layer(opts: &mut RunOptions, layer: &ConfigLayer) {
    if let Some(v) = layer.dry {
        opts.dry = v;
    }
    if let Some(v) = layer.mode {
        opts.mode = v;
    }
    if let Some(v) = &layer.dirs {
        opts.dirs = v.clone();
    }
    if let Some(v) = &layer.include {
        opts.include = split_include(v);
    }
    if let Some(v) = layer.gif {
        opts.gif = v;
    }
    if let Some(v) = layer.svg {
        opts.svg = v;
    }
    if let Some(v) = layer.quality {
        opts.quality = v;
    }
    if let Some(v) = layer.warn_mb {
        opts.warn_mb = v;
    }
    if let Some(v) = layer.error_mb {
        opts.error_mb = v;
    }
    if let Some(v) = layer.warn_kb {
        opts.warn_kb = Some(v);
    }
    if let Some(v) = layer.error_kb {
        opts.error_kb = Some(v);
    }
    if let Some(v) = layer.replace_refs {
        opts.replace_refs = Some(v);
    }
    if let Some(v) = &layer.code_globs {
        opts.code_globs = v.clone();
    }
    if let Some(v) = &layer.ignore_globs {
        opts.ignore_globs = v.clone();
    }
    if let Some(v) = layer.force_raster {
        opts.force_raster = v;
    }
    if let Some(v) = layer.force_webp {
        opts.force_webp = v;
    }
    if let Some(v) = layer.skip_raster {
        opts.skip_raster = v;
    }
    if let Some(v) = &layer.cache_file {
        opts.cache_file = v.clone();
    }
    if let Some(v) = layer.backup {
        opts.backup = v;
    }
    if let Some(v) = layer.action {
        opts.action = Some(v);
    }
}

/// Layered resolution with documented precedence: CLI > config file >
/// built-in defaults. `base` carries per-subcommand defaults.
pub fn resolve(base: RunOptions, file: Option<&ConfigLayer>, cli: &ConfigLayer) -> RunOptions {
    let mut opts = base;
    if let Some(layer) = file {
        apply_layer(&mut opts, layer);
    }
    apply_layer(&mut opts, cli);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let opts = default_options(Path::new("/p"));
        assert_eq!(opts.mode, RunMode::Dual);
        assert_eq!(opts.quality, 80);
        assert_eq!(opts.include, vec!["jpg", "jpeg", "png", "gif", "svg"]);
        assert_eq!(opts.cache_file, DEFAULT_CACHE_FILE);
        assert!(opts.dirs.is_empty());
        assert!(!opts.dry);
    }

    #[test]
    fn cli_beats_file_beats_defaults() {
        let file = ConfigLayer {
            quality: Some(60),
            gif: Some(true),
            mode: Some(RunMode::Replace),
            ..Default::default()
        };
        let cli = ConfigLayer { quality: Some(90), ..Default::default() };

        let opts = resolve(default_options(Path::new(".")), Some(&file), &cli);
        assert_eq!(opts.quality, 90); // CLI wins
        assert!(opts.gif); // file fills the gap
        assert_eq!(opts.mode, RunMode::Replace);
        assert_eq!(opts.warn_mb, 1.0); // default survives
    }

    #[test]
    fn yaml_config_parses_surface_names() {
        let yaml = r#"
mode: replace
include: "jpg,png"
warnMB: 0.5
errorKB: 2048
replaceRefs: false
codeGlobs:
  - "**/*.html"
forceWebp: true
cacheFile: custom.cache.json
action: webp
"#;
        let layer: ConfigLayer = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(layer.mode, Some(RunMode::Replace));
        assert_eq!(layer.warn_mb, Some(0.5));
        assert_eq!(layer.error_kb, Some(2048.0));
        assert_eq!(layer.replace_refs, Some(false));
        assert_eq!(layer.force_webp, Some(true));
        assert_eq!(layer.cache_file.as_deref(), Some("custom.cache.json"));
        assert_eq!(layer.action, Some(Action::Webp));

        let opts = resolve(
            default_options(Path::new(".")),
            Some(&layer),
            &ConfigLayer::default(),
        );
        assert_eq!(opts.include, vec!["jpg", "png"]);
        assert_eq!(opts.code_globs, vec!["**/*.html"]);
    }

    #[test]
    fn malformed_config_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("img-refactor.config.json"), "{ nope").unwrap();
        assert!(load_file_config(dir.path()).is_none());
    }

    #[test]
    fn json_config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("img-refactor.config.json"),
            r#"{"quality": 65, "svg": true, "ignoreGlobs": ["**/vendor/**"]}"#,
        )
        .unwrap();
        let layer = load_file_config(dir.path()).unwrap();
        assert_eq!(layer.quality, Some(65));
        assert_eq!(layer.svg, Some(true));
        assert_eq!(layer.ignore_globs, Some(vec!["**/vendor/**".to_string()]));
    }

    #[test]
    fn split_include_normalizes() {
        assert_eq!(split_include(" JPG , png ,"), vec!["jpg", "png"]);
    }
}
