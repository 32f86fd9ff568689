use crate::types::Cache;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// cache file path: <cwd>/<cache_file>
pub fn cache_path(cwd: &Path, cache_file: &str) -> PathBuf {
    cwd.join(cache_file)
}

/// Full-content blake3 digest, hex. Depends on byte content only.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Missing or unparsable cache file => empty cache. Corruption is treated
/// exactly like "no cache" and never aborts the run.
pub fn load_cache(cwd: &Path, cache_file: &str) -> Cache {
    let p = cache_path(cwd, cache_file);
    let Ok(s) = std::fs::read_to_string(&p) else {
        return Cache::new();
    };
    serde_json::from_str(&s).unwrap_or_default()
}

/// Persist the full mapping. Called once at run end, never in dry mode.
pub fn save_cache(cwd: &Path, cache_file: &str, cache: &Cache) -> Result<()> {
    let p = cache_path(cwd, cache_file);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let s = serde_json::to_string_pretty(cache)?;
    std::fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}
