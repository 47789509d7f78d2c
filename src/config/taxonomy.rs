// src/config/taxonomy.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::CategoryTaxonomy;

pub const ENV_TAXONOMY_PATH: &str = "TRENDS_TAXONOMY_PATH";

/// Load a taxonomy from an explicit path. Supports TOML (`categories = [...]`) or a JSON array.
pub fn load_taxonomy_from(path: &Path) -> Result<CategoryTaxonomy> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading taxonomy from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let names = parse_categories(&content, ext.as_str())?;
    CategoryTaxonomy::new(names)
}

/// Taxonomy file lookup:
/// 1) $TRENDS_TAXONOMY_PATH
/// 2) config/taxonomy.toml
/// 3) config/taxonomy.json
///
/// `Ok(None)` when none exists.
pub fn load_taxonomy_default() -> Result<Option<CategoryTaxonomy>> {
    if let Ok(p) = std::env::var(ENV_TAXONOMY_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_TAXONOMY_PATH} points to non-existent path"));
        }
        return load_taxonomy_from(&pb).map(Some);
    }
    for candidate in ["config/taxonomy.toml", "config/taxonomy.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_taxonomy_from(&p).map(Some);
        }
    }
    Ok(None)
}

fn parse_categories(s: &str, hint_ext: &str) -> Result<Vec<String>> {
    let try_toml = hint_ext == "toml" || s.contains("categories");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported taxonomy format"))
}

fn parse_toml(s: &str) -> Result<Vec<String>> {
    #[derive(serde::Deserialize)]
    struct TomlTaxonomy {
        categories: Vec<String>,
    }
    let v: TomlTaxonomy = toml::from_str(s)?;
    Ok(v.categories)
}

fn parse_json(s: &str) -> Result<Vec<String>> {
    let v: Vec<String> = serde_json::from_str(s)?;
    Ok(v)
}
