// src/cache.rs
//! Classification cache: one JSON object on disk mapping raw term -> category (or null).
//!
//! Loaded fully at open and rewritten wholesale after every `put`. Entries never
//! expire. The in-memory map and the file write share one mutex, so concurrent
//! requests in this process cannot lose updates; separate processes sharing the
//! same file are not supported.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Cached outcome for a term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cached {
    Category(String),
    /// The oracle was asked and placed the term in no category.
    Uncategorized,
}

impl Cached {
    fn from_stored(v: Option<String>) -> Self {
        match v {
            Some(c) => Cached::Category(c),
            None => Cached::Uncategorized,
        }
    }

    fn to_stored(&self) -> Option<String> {
        match self {
            Cached::Category(c) => Some(c.clone()),
            Cached::Uncategorized => None,
        }
    }
}

pub struct ClassificationCache {
    path: PathBuf,
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl ClassificationCache {
    /// Open (or start) the cache at `path`. A missing file starts empty; an
    /// unreadable one starts empty too and is overwritten on the next `put`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load(&path) {
            Ok(m) => {
                tracing::debug!(path = %path.display(), entries = m.len(), "classification cache loaded");
                m
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "classification cache unreadable, starting empty");
                HashMap::new()
            }
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, term: &str) -> Option<Cached> {
        let g = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        g.get(term).cloned().map(Cached::from_stored)
    }

    /// Insert and persist while holding the lock.
    pub fn put(&self, term: &str, value: Cached) -> io::Result<()> {
        let mut g = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        g.insert(term.to_string(), value.to_stored());
        save(&self.path, &g)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn load(path: &Path) -> io::Result<HashMap<String, Option<String>>> {
    let s = fs::read_to_string(path)?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save(path: &Path, entries: &HashMap<String, Option<String>>) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    // Sorted keys keep the file diff-friendly.
    let sorted: BTreeMap<&String, &Option<String>> = entries.iter().collect();
    let json = serde_json::to_string_pretty(&sorted)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn put_is_write_through_and_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("nested/topic_cache.json");

        let c = ClassificationCache::open(&p);
        assert!(c.is_empty());
        c.put("GPT-5 launch", Cached::Category("AI/ML".into())).unwrap();
        c.put("Local bakery", Cached::Uncategorized).unwrap();

        let reopened = ClassificationCache::open(&p);
        assert_eq!(
            reopened.get("GPT-5 launch"),
            Some(Cached::Category("AI/ML".into()))
        );
        assert_eq!(reopened.get("Local bakery"), Some(Cached::Uncategorized));
        assert_eq!(reopened.get("unknown"), None);

        let raw = fs::read_to_string(&p).unwrap();
        assert!(raw.contains("\"Local bakery\": null"));
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("topic_cache.json");
        fs::write(&p, "not json").unwrap();
        let c = ClassificationCache::open(&p);
        assert!(c.is_empty());
        c.put("x", Cached::Uncategorized).unwrap();
        assert_eq!(ClassificationCache::open(&p).len(), 1);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("topic_cache.json");
        let c = Arc::new(ClassificationCache::open(&p));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for j in 0..10 {
                        c.put(&format!("t{i}-{j}"), Cached::Uncategorized).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(ClassificationCache::open(&p).len(), 80);
    }
}
