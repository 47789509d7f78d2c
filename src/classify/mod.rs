// src/classify/mod.rs
//! Classification stage: trending terms -> taxonomy buckets via the oracle,
//! with the optional per-term cache answering repeat terms.

pub mod oracle;
pub mod prompts;
pub mod reply;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::cache::{Cached, ClassificationCache};
use crate::classify::oracle::{DynOracle, OraclePrompt};
use crate::error::ClassifyError;

/// Ordered category names for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTaxonomy {
    names: Vec<String>,
}

impl CategoryTaxonomy {
    /// Trims names and drops blanks and case-insensitive repeats. Empty taxonomies are rejected.
    pub fn new<I, S>(names: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for n in names {
            let n = n.as_ref().trim();
            if n.is_empty() || out.iter().any(|o| o.eq_ignore_ascii_case(n)) {
                continue;
            }
            out.push(n.to_string());
        }
        if out.is_empty() {
            anyhow::bail!("category taxonomy is empty");
        }
        Ok(Self { names: out })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Canonical spelling of `label`, matched case-insensitively.
    pub fn canonical(&self, label: &str) -> Option<&str> {
        let l = label.trim();
        self.names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(l))
            .map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.canonical(label).is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifyMode {
    /// One request for all terms, JSON object reply.
    #[default]
    Bulk,
    /// One request per term, single-label reply.
    PerTerm,
    /// One request per category, comma-separated reply.
    List,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Bucket {
    pub category: String,
    pub terms: Vec<String>,
}

/// Term -> zero-or-one category. Only input terms can be assigned, each at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    terms: Vec<String>,
    categories: Vec<String>,
    labels: HashMap<String, String>,
}

impl ClassificationResult {
    pub fn new(terms: Vec<String>, taxonomy: &CategoryTaxonomy) -> Self {
        Self {
            terms,
            categories: taxonomy.names().to_vec(),
            labels: HashMap::new(),
        }
    }

    /// Returns false (and changes nothing) for unknown or already-assigned terms.
    fn assign(&mut self, term: &str, category: &str) -> bool {
        if !self.terms.iter().any(|t| t == term) || self.labels.contains_key(term) {
            return false;
        }
        self.labels.insert(term.to_string(), category.to_string());
        true
    }

    pub fn category_of(&self, term: &str) -> Option<&str> {
        self.labels.get(term).map(String::as_str)
    }

    /// Classified terms in input order.
    pub fn classified_terms(&self) -> Vec<String> {
        self.terms
            .iter()
            .filter(|t| self.labels.contains_key(t.as_str()))
            .cloned()
            .collect()
    }

    pub fn terms_in(&self, category: &str) -> Vec<String> {
        self.terms
            .iter()
            .filter(|t| {
                self.labels
                    .get(t.as_str())
                    .is_some_and(|c| c.eq_ignore_ascii_case(category))
            })
            .cloned()
            .collect()
    }

    /// Every taxonomy category in order, empty buckets included.
    pub fn buckets(&self) -> Vec<Bucket> {
        self.categories
            .iter()
            .map(|c| Bucket {
                category: c.clone(),
                terms: self.terms_in(c),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct Classifier {
    oracle: DynOracle,
    cache: Option<Arc<ClassificationCache>>,
    mode: ClassifyMode,
}

impl Classifier {
    pub fn new(oracle: DynOracle, mode: ClassifyMode) -> Self {
        Self {
            oracle,
            cache: None,
            mode,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ClassificationCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn mode(&self) -> ClassifyMode {
        self.mode
    }

    /// Write-through of one oracle decision. Fixed-reply oracles never write.
    fn remember(&self, term: &str, category: Option<&str>) {
        let Some(cache) = self.cache.as_ref().filter(|_| self.oracle.caches_replies()) else {
            return;
        };
        let entry = match category {
            Some(cat) => Cached::Category(cat.to_string()),
            None => Cached::Uncategorized,
        };
        if let Err(e) = cache.put(term, entry) {
            tracing::warn!(error = %e, term, "classification cache write failed");
        }
    }

    async fn ask(&self, prompt: &OraclePrompt) -> Result<String, ClassifyError> {
        self.oracle
            .complete(prompt)
            .await
            .map_err(|e| ClassifyError::Oracle {
                provider: self.oracle.name().to_string(),
                message: format!("{e:#}"),
            })
    }

    pub async fn classify(
        &self,
        terms: &[String],
        taxonomy: &CategoryTaxonomy,
    ) -> Result<ClassificationResult, ClassifyError> {
        let terms = clean_terms(terms);
        let mut result = ClassificationResult::new(terms.clone(), taxonomy);

        // Cache short-circuit: only misses reach the oracle.
        let mut misses: Vec<String> = Vec::new();
        for term in &terms {
            match self.cache.as_ref().and_then(|c| c.get(term)) {
                Some(Cached::Category(cat)) => {
                    counter!("classify_cache_hits_total").increment(1);
                    // A label from an older taxonomy counts as unclassified for this run.
                    if let Some(canon) = taxonomy.canonical(&cat) {
                        result.assign(term, canon);
                    }
                }
                Some(Cached::Uncategorized) => {
                    counter!("classify_cache_hits_total").increment(1);
                }
                None => misses.push(term.clone()),
            }
        }

        if misses.is_empty() {
            tracing::debug!(terms = terms.len(), "classification answered from cache");
            return Ok(result);
        }

        let decided: Vec<(String, String)> = match self.mode {
            ClassifyMode::Bulk => {
                let reply = self.ask(&prompts::bulk(&misses, taxonomy)).await?;
                reply::parse_bulk(&reply, &misses, taxonomy)?
            }
            ClassifyMode::PerTerm => {
                // Cached per call so a later oracle failure keeps earlier answers.
                let mut out = Vec::new();
                for term in &misses {
                    let reply = self.ask(&prompts::per_term(term, taxonomy)).await?;
                    let cat = reply::parse_label(&reply, taxonomy);
                    self.remember(term, cat.as_deref());
                    if let Some(cat) = cat {
                        result.assign(term, &cat);
                        out.push((term.clone(), cat));
                    }
                }
                out
            }
            ClassifyMode::List => {
                let mut out: Vec<(String, String)> = Vec::new();
                for category in taxonomy.names() {
                    let reply = self.ask(&prompts::list(category, &misses)).await?;
                    for term in reply::parse_list(&reply, &misses) {
                        if !out.iter().any(|(t, _)| *t == term) {
                            out.push((term, category.clone()));
                        }
                    }
                }
                out
            }
        };

        if self.mode != ClassifyMode::PerTerm {
            for (term, cat) in &decided {
                result.assign(term, cat);
            }
            for term in &misses {
                let cat = decided
                    .iter()
                    .find(|(t, _)| t == term)
                    .map(|(_, c)| c.as_str());
                self.remember(term, cat);
            }
        }

        tracing::info!(
            target: "classify",
            mode = ?self.mode,
            oracle = self.oracle.name(),
            terms = terms.len(),
            misses = misses.len(),
            classified = result.len(),
            "classification done"
        );
        Ok(result)
    }
}

/// Trim, drop blanks, collapse repeats (first occurrence wins).
fn clean_terms(terms: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty() && seen.insert(*t))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_dedups_and_rejects_empty() {
        let t = CategoryTaxonomy::new([" AI/ML ", "ai/ml", "", "Other"]).unwrap();
        assert_eq!(t.names(), ["AI/ML".to_string(), "Other".to_string()]);
        assert_eq!(t.canonical("other"), Some("Other"));
        assert!(CategoryTaxonomy::new(["  "]).is_err());
    }

    #[test]
    fn result_assigns_each_input_term_once() {
        let tax = CategoryTaxonomy::new(["AI/ML", "Finance"]).unwrap();
        let mut r = ClassificationResult::new(vec!["a".into(), "b".into()], &tax);
        assert!(r.assign("a", "AI/ML"));
        assert!(!r.assign("a", "Finance"));
        assert!(!r.assign("zzz", "Finance"));
        let buckets = r.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].terms, vec!["a".to_string()]);
        assert!(buckets[1].terms.is_empty());
        assert_eq!(r.classified_terms(), vec!["a".to_string()]);
    }

    #[test]
    fn clean_terms_trims_and_dedups() {
        let got = clean_terms(&[" a ".into(), "a".into(), "".into(), "b".into()]);
        assert_eq!(got, vec!["a".to_string(), "b".to_string()]);
    }
}
