// src/classify/reply.rs
//! Parsing of oracle replies. Replies are untrusted: only string/JSON parsing,
//! every term is matched back against the input list.

use std::collections::HashMap;

use crate::classify::CategoryTaxonomy;
use crate::error::ClassifyError;

/// Drop a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(reply: &str) -> &str {
    let t = reply.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let body = match rest.find('\n') {
        Some(nl) => &rest[nl + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Find the input term a reply token refers to: exact match first, then case-insensitive.
pub fn match_term<'a>(candidate: &str, terms: &'a [String]) -> Option<&'a String> {
    let c = candidate.trim();
    if c.is_empty() {
        return None;
    }
    terms
        .iter()
        .find(|t| t.as_str() == c)
        .or_else(|| terms.iter().find(|t| t.eq_ignore_ascii_case(c)))
}

/// Bulk reply: one JSON object `category -> [term, ...]`.
///
/// Keys must be taxonomy members and values string arrays, otherwise the reply
/// is a parse error. Terms outside `terms` are dropped; a term keeps the first
/// category (taxonomy order) it was placed in. Returns (term, category) pairs.
pub fn parse_bulk(
    reply: &str,
    terms: &[String],
    taxonomy: &CategoryTaxonomy,
) -> Result<Vec<(String, String)>, ClassifyError> {
    let body = strip_code_fence(reply);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ClassifyError::parse(format!("reply is not JSON: {e}"), reply))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ClassifyError::parse("reply is not a JSON object", reply))?;

    let mut by_category: HashMap<&str, Vec<&str>> = HashMap::new();
    for (key, val) in obj {
        let category = taxonomy.canonical(key).ok_or_else(|| {
            ClassifyError::parse(format!("category {key:?} is not in the taxonomy"), reply)
        })?;
        let arr = val.as_array().ok_or_else(|| {
            ClassifyError::parse(format!("bucket {key:?} is not a list"), reply)
        })?;
        let bucket = by_category.entry(category).or_default();
        for item in arr {
            let s = item.as_str().ok_or_else(|| {
                ClassifyError::parse(format!("bucket {key:?} holds a non-string"), reply)
            })?;
            bucket.push(s);
        }
    }

    let mut out: Vec<(String, String)> = Vec::new();
    let mut dropped = 0usize;
    for category in taxonomy.names() {
        let Some(bucket) = by_category.get(category.as_str()) else {
            continue;
        };
        for candidate in bucket {
            match match_term(candidate, terms) {
                Some(term) if !out.iter().any(|(t, _)| t == term) => {
                    out.push((term.clone(), category.clone()));
                }
                Some(_) => {}
                None => dropped += 1,
            }
        }
    }
    if dropped > 0 {
        tracing::debug!(dropped, "oracle reply named terms outside the input list");
    }
    Ok(out)
}

/// Per-term reply: a single label. Anything outside the taxonomy means "no category".
pub fn parse_label(reply: &str, taxonomy: &CategoryTaxonomy) -> Option<String> {
    let label = strip_code_fence(reply)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')', '.'])
        .trim_matches(['"', '\'', '`', ' ']);
    taxonomy.canonical(label).map(str::to_string)
}

/// List reply: comma/newline separated terms, filtered back to the input list.
pub fn parse_list(reply: &str, terms: &[String]) -> Vec<String> {
    let body = strip_code_fence(reply);
    if body.eq_ignore_ascii_case("none") {
        return Vec::new();
    }
    let mut out: Vec<String> = Vec::new();
    for token in body.split([',', '\n']) {
        let token = token
            .trim()
            .trim_start_matches(['-', '*', '•'])
            .trim_matches(['"', '\'', '`', ' ']);
        if let Some(term) = match_term(token, terms) {
            if !out.contains(term) {
                out.push(term.clone());
            }
        }
    }
    out
}
