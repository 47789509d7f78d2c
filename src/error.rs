// src/error.rs
//! Stage error taxonomy for one pipeline run.
//!
//! Each stage reports its own typed failure; the pipeline wraps them in
//! `PipelineError` so callers can tell which stage aborted the run.

use std::error::Error;
use std::fmt;

use serde::Serialize;

/// What went wrong while talking to a trend source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Upstream answered with a non-success HTTP status.
    Status(u16),
    /// Connection, TLS, timeout or body read failure.
    Transport,
    /// Body arrived but did not have the expected shape.
    Parse,
    /// Region code refused before any request was built.
    Region,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub source: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn status(source: impl Into<String>, status: u16) -> Self {
        Self {
            source: source.into(),
            kind: FetchErrorKind::Status(status),
            message: format!("upstream answered HTTP {status}"),
        }
    }

    pub fn transport(source: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            source: source.into(),
            kind: FetchErrorKind::Transport,
            message: message.to_string(),
        }
    }

    pub fn parse(source: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            source: source.into(),
            kind: FetchErrorKind::Parse,
            message: message.to_string(),
        }
    }

    pub fn region(source: impl Into<String>, region: &str) -> Self {
        Self {
            source: source.into(),
            kind: FetchErrorKind::Region,
            message: format!("region {region:?} is not a plain region code"),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FetchErrorKind::Status(code) => {
                write!(f, "fetch from {} failed with HTTP {code}", self.source)
            }
            FetchErrorKind::Transport => {
                write!(f, "fetch from {} failed: {}", self.source, self.message)
            }
            FetchErrorKind::Parse => {
                write!(f, "could not parse {} response: {}", self.source, self.message)
            }
            FetchErrorKind::Region => {
                write!(f, "fetch from {} refused: {}", self.source, self.message)
            }
        }
    }
}

impl Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Oracle reply could not be read as the expected shape.
    Parse { message: String, excerpt: String },
    /// Oracle could not be reached or refused the request.
    Oracle { provider: String, message: String },
}

impl ClassifyError {
    pub fn parse(message: impl Into<String>, reply: &str) -> Self {
        Self::Parse {
            message: message.into(),
            excerpt: excerpt(reply, 120),
        }
    }
}

impl fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifyError::Parse { message, excerpt } => {
                write!(f, "classification reply unparsable: {message} (reply: {excerpt:?})")
            }
            ClassifyError::Oracle { provider, message } => {
                write!(f, "oracle {provider} failed: {message}")
            }
        }
    }
}

impl Error for ClassifyError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeError {
    pub message: String,
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interest-over-time query failed: {}", self.message)
    }
}

impl Error for VolumeError {}

/// Informational outcome: the run finished but produced nothing to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyResultWarning {
    NoTrends,
    NoClassifiedTerms,
    NoInterestData,
}

impl EmptyResultWarning {
    pub fn message(self) -> &'static str {
        match self {
            EmptyResultWarning::NoTrends => "No trending topics found.",
            EmptyResultWarning::NoClassifiedTerms => {
                "No topics matched the selected categories."
            }
            EmptyResultWarning::NoInterestData => "No interest-over-time data returned.",
        }
    }
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    Fetch(FetchError),
    Classify(ClassifyError),
    Volume(VolumeError),
}

impl PipelineError {
    /// Stage name used in logs and API error bodies.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Classify(_) => "classify",
            PipelineError::Volume(_) => "volume",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Fetch(e) => e.fmt(f),
            PipelineError::Classify(e) => e.fmt(f),
            PipelineError::Volume(e) => e.fmt(f),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Fetch(e) => Some(e),
            PipelineError::Classify(e) => Some(e),
            PipelineError::Volume(e) => Some(e),
        }
    }
}

impl From<FetchError> for PipelineError {
    fn from(e: FetchError) -> Self {
        PipelineError::Fetch(e)
    }
}

impl From<ClassifyError> for PipelineError {
    fn from(e: ClassifyError) -> Self {
        PipelineError::Classify(e)
    }
}

impl From<VolumeError> for PipelineError {
    fn from(e: VolumeError) -> Self {
        PipelineError::Volume(e)
    }
}

fn excerpt(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_keeps_short_excerpt() {
        let long = "x".repeat(500);
        match ClassifyError::parse("not json", &long) {
            ClassifyError::Parse { excerpt, .. } => {
                assert_eq!(excerpt.chars().count(), 123);
                assert!(excerpt.ends_with("..."));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pipeline_error_reports_stage() {
        let e: PipelineError = FetchError::status("rss:daily", 503).into();
        assert_eq!(e.stage(), "fetch");
        assert_eq!(e.to_string(), "fetch from rss:daily failed with HTTP 503");
    }
}
