use once_cell::sync::Lazy;
use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::Deserialize;

use crate::error::RestyleError;

/// Keyword families driving categorization and chrome exclusion.
///
/// Shipped with compiled-in defaults; a host may deserialize replacements
/// from JSON. Each entry is a case-insensitive regular expression tested
/// against selector fragments (or full block text as a fallback).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Patterns {
    pub detail_view: Vec<String>,
    pub listing_view: Vec<String>,
    pub chrome: Vec<String>,
}

impl Patterns {
    pub fn from_json(json: &str) -> Result<Self, RestyleError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn family(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| (*p).to_string()).collect()
}

impl Default for Patterns {
    fn default() -> Self {
        Self {
            detail_view: family(&[
                r"\.vdp\b",
                r"\bvdp[-_]",
                r"vehicle[-_]?details?",
                r"page-template-vehicle",
                r"\bdetail[-_]page\b",
            ]),
            listing_view: family(&[
                r"\.vrp\b",
                r"\.srp\b",
                r"\bvrp[-_]",
                r"\bsrp[-_]",
                r"inventory[-_]?page",
                r"search[-_]?results",
                r"vehicle[-_]?listings?",
                r"\blisting[-_]page\b",
            ]),
            chrome: family(&[
                r"\bheader\b",
                r"\bnavbar\b",
                r"\bnav\b",
                r"\bfooter\b",
                r"site-header",
                r"site-footer",
                r"\bmegamenu\b",
            ]),
        }
    }
}

/// Pattern families compiled once per engine; shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    detail_view: RegexSet,
    listing_view: RegexSet,
    chrome: RegexSet,
}

impl CompiledPatterns {
    pub fn compile(patterns: &Patterns) -> Result<Self, RestyleError> {
        Ok(Self {
            detail_view: compile_family(&patterns.detail_view)?,
            listing_view: compile_family(&patterns.listing_view)?,
            chrome: compile_family(&patterns.chrome)?,
        })
    }

    pub fn matches_detail_view(&self, text: &str) -> bool {
        self.detail_view.is_match(text)
    }

    pub fn matches_listing_view(&self, text: &str) -> bool {
        self.listing_view.is_match(text)
    }

    pub fn matches_chrome(&self, text: &str) -> bool {
        self.chrome.is_match(text)
    }
}

fn compile_family(patterns: &[String]) -> Result<RegexSet, RestyleError> {
    // Validate one at a time so the failing pattern can be named.
    for pattern in patterns {
        Regex::new(pattern).map_err(|source| RestyleError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .map_err(|source| RestyleError::Pattern {
            pattern: patterns.join(", "),
            source,
        })
}

pub static DEFAULT_PATTERNS: Lazy<CompiledPatterns> = Lazy::new(|| {
    CompiledPatterns::compile(&Patterns::default()).expect("default patterns must compile")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compile() {
        let compiled = CompiledPatterns::compile(&Patterns::default()).unwrap();
        assert!(compiled.matches_detail_view(".vdp-price-box"));
        assert!(compiled.matches_listing_view(".srp .vehicle-card"));
        assert!(compiled.matches_chrome(".navbar-nav"));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let compiled = CompiledPatterns::compile(&Patterns::default()).unwrap();
        assert!(compiled.matches_detail_view(".VDP .price"));
        assert!(compiled.matches_chrome("#Footer"));
    }

    #[test]
    fn word_boundaries_respected() {
        let compiled = CompiledPatterns::compile(&Patterns::default()).unwrap();
        assert!(!compiled.matches_chrome(".navy-theme"));
    }

    #[test]
    fn bad_pattern_is_named() {
        let patterns = Patterns {
            detail_view: vec!["(unclosed".to_string()],
            ..Patterns::default()
        };
        let err = CompiledPatterns::compile(&patterns).unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn deserializes_partial_override() {
        let patterns: Patterns = serde_json::from_str(r#"{"chrome": ["\\bmasthead\\b"]}"#).unwrap();
        assert_eq!(patterns.chrome.len(), 1);
        assert!(!patterns.detail_view.is_empty());
    }
}
