use std::collections::BTreeMap;

use tracing::debug;

use crate::ast::{BlockKind, Category, StyleBlock};
use crate::category::categorize;
use crate::emitter::emit_buckets;
use crate::error::{RestyleError, Warning, WarningKind};
use crate::exclude::{filter_chrome, is_excluded};
use crate::mixins::MixinRegistry;
use crate::patterns::{CompiledPatterns, Patterns, DEFAULT_PATTERNS};
use crate::repair::repair;
use crate::rewrite::rewrite_blocks;
use crate::tokenizer::tokenize;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Whether chrome-pattern exclusion runs at all.
    pub exclude_chrome: bool,
    /// Brand-specific static payload appended verbatim to the general
    /// bucket, after repair, with no transformation applied.
    pub brand_payload: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            exclude_chrome: true,
            brand_payload: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub detail_view: usize,
    pub listing_view: usize,
    pub general: usize,
}

impl CategoryCounts {
    fn bump(&mut self, category: Category) {
        match category {
            Category::DetailView => self.detail_view += 1,
            Category::ListingView => self.listing_view += 1,
            Category::General => self.general += 1,
        }
    }
}

/// Everything one migration run produces. Counts are per invocation;
/// nothing is accumulated across calls.
#[derive(Debug)]
pub struct MigrationOutput {
    pub buckets: BTreeMap<String, String>,
    pub unconverted_mixins: Vec<String>,
    pub counts: CategoryCounts,
    pub excluded: usize,
    pub warnings: Vec<Warning>,
}

/// The transformation engine. Construction compiles the pattern families
/// and fixes the mixin registry; afterwards the engine is immutable and
/// can be shared by reference across threads.
#[derive(Debug, Clone)]
pub struct Engine {
    registry: MixinRegistry,
    patterns: CompiledPatterns,
}

impl Engine {
    pub fn new(registry: MixinRegistry, patterns: &Patterns) -> Result<Self, RestyleError> {
        Ok(Self {
            registry,
            patterns: CompiledPatterns::compile(patterns)?,
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            registry: MixinRegistry::builtin(),
            patterns: DEFAULT_PATTERNS.clone(),
        }
    }

    /// Run the full pipeline: tokenize, categorize, exclude, rewrite,
    /// repair, emit. Never fails on malformed input; everything
    /// recoverable lands in `warnings`.
    pub fn migrate(&self, input: &str, options: &EngineOptions) -> MigrationOutput {
        let tokenized = tokenize(input);
        let mut blocks = tokenized.blocks;
        let mut warnings = tokenized.warnings;

        for block in &mut blocks {
            block.category = categorize(block, &self.patterns, &mut warnings);
        }

        let mut excluded = 0;
        if options.exclude_chrome {
            note_ambiguous(&blocks, &self.patterns, &mut warnings);
            let (kept, dropped) = filter_chrome(blocks, &self.patterns, &mut warnings);
            blocks = kept;
            excluded = dropped;
        }

        let rewrite_outcome = rewrite_blocks(&mut blocks, &self.registry);
        warnings.extend(rewrite_outcome.warnings);

        let mut counts = CategoryCounts::default();
        for block in &blocks {
            if block.kind != BlockKind::Comment {
                counts.bump(block.category);
            }
        }

        let mut buckets = emit_buckets(&blocks);
        for (name, text) in buckets.iter_mut() {
            let repaired = repair(text);
            debug!(bucket = name.as_str(), bytes = repaired.text.len(), "bucket assembled");
            *text = repaired.text;
            warnings.extend(repaired.warnings);
        }

        if let Some(payload) = options.brand_payload.as_deref() {
            let general = buckets
                .entry(Category::General.bucket_name().to_string())
                .or_default();
            if !general.is_empty() && !general.ends_with('\n') {
                general.push('\n');
            }
            general.push_str(payload);
        }

        MigrationOutput {
            buckets,
            unconverted_mixins: rewrite_outcome.unconverted,
            counts,
            excluded,
            warnings,
        }
    }
}

/// A rule matching both a chrome pattern and a migration category is about
/// to be dropped; surface that as an informational note.
fn note_ambiguous(blocks: &[StyleBlock], patterns: &CompiledPatterns, warnings: &mut Vec<Warning>) {
    let mut scratch = Vec::new();
    for block in blocks {
        if block.category != Category::General && is_excluded(block, patterns, &mut scratch) {
            warnings.push(Warning::new(
                WarningKind::AmbiguousCategory,
                format!(
                    "rule '{}' matched {} but targets site chrome; excluded",
                    block.selector.as_deref().unwrap_or("<no selector>"),
                    block.category.bucket_name()
                ),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrate(input: &str) -> MigrationOutput {
        Engine::with_defaults().migrate(input, &EngineOptions::default())
    }

    #[test]
    fn detail_and_listing_rules_split_into_buckets() {
        let output = migrate(".vdp { color: red; } .vrp { color: blue; }");
        assert!(output.buckets["detail-view"].contains(".vdp"));
        assert!(output.buckets["listing-view"].contains(".vrp"));
        assert_eq!(output.excluded, 0);
        assert_eq!(output.counts.detail_view, 1);
        assert_eq!(output.counts.listing_view, 1);
        assert_eq!(output.counts.general, 0);
    }

    #[test]
    fn chrome_match_excludes_despite_detail_category() {
        let output = migrate(".navbar-nav, .vdp-price-box { color: red; }");
        assert_eq!(output.excluded, 1);
        for bucket in output.buckets.values() {
            assert!(!bucket.contains(".vdp-price-box"));
        }
        assert!(output
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::AmbiguousCategory));
    }

    #[test]
    fn exclusion_can_be_disabled() {
        let options = EngineOptions {
            exclude_chrome: false,
            ..EngineOptions::default()
        };
        let output = Engine::with_defaults().migrate(".navbar { color: red; }", &options);
        assert_eq!(output.excluded, 0);
        assert!(output.buckets["general"].contains(".navbar"));
    }

    #[test]
    fn include_expansion_leaves_no_invocation_syntax() {
        let output = migrate(".btn { @include border-radius(5px); }");
        assert!(output.buckets["general"].contains("border-radius: 5px;"));
        assert!(!output.buckets["general"].contains("@include"));
        assert!(output.unconverted_mixins.is_empty());
    }

    #[test]
    fn unbalanced_input_is_repaired_and_noted() {
        let output = migrate(".x { color: red;");
        for bucket in output.buckets.values() {
            assert_eq!(bucket.matches('{').count(), bucket.matches('}').count());
        }
        assert!(output
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::UnterminatedBlock));
    }

    #[test]
    fn every_rule_gets_exactly_one_category() {
        let output = migrate(
            ".vdp-hero, .srp-grid { a: b; } .plain { c: d; } @media (x) { .vrp-note { e: f; } }",
        );
        let total = output.counts.detail_view + output.counts.listing_view + output.counts.general;
        assert_eq!(total, 3);
        // DetailView wins over the listing match in the same rule.
        assert_eq!(output.counts.detail_view, 1);
    }

    #[test]
    fn brand_payload_is_appended_verbatim() {
        let options = EngineOptions {
            brand_payload: Some(".brand-footer { color: $unrewritten; }".to_string()),
            ..EngineOptions::default()
        };
        let output = Engine::with_defaults().migrate(".a { x: y; }", &options);
        assert!(output.buckets["general"].contains("color: $unrewritten;"));
    }

    #[test]
    fn malformed_block_does_not_stop_later_rules() {
        let output = migrate(".broken { color: red;\n.vdp-after { margin: 0; }");
        // The unterminated block swallows the rest of the text but nothing
        // is dropped: the detail-view selector is still present in output.
        let all: String = output.buckets.values().cloned().collect();
        assert!(all.contains(".vdp-after"));
        assert!(all.contains("color: red;"));
    }
}
