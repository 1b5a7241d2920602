use tracing::debug;

use crate::ast::{BlockBody, BlockKind, StyleBlock};
use crate::category::split_fragments;
use crate::error::Warning;
use crate::patterns::CompiledPatterns;

/// Whether a block targets reserved site chrome (header, primary nav,
/// footer) and must be dropped from migration output.
///
/// One matching fragment drops the whole rule. Merged selector/at-rule
/// text from upstream formatting errors still lands here: the chrome
/// keyword is found wherever it sits, and ambiguity defaults to exclusion.
pub fn is_excluded(
    block: &StyleBlock,
    patterns: &CompiledPatterns,
    warnings: &mut Vec<Warning>,
) -> bool {
    if block.kind == BlockKind::Comment {
        return false;
    }
    if let Some(selector) = block.selector.as_deref() {
        let fragments = split_fragments(selector, warnings);
        return fragments.iter().any(|fragment| {
            let hit = patterns.matches_chrome(fragment);
            if hit {
                debug!(fragment, "excluding chrome rule");
            }
            hit
        });
    }
    // A ticket region has no single selector; scan the selector lines of
    // its body so a prose comment mentioning chrome does not drop it.
    if block.ticket.is_some() {
        if let BlockBody::Text(text) = &block.body {
            return selector_lines(text).any(|line| patterns.matches_chrome(line));
        }
    }
    false
}

fn selector_lines(body: &str) -> impl Iterator<Item = &str> {
    body.lines().filter_map(|line| {
        let trimmed = line.trim();
        trimmed
            .strip_suffix('{')
            .map(str::trim)
            .filter(|selector| !selector.is_empty())
    })
}

/// Remove chrome-targeting blocks, recursing into nested at-rule bodies.
/// Returns the surviving blocks and the number removed.
pub fn filter_chrome(
    blocks: Vec<StyleBlock>,
    patterns: &CompiledPatterns,
    warnings: &mut Vec<Warning>,
) -> (Vec<StyleBlock>, usize) {
    let mut kept = Vec::new();
    let mut excluded = 0;
    for mut block in blocks {
        if is_excluded(&block, patterns, warnings) {
            excluded += 1;
            continue;
        }
        if let BlockBody::Nested(children) = &mut block.body {
            let taken = std::mem::take(children);
            let (inner_kept, inner_excluded) = filter_chrome(taken, patterns, warnings);
            excluded += inner_excluded;
            *children = inner_kept;
        }
        kept.push(block);
    }
    (kept, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::DEFAULT_PATTERNS;
    use crate::tokenizer::tokenize;

    fn filter(input: &str) -> (Vec<StyleBlock>, usize) {
        let tokenized = tokenize(input);
        let mut warnings = Vec::new();
        filter_chrome(tokenized.blocks, &DEFAULT_PATTERNS, &mut warnings)
    }

    #[test]
    fn chrome_fragment_drops_whole_rule() {
        // One chrome selector in the comma list excludes the rule even
        // though another fragment is a detail-view match.
        let (kept, excluded) = filter(".navbar-nav, .vdp-price-box { color: red; }");
        assert!(kept.is_empty());
        assert_eq!(excluded, 1);
    }

    #[test]
    fn non_chrome_rules_survive() {
        let (kept, excluded) = filter(".vdp-price { color: red; } .footer-cta { x: y; }");
        assert_eq!(kept.len(), 1);
        assert_eq!(excluded, 1);
        assert_eq!(kept[0].selector.as_deref(), Some(".vdp-price"));
    }

    #[test]
    fn merged_selector_and_media_condition_is_excluded() {
        let (kept, excluded) = filter(".site-header @media (max-width: 768px { color: red; }");
        assert!(kept.is_empty());
        assert_eq!(excluded, 1);
    }

    #[test]
    fn nested_chrome_rule_inside_media_is_removed() {
        let (kept, excluded) =
            filter("@media (min-width: 700px) { .navbar { x: y; } .vdp-tabs { a: b; } }");
        assert_eq!(excluded, 1);
        assert_eq!(kept.len(), 1);
        match &kept[0].body {
            BlockBody::Nested(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].selector.as_deref(), Some(".vdp-tabs"));
            }
            BlockBody::Text(_) => panic!("media body should stay nested"),
        }
    }

    #[test]
    fn ticket_region_selector_lines_checked() {
        let input = "/* 77001 old masthead start */\n.header-bar {\n  color: red;\n}\n/* 77001 end */";
        let (kept, excluded) = filter(input);
        assert!(kept.is_empty());
        assert_eq!(excluded, 1);
    }

    #[test]
    fn ticket_region_prose_mention_does_not_exclude() {
        let input = "/* 77002 fix overlap with header start */\n.vdp-hero {\n  margin-top: 0;\n}\n/* 77002 end */";
        let (kept, excluded) = filter(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn filtering_is_idempotent() {
        let input = ".vdp-price { color: red; } .navbar { x: y; } @media (a) { .footer { b: c; } }";
        let tokenized = tokenize(input);
        let mut warnings = Vec::new();
        let (once, _) = filter_chrome(tokenized.blocks, &DEFAULT_PATTERNS, &mut warnings);
        let (twice, removed_again) = filter_chrome(once.clone(), &DEFAULT_PATTERNS, &mut warnings);
        assert_eq!(once, twice);
        assert_eq!(removed_again, 0);
    }
}
