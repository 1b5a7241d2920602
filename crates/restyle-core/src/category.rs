use tracing::debug;

use crate::ast::{Category, StyleBlock};
use crate::error::{Warning, WarningKind};
use crate::patterns::CompiledPatterns;
use crate::tokenizer::has_ticket_number;

/// Assign exactly one category to a block.
///
/// Precedence, first match wins: ticket annotation keywords, then each
/// selector fragment from a top-level comma split, then the block's full
/// text. DetailView always beats ListingView at every step.
pub fn categorize(
    block: &StyleBlock,
    patterns: &CompiledPatterns,
    warnings: &mut Vec<Warning>,
) -> Category {
    if let Some(annotation) = ticket_annotation(block) {
        if patterns.matches_detail_view(annotation) {
            debug!(annotation, "categorized as detail-view by ticket");
            return Category::DetailView;
        }
        if patterns.matches_listing_view(annotation) {
            debug!(annotation, "categorized as listing-view by ticket");
            return Category::ListingView;
        }
    }

    if let Some(selector) = block.selector.as_deref() {
        let fragments = split_fragments(selector, warnings);
        if fragments
            .iter()
            .any(|fragment| patterns.matches_detail_view(fragment))
        {
            return Category::DetailView;
        }
        if fragments
            .iter()
            .any(|fragment| patterns.matches_listing_view(fragment))
        {
            return Category::ListingView;
        }
    }

    let full_text = block.render();
    if patterns.matches_detail_view(&full_text) {
        return Category::DetailView;
    }
    if patterns.matches_listing_view(&full_text) {
        return Category::ListingView;
    }

    Category::General
}

fn ticket_annotation(block: &StyleBlock) -> Option<&str> {
    if let Some(ticket) = block.ticket.as_deref() {
        return Some(ticket);
    }
    block
        .leading_comment
        .as_deref()
        .filter(|comment| has_ticket_number(comment))
}

/// Split a selector list on top-level commas, falling back to the whole
/// text as one fragment when parentheses do not balance.
pub(crate) fn split_fragments<'a>(selector: &'a str, warnings: &mut Vec<Warning>) -> Vec<&'a str> {
    match split_top_level_commas(selector) {
        Ok(fragments) => fragments,
        Err(()) => {
            warnings.push(Warning::new(
                WarningKind::MalformedSelectorList,
                format!("mismatched parentheses in '{}', treated as one selector", selector),
            ));
            vec![selector]
        }
    }
}

/// Commas inside parentheses (`:not(a, b)`) are not split points.
fn split_top_level_commas(text: &str) -> Result<Vec<&str>, ()> {
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(())?,
            ',' if depth == 0 => {
                fragments.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(());
    }
    fragments.push(text[start..].trim());
    fragments.retain(|fragment| !fragment.is_empty());
    Ok(fragments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::DEFAULT_PATTERNS;
    use crate::tokenizer::tokenize;

    fn categorize_first(input: &str) -> Category {
        let tokenized = tokenize(input);
        let mut warnings = Vec::new();
        categorize(&tokenized.blocks[0], &DEFAULT_PATTERNS, &mut warnings)
    }

    #[test]
    fn detail_and_listing_selectors() {
        assert_eq!(categorize_first(".vdp { color: red; }"), Category::DetailView);
        assert_eq!(categorize_first(".vrp { color: blue; }"), Category::ListingView);
        assert_eq!(categorize_first(".sidebar { width: 200px; }"), Category::General);
    }

    #[test]
    fn any_detail_fragment_wins_over_listing() {
        // Exactly one category even when both families match somewhere.
        assert_eq!(
            categorize_first(".srp-filters, .vdp-price-box { color: red; }"),
            Category::DetailView
        );
    }

    #[test]
    fn commas_inside_not_are_not_split_points() {
        let mut warnings = Vec::new();
        let fragments = split_fragments(".a:not(.x, .y), .b", &mut warnings);
        assert_eq!(fragments, vec![".a:not(.x, .y)", ".b"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unbalanced_parens_fall_back_to_one_fragment() {
        let mut warnings = Vec::new();
        let fragments = split_fragments(".a:not(.x, .b", &mut warnings);
        assert_eq!(fragments.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::MalformedSelectorList);
    }

    #[test]
    fn ticket_annotation_overrides_selector() {
        let input = "/* 612044 vehicle-detail gallery start */\n.gallery { display: flex; }\n/* 612044 end */";
        assert_eq!(categorize_first(input), Category::DetailView);
    }

    #[test]
    fn leading_ticket_comment_counts_as_annotation() {
        let input = "/* 90210 search-results tweak */\n.results-grid { display: grid; }";
        assert_eq!(categorize_first(input), Category::ListingView);
    }

    #[test]
    fn full_text_fallback() {
        assert_eq!(
            categorize_first(".hero { background: url(vehicle-detail.jpg); }"),
            Category::DetailView
        );
    }
}
