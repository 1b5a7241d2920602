use std::collections::BTreeMap;

use crate::ast::StyleBlock;

/// Assemble one output string per bucket, preserving input order within
/// each bucket. All three buckets are present even when empty so callers
/// see a stable shape.
pub fn emit_buckets(blocks: &[StyleBlock]) -> BTreeMap<String, String> {
    let mut buckets: BTreeMap<String, String> = BTreeMap::new();
    for name in ["detail-view", "listing-view", "general"] {
        buckets.insert(name.to_string(), String::new());
    }
    for block in blocks {
        let out = buckets
            .entry(block.category.bucket_name().to_string())
            .or_default();
        block.render_into(out);
        out.push('\n');
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Category;
    use crate::tokenizer::tokenize;

    #[test]
    fn blocks_land_in_their_buckets_in_order() {
        let mut tokenized = tokenize(".vdp-a { x: 1; } .plain { y: 2; } .vdp-b { z: 3; }");
        tokenized.blocks[0].category = Category::DetailView;
        tokenized.blocks[2].category = Category::DetailView;
        let buckets = emit_buckets(&tokenized.blocks);
        let detail = &buckets["detail-view"];
        assert!(detail.find(".vdp-a").unwrap() < detail.find(".vdp-b").unwrap());
        assert!(buckets["general"].contains(".plain"));
        assert!(buckets["listing-view"].is_empty());
    }
}
