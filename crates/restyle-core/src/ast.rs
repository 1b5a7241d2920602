/// Output bucket for a migrated block.
///
/// Multi-selector rules resolve to a single category and move as one unit;
/// a rule is never split across buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
    DetailView,
    ListingView,
    #[default]
    General,
}

impl Category {
    pub fn bucket_name(self) -> &'static str {
        match self {
            Category::DetailView => "detail-view",
            Category::ListingView => "listing-view",
            Category::General => "general",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Comment,
    Rule,
    AtRule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockBody {
    Text(String),
    Nested(Vec<StyleBlock>),
}

/// One top-level unit of a tokenized stylesheet.
///
/// For `Rule` and `AtRule` every opening brace is matched by a closing brace
/// within the block's own span unless `unterminated` is set, in which case
/// the deficit is left for the repair pass rather than silently closed here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    pub kind: BlockKind,
    /// Selector text for a rule, or the full at-rule header (`@media ...`).
    /// `None` for comments and ticket-delimited regions.
    pub selector: Option<String>,
    pub body: BlockBody,
    /// Comment lines immediately preceding the opening brace travel with
    /// their rule so ticket/ownership annotations stay attached.
    pub leading_comment: Option<String>,
    /// Text of the ticket annotation bracketing this block, if any.
    pub ticket: Option<String>,
    pub category: Category,
    pub unterminated: bool,
}

impl StyleBlock {
    pub fn comment(text: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Comment,
            selector: None,
            body: BlockBody::Text(text.into()),
            leading_comment: None,
            ticket: None,
            category: Category::General,
            unterminated: false,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut String) {
        if let Some(comment) = &self.leading_comment {
            out.push_str(comment);
            if !comment.ends_with('\n') {
                out.push('\n');
            }
        }
        match (&self.selector, &self.body) {
            (None, BlockBody::Text(text)) => {
                out.push_str(text);
                if !text.ends_with('\n') {
                    out.push('\n');
                }
            }
            (None, BlockBody::Nested(children)) => {
                for child in children {
                    child.render_into(out);
                }
            }
            (Some(selector), body) => {
                out.push_str(selector);
                out.push_str(" {\n");
                match body {
                    BlockBody::Text(text) => {
                        out.push_str(text);
                        if !text.is_empty() && !text.ends_with('\n') {
                            out.push('\n');
                        }
                    }
                    BlockBody::Nested(children) => {
                        for child in children {
                            child.render_into(out);
                        }
                    }
                }
                if !self.unterminated {
                    out.push_str("}\n");
                }
            }
        }
    }
}

pub fn render_blocks(blocks: &[StyleBlock]) -> String {
    let mut out = String::new();
    for block in blocks {
        block.render_into(&mut out);
    }
    out
}
