use tracing::warn;

use crate::ast::{render_blocks, BlockBody, BlockKind, StyleBlock};
use crate::context::{classify_identifiers, comment_spans, matching_paren, IdentContext};
use crate::error::{Warning, WarningKind};
use crate::mixins::MixinRegistry;

#[derive(Debug, Default)]
pub struct RewriteOutcome {
    /// Mixin names whose invocations were left untouched.
    pub unconverted: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Result of attempting to expand one `@include` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixinOutcome {
    Expanded(String),
    /// Unknown name or arity mismatch; the raw invocation passes through.
    Unsupported { name: String, raw: String },
}

/// Rewrite every block body in place: themeable `$name` references become
/// `var(--name)`, `$name:` definitions become `--name:` declarations, and
/// recognized mixin invocations are replaced by their expansions.
pub fn rewrite_blocks(blocks: &mut Vec<StyleBlock>, registry: &MixinRegistry) -> RewriteOutcome {
    let mut outcome = RewriteOutcome::default();
    rewrite_level(blocks, registry, true, &mut outcome);
    outcome
}

fn rewrite_level(
    blocks: &mut Vec<StyleBlock>,
    registry: &MixinRegistry,
    top_level: bool,
    outcome: &mut RewriteOutcome,
) {
    for block in blocks.iter_mut() {
        if block.kind == BlockKind::Comment {
            continue;
        }
        match &mut block.body {
            BlockBody::Text(text) => {
                *text = rewrite_text(text, registry, outcome);
            }
            BlockBody::Nested(children) => {
                rewrite_level(children, registry, false, outcome);
            }
        }
        expand_block_invocation(block, registry, outcome);
        if top_level {
            wrap_top_level_definition(block);
        }
    }
}

/// A mixin invocation with a trailing content block tokenizes as its own
/// block (`@include name(args)` header). Replace the whole block with the
/// expansion, handing the body to the handler as `inner`.
fn expand_block_invocation(
    block: &mut StyleBlock,
    registry: &MixinRegistry,
    outcome: &mut RewriteOutcome,
) {
    let Some(selector) = block.selector.as_deref() else {
        return;
    };
    if !selector.starts_with("@include") {
        return;
    }
    let selector = rewrite_variables(selector);
    let Some((name, args)) = parse_invocation_head(selector.trim_start_matches("@include")) else {
        return;
    };
    let inner = match &block.body {
        BlockBody::Text(text) => text.clone(),
        BlockBody::Nested(children) => render_blocks(children),
    };
    match registry.expand(&name, &args, Some(&inner)) {
        Some(expansion) => {
            block.kind = if expansion.trim_start().starts_with('@') {
                BlockKind::AtRule
            } else {
                BlockKind::Rule
            };
            block.selector = None;
            block.body = BlockBody::Text(expansion);
        }
        None => record_unsupported(&name, &selector, outcome),
    }
}

/// Top-level `$name: value;` statements become `:root` custom-property
/// rules once rewritten; mid-rule definitions stay bare declarations.
fn wrap_top_level_definition(block: &mut StyleBlock) {
    if block.selector.is_some() || block.kind != BlockKind::Rule {
        return;
    }
    if let BlockBody::Text(text) = &mut block.body {
        if text.starts_with("--") {
            let indented = format!("  {}", text.trim());
            block.selector = Some(":root".to_string());
            *text = indented;
        }
    }
}

fn rewrite_text(text: &str, registry: &MixinRegistry, outcome: &mut RewriteOutcome) -> String {
    let text = rewrite_variables(text);
    rewrite_includes(&text, registry, outcome)
}

fn rewrite_variables(text: &str) -> String {
    let occurrences = classify_identifiers(text);
    let mut out = text.to_string();
    for occ in occurrences.iter().rev() {
        if occ.context != IdentContext::ThemeValue {
            continue;
        }
        let after = text[occ.span.end..].trim_start();
        if after.starts_with(':') && !after.starts_with("::") {
            // Definition. Map and list values have no custom-property
            // equivalent; those statements pass through untouched.
            let value = after[1..].trim_start();
            if value.starts_with('(') {
                continue;
            }
            out.replace_range(occ.span.clone(), &format!("--{}", occ.name));
        } else {
            out.replace_range(occ.span.clone(), &format!("var(--{})", occ.name));
        }
    }
    out
}

fn rewrite_includes(text: &str, registry: &MixinRegistry, outcome: &mut RewriteOutcome) -> String {
    let comments = comment_spans(text);
    let mut out = String::new();
    let mut pos = 0;
    while let Some(found) = text[pos..].find("@include") {
        let start = pos + found;
        out.push_str(&text[pos..start]);
        if comments.iter().any(|span| span.contains(&start)) {
            out.push_str("@include");
            pos = start + "@include".len();
            continue;
        }
        let (result, end) = expand_at(text, start, registry);
        match result {
            MixinOutcome::Expanded(expansion) => out.push_str(&expansion),
            MixinOutcome::Unsupported { name, raw } => {
                out.push_str(&raw);
                if !name.is_empty() {
                    record_unsupported(&name, &raw, outcome);
                }
            }
        }
        pos = end;
    }
    out.push_str(&text[pos..]);
    out
}

fn record_unsupported(name: &str, raw: &str, outcome: &mut RewriteOutcome) {
    warn!(mixin = name, "unsupported mixin left unconverted");
    outcome.unconverted.push(name.to_string());
    outcome.warnings.push(Warning::new(
        WarningKind::UnknownMixin,
        format!("mixin '{}' left unconverted: {}", name, raw.trim()),
    ));
}

struct Invocation {
    name: String,
    args: Vec<String>,
    inner: Option<String>,
    end: usize,
}

/// Expand the invocation starting at `start` (which points at `@include`).
/// Returns the outcome and the index just past the invocation.
fn expand_at(text: &str, start: usize, registry: &MixinRegistry) -> (MixinOutcome, usize) {
    let Some(invocation) = parse_invocation(text, start) else {
        // Not followed by a name; emit the keyword verbatim.
        let end = start + "@include".len();
        return (
            MixinOutcome::Unsupported {
                name: String::new(),
                raw: text[start..end].to_string(),
            },
            end,
        );
    };
    let raw = text[start..invocation.end].to_string();
    match registry.expand(&invocation.name, &invocation.args, invocation.inner.as_deref()) {
        Some(expansion) => (MixinOutcome::Expanded(expansion), invocation.end),
        None => (
            MixinOutcome::Unsupported {
                name: invocation.name,
                raw,
            },
            invocation.end,
        ),
    }
}

fn parse_invocation(text: &str, start: usize) -> Option<Invocation> {
    let mut i = start + "@include".len();
    let bytes = text.as_bytes();
    let len = bytes.len();
    while i < len && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let name_start = i;
    while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-' || bytes[i] == b'_') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    let name = text[name_start..i].to_string();

    let mut args = Vec::new();
    while i < len && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if i < len && bytes[i] == b'(' {
        let close = matching_paren(text, i)?;
        args = split_arguments(&text[i + 1..close - 1]);
        i = close;
    }
    while i < len && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    let mut inner = None;
    if i < len && bytes[i] == b';' {
        i += 1;
    } else if i < len && bytes[i] == b'{' {
        let (body, after) = scan_braced(text, i);
        inner = Some(body);
        i = after;
    }

    Some(Invocation {
        name,
        args,
        inner,
        end: i,
    })
}

fn scan_braced(text: &str, open: usize) -> (String, usize) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut depth = 0usize;
    let mut in_string: Option<u8> = None;
    let mut i = open;
    while i < len {
        let b = bytes[i];
        if let Some(quote) = in_string {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == quote {
                in_string = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => in_string = Some(b),
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let body = text[open + 1..i].trim().to_string();
                    return (body, i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    (text[open + 1..].trim().to_string(), len)
}

fn parse_invocation_head(rest: &str) -> Option<(String, Vec<String>)> {
    let rest = rest.trim_start();
    let name_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    if name_end == 0 {
        return None;
    }
    let name = rest[..name_end].to_string();
    let tail = rest[name_end..].trim_start();
    let args = if tail.starts_with('(') {
        match matching_paren(tail, 0) {
            Some(close) => split_arguments(&tail[1..close - 1]),
            None => split_arguments(tail.trim_start_matches('(').trim_end_matches(')')),
        }
    } else {
        Vec::new()
    };
    Some((name, args))
}

/// Split an argument list on top-level commas; an argument may itself
/// contain function calls or parenthesized maps.
fn split_arguments(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(text[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() {
        args.push(last.to_string());
    }
    args.retain(|arg| !arg.is_empty());
    args
}
