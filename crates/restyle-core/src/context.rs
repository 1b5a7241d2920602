use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

/// How a `$identifier` occurrence is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentContext {
    /// A design-token value in declaration position; candidate for
    /// rewriting to a custom-property reference.
    ThemeValue,
    /// Parameterizes a mixin, loop, map or non-color function call and has
    /// no standalone run-time CSS meaning. Never rewritten.
    StructuralParam,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierOccurrence {
    pub name: String,
    pub context: IdentContext,
    pub span: Range<usize>,
}

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_-]*").unwrap());
static DEFINITION_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(mixin|function)\s+[A-Za-z_][A-Za-z0-9_-]*\s*\(").unwrap());
static CONTROL_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(each|for|while|if|else\s+if)\b").unwrap());

/// SCSS built-ins whose arguments stay meaningful when handed a custom
/// property reference; everything else parenthesized is structural.
const COLOR_FUNCTIONS: &[&str] = &[
    "rgb", "rgba", "hsl", "hsla", "darken", "lighten", "mix", "tint", "shade", "saturate",
    "desaturate", "fade-in", "fade-out", "fadein", "fadeout",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// `rgba(...)`, `darken(...)` and friends.
    Color,
    /// Argument list of an `@include` invocation.
    Include,
    /// Plain parenthesized group with no call name.
    Bare,
    /// Any other function call, including the `map-*` built-ins.
    Other,
}

/// Label every `$identifier` occurrence in `text`.
pub fn classify_identifiers(text: &str) -> Vec<IdentifierOccurrence> {
    let structural = structural_spans(text);
    IDENT
        .find_iter(text)
        .map(|m| IdentifierOccurrence {
            name: text[m.start() + 1..m.end()].to_string(),
            context: classify_at(text, m.start(), m.end(), &structural),
            span: m.start()..m.end(),
        })
        .collect()
}

fn classify_at(
    text: &str,
    start: usize,
    end: usize,
    structural: &[Range<usize>],
) -> IdentContext {
    if structural.iter().any(|span| span.contains(&start)) {
        return IdentContext::StructuralParam;
    }

    let rest = text[end..].trim_start();
    let keyed = rest.starts_with(':') && !rest.starts_with("::");

    match call_context(text, start) {
        Some(CallKind::Other) => IdentContext::StructuralParam,
        Some(CallKind::Include) | Some(CallKind::Color) => {
            // `$name:` here is a keyword argument, not a value.
            if keyed {
                IdentContext::StructuralParam
            } else {
                IdentContext::ThemeValue
            }
        }
        Some(CallKind::Bare) => {
            if keyed {
                // Map literal key.
                IdentContext::StructuralParam
            } else {
                declaration_position(text, start, keyed)
            }
        }
        None => declaration_position(text, start, keyed),
    }
}

/// ThemeValue when the occurrence sits in `property: value` position or
/// opens a `$name: value;` definition; structural otherwise.
fn declaration_position(text: &str, start: usize, keyed: bool) -> IdentContext {
    let stmt_start = text[..start]
        .rfind([';', '{', '}'])
        .map(|i| i + 1)
        .unwrap_or(0);
    let stmt_head = &text[stmt_start..start];
    if stmt_head.contains(':') || keyed {
        IdentContext::ThemeValue
    } else {
        IdentContext::StructuralParam
    }
}

fn call_context(text: &str, pos: usize) -> Option<CallKind> {
    let bytes = text.as_bytes();
    let mut stack = Vec::new();
    let mut i = 0;
    while i < pos {
        match bytes[i] {
            b'(' => stack.push(call_kind(text, i)),
            b')' => {
                stack.pop();
            }
            _ => {}
        }
        i += 1;
    }
    stack.last().copied()
}

fn call_kind(text: &str, open: usize) -> CallKind {
    let head = text[..open].trim_end();
    let name_start = head
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &head[name_start..];
    if name.is_empty() {
        return CallKind::Bare;
    }
    if COLOR_FUNCTIONS.contains(&name.to_ascii_lowercase().as_str()) {
        return CallKind::Color;
    }
    if head[..name_start].trim_end().ends_with("@include") {
        return CallKind::Include;
    }
    CallKind::Other
}

/// Byte ranges covered by `/* */` and `//` comments; identifiers and
/// invocations inside them are never rewritten.
pub(crate) fn comment_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let bytes = text.as_bytes();
    let len = text.len();
    let mut i = 0;
    while i < len {
        // Only slice at a '/' byte, which is always a char boundary.
        if bytes[i] == b'/' && i + 1 < len {
            if bytes[i + 1] == b'*' {
                let end = text[i..].find("*/").map(|n| i + n + 2).unwrap_or(len);
                spans.push(i..end);
                i = end;
                continue;
            }
            if bytes[i + 1] == b'/' && (i == 0 || bytes[i - 1] != b':') {
                let end = text[i..].find('\n').map(|n| i + n).unwrap_or(len);
                spans.push(i..end);
                i = end;
                continue;
            }
        }
        i += 1;
    }
    spans
}

/// Byte ranges where every identifier is structural regardless of shape:
/// mixin/function signatures, control-flow headers, interpolation, comments.
fn structural_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = comment_spans(text);

    for m in DEFINITION_HEAD.find_iter(text) {
        let open = m.end() - 1;
        let close = matching_paren(text, open).unwrap_or(text.len());
        spans.push(m.start()..close);
    }

    for m in CONTROL_HEAD.find_iter(text) {
        let end = text[m.end()..]
            .find(['{', ';'])
            .map(|n| m.end() + n)
            .unwrap_or(text.len());
        spans.push(m.start()..end);
    }

    let mut i = 0;
    while let Some(n) = text[i..].find("#{") {
        let start = i + n;
        let end = text[start..]
            .find('}')
            .map(|k| start + k + 1)
            .unwrap_or(text.len());
        spans.push(start..end);
        i = end;
    }

    spans
}

/// Index one past the `)` matching the `(` at `open`, if balanced.
pub(crate) fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
