use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{BlockBody, BlockKind, Category, StyleBlock};
use crate::error::{Warning, WarningKind};

static TICKET_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{5,}").unwrap());
static TICKET_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bstart\b").unwrap());
static TICKET_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bend\b").unwrap());

#[derive(Debug)]
pub struct Tokenized {
    pub blocks: Vec<StyleBlock>,
    pub warnings: Vec<Warning>,
}

/// Split raw stylesheet text into an ordered sequence of top-level blocks.
///
/// Ticket-delimited regions (a comment with a >=5-digit ticket number and the
/// word "start", closed by a later comment with a ticket number and "end")
/// are lifted out whole before brace scanning so their contents are never
/// re-split. Everything else goes through the depth-counting scanner.
pub fn tokenize(input: &str) -> Tokenized {
    let mut warnings = Vec::new();
    let mut blocks = Vec::new();

    let lines: Vec<&str> = input.lines().collect();
    let mut cursor = 0;
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if is_ticket_marker(trimmed, &TICKET_START) {
            let close = (i + 1..lines.len()).find(|&j| is_ticket_marker(lines[j].trim(), &TICKET_END));
            if let Some(j) = close {
                if cursor < i {
                    let chunk = lines[cursor..i].join("\n");
                    blocks.extend(tokenize_chunk(&chunk, &mut warnings));
                }
                blocks.push(StyleBlock {
                    kind: BlockKind::Rule,
                    selector: None,
                    body: BlockBody::Text(lines[i..=j].join("\n")),
                    leading_comment: None,
                    ticket: Some(trimmed.to_string()),
                    category: Category::General,
                    unterminated: false,
                });
                cursor = j + 1;
                i = j + 1;
                continue;
            }
        }
        i += 1;
    }
    if cursor < lines.len() {
        let chunk = lines[cursor..].join("\n");
        blocks.extend(tokenize_chunk(&chunk, &mut warnings));
    }

    Tokenized { blocks, warnings }
}

fn is_ticket_marker(line: &str, word: &Regex) -> bool {
    is_comment_line(line) && TICKET_NUMBER.is_match(line) && word.is_match(line)
}

/// Whether a comment carries a ticket tracking number.
pub(crate) fn has_ticket_number(text: &str) -> bool {
    TICKET_NUMBER.is_match(text)
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//") || line.starts_with("/*")
}

fn tokenize_chunk(text: &str, warnings: &mut Vec<Warning>) -> Vec<StyleBlock> {
    let mut blocks = Vec::new();
    let mut pending_comment: Option<String> = None;
    let len = text.len();
    let mut pos = 0;

    while pos < len {
        let mut newlines = 0;
        while pos < len {
            let b = text.as_bytes()[pos];
            if !b.is_ascii_whitespace() {
                break;
            }
            if b == b'\n' {
                newlines += 1;
            }
            pos += 1;
        }
        // A blank line detaches a buffered comment from whatever follows.
        if newlines >= 2 {
            flush_comment(&mut pending_comment, &mut blocks);
        }
        if pos >= len {
            break;
        }

        if text[pos..].starts_with("//") {
            let end = text[pos..].find('\n').map(|i| pos + i).unwrap_or(len);
            push_comment(&mut pending_comment, &text[pos..end]);
            pos = end;
            continue;
        }
        if text[pos..].starts_with("/*") {
            let end = text[pos..].find("*/").map(|i| pos + i + 2).unwrap_or(len);
            push_comment(&mut pending_comment, &text[pos..end]);
            pos = end;
            continue;
        }

        let (block, next) = scan_block(text, pos, &mut pending_comment, warnings);
        blocks.push(block);
        pos = next;
    }
    flush_comment(&mut pending_comment, &mut blocks);
    blocks
}

fn push_comment(pending: &mut Option<String>, text: &str) {
    match pending {
        Some(buf) => {
            buf.push('\n');
            buf.push_str(text);
        }
        None => *pending = Some(text.to_string()),
    }
}

fn flush_comment(pending: &mut Option<String>, blocks: &mut Vec<StyleBlock>) {
    if let Some(text) = pending.take() {
        blocks.push(StyleBlock::comment(text));
    }
}

/// Scan one rule, at-rule or bare statement starting at `start`.
///
/// Braces are only counted outside strings, comments and `#{...}`
/// interpolation. A `;` at depth zero before any brace ends a bare
/// statement; end of input with positive depth flags the block as
/// unterminated instead of dropping it.
fn scan_block(
    text: &str,
    start: usize,
    pending_comment: &mut Option<String>,
    warnings: &mut Vec<Warning>,
) -> (StyleBlock, usize) {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut depth = 0usize;
    let mut open_idx: Option<usize> = None;
    let mut in_string: Option<u8> = None;
    let mut i = start;

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
            b'"' | b'\'' => {
                in_string = Some(b);
                i += 1;
            }
            // Not a comment when preceded by ':' (protocol part of a URL).
            b'/' if text[i..].starts_with("//") && (i == start || bytes[i - 1] != b':') => {
                i = text[i..].find('\n').map(|n| i + n).unwrap_or(len);
            }
            b'/' if text[i..].starts_with("/*") => {
                i = text[i..].find("*/").map(|n| i + n + 2).unwrap_or(len);
            }
            b'#' if text[i..].starts_with("#{") => {
                i = text[i..].find('}').map(|n| i + n + 1).unwrap_or(len);
            }
            b'{' => {
                if open_idx.is_none() {
                    open_idx = Some(i);
                }
                depth += 1;
                i += 1;
            }
            b'}' => {
                if open_idx.is_none() {
                    // Stray closing brace at top level; keep it so the
                    // repair pass sees the imbalance.
                    return (statement_block(text, start, i + 1, pending_comment), i + 1);
                }
                depth -= 1;
                i += 1;
                if depth == 0 {
                    let open = open_idx.unwrap();
                    let block = braced_block(text, start, open, i - 1, false, pending_comment, warnings);
                    return (block, i);
                }
            }
            b';' if open_idx.is_none() => {
                return (statement_block(text, start, i + 1, pending_comment), i + 1);
            }
            _ => i += 1,
        }
    }

    match open_idx {
        Some(open) => {
            let selector = normalize_selector(&text[start..open]);
            warnings.push(Warning::new(
                WarningKind::UnterminatedBlock,
                format!("block '{}' not closed before end of input", selector),
            ));
            let block = braced_block(text, start, open, len, true, pending_comment, warnings);
            (block, len)
        }
        None => (statement_block(text, start, len, pending_comment), len),
    }
}

fn statement_block(
    text: &str,
    start: usize,
    end: usize,
    pending_comment: &mut Option<String>,
) -> StyleBlock {
    let statement = text[start..end].trim().to_string();
    let kind = if statement.starts_with('@') {
        BlockKind::AtRule
    } else {
        BlockKind::Rule
    };
    StyleBlock {
        kind,
        selector: None,
        body: BlockBody::Text(statement),
        leading_comment: pending_comment.take(),
        ticket: None,
        category: Category::General,
        unterminated: false,
    }
}

fn braced_block(
    text: &str,
    start: usize,
    open: usize,
    close: usize,
    unterminated: bool,
    pending_comment: &mut Option<String>,
    warnings: &mut Vec<Warning>,
) -> StyleBlock {
    let selector = normalize_selector(&text[start..open]);
    let kind = if selector.starts_with('@') {
        BlockKind::AtRule
    } else {
        BlockKind::Rule
    };
    let raw_body = text[open + 1..close]
        .trim_start_matches('\n')
        .trim_end()
        .to_string();

    let body = if !unterminated && contains_block(&raw_body) {
        BlockBody::Nested(tokenize_chunk(&raw_body, warnings))
    } else {
        BlockBody::Text(raw_body)
    };

    StyleBlock {
        kind,
        selector: Some(selector),
        body,
        leading_comment: pending_comment.take(),
        ticket: None,
        category: Category::General,
        unterminated,
    }
}

fn normalize_selector(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the text opens a real nested block, not just `#{...}`
/// interpolation or a brace inside a string.
fn contains_block(body: &str) -> bool {
    let bytes = body.as_bytes();
    let len = bytes.len();
    let mut in_string: Option<u8> = None;
    let mut i = 0;
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
            b'/' if body[i..].starts_with("/*") => {
                i = body[i..].find("*/").map(|n| i + n + 1).unwrap_or(len);
            }
            b'#' if body[i..].starts_with("#{") => {
                i = body[i..].find('}').map(|n| i + n).unwrap_or(len);
            }
            b'{' => return true,
            _ => {}
        }
        i += 1;
    }
    false
}
