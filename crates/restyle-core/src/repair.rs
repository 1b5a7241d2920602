use tracing::warn;

use crate::error::{Warning, WarningKind};

#[derive(Debug)]
pub struct Repaired {
    pub text: String,
    pub warnings: Vec<Warning>,
}

/// Best-effort cleanup of already-categorized, already-rewritten text.
///
/// Fixed order: missing statement terminators, then brace balance, then
/// malformed conditional-media syntax and stray symbols. Valid input passes
/// through unchanged.
pub fn repair(text: &str) -> Repaired {
    let mut warnings = Vec::new();

    let text = insert_terminators(text);
    let text = balance_braces(&text, &mut warnings);
    let text = normalize_media(&text);
    let text = strip_stray_symbols(&text);

    let (opens, closes) = brace_counts(&text);
    if opens != closes {
        warn!(opens, closes, "repair pass could not reach brace balance");
        warnings.push(Warning::new(
            WarningKind::UnbalancedOutput,
            format!("{} opening vs {} closing braces after repair", opens, closes),
        ));
    }

    Repaired { text, warnings }
}

/// Append `;` to a bare `property: value` line when the next meaningful
/// line is a closing brace or another declaration.
fn insert_terminators(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        let head = trimmed.trim_start();
        let needs_terminator = is_bare_declaration(head)
            && matches!(
                next_meaningful(&lines[i + 1..]),
                Some(next) if next.starts_with('}') || is_declaration_line(next)
            );
        if needs_terminator {
            out.push(format!("{};", trimmed));
        } else {
            out.push(trimmed.to_string());
        }
    }
    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

fn next_meaningful<'a>(lines: &[&'a str]) -> Option<&'a str> {
    lines.iter().map(|line| line.trim()).find(|line| !line.is_empty())
}

fn is_bare_declaration(line: &str) -> bool {
    if line.is_empty()
        || line.starts_with('@')
        || line.starts_with("//")
        || line.starts_with("/*")
        || line.starts_with('&')
    {
        return false;
    }
    let Some(colon) = line.find(':') else {
        return false;
    };
    let value = line[colon + 1..].trim();
    !value.is_empty()
        && !line.ends_with(';')
        && !line.ends_with('{')
        && !line.ends_with('}')
        && !line.ends_with(',')
}

fn is_declaration_line(line: &str) -> bool {
    line.contains(':') && !line.ends_with('{') && !line.starts_with('@') && !line.starts_with('&')
}

fn balance_braces(text: &str, warnings: &mut Vec<Warning>) -> String {
    let (opens, closes) = brace_counts(text);
    if opens == closes {
        return text.to_string();
    }
    if opens > closes {
        // The common shape: blocks left open at end of input. Close them.
        let deficit = opens - closes;
        let mut out = text.trim_end().to_string();
        for _ in 0..deficit {
            out.push_str("\n}");
        }
        out.push('\n');
        warnings.push(Warning::new(
            WarningKind::UnterminatedBlock,
            format!("appended {} closing brace(s) at end of output", deficit),
        ));
        return out;
    }
    rebuild(text, warnings)
}

/// Excess closing braces: walk the text with a nesting stack, dropping
/// closers at depth zero and closing whatever stays open, then note the
/// repair with a marker comment.
fn rebuild(text: &str, warnings: &mut Vec<Warning>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut dropped = 0usize;
    let mut skip_until = 0usize;
    let mut in_string: Option<char> = None;

    for (i, ch) in text.char_indices() {
        if i < skip_until {
            out.push(ch);
            continue;
        }
        if let Some(quote) = in_string {
            if ch == quote {
                in_string = None;
            }
            out.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' => {
                in_string = Some(ch);
                out.push(ch);
            }
            '/' if text[i..].starts_with("/*") => {
                skip_until = text[i..].find("*/").map(|n| i + n + 2).unwrap_or(text.len());
                out.push(ch);
            }
            '{' => {
                depth += 1;
                out.push(ch);
            }
            '}' => {
                if depth == 0 {
                    dropped += 1;
                } else {
                    depth -= 1;
                    out.push(ch);
                }
            }
            _ => out.push(ch),
        }
    }

    let added = depth;
    let mut out = out.trim_end().to_string();
    for _ in 0..added {
        out.push_str("\n}");
    }
    out.push_str(&format!(
        "\n/* rebalanced braces: {} dropped, {} added */\n",
        dropped, added
    ));
    warnings.push(Warning::new(
        WarningKind::UnterminatedBlock,
        format!("structural rebuild dropped {} and added {} brace(s)", dropped, added),
    ));
    out
}

fn brace_counts(text: &str) -> (usize, usize) {
    let mut opens = 0usize;
    let mut closes = 0usize;
    let mut in_string: Option<char> = None;
    let mut skip_until = 0usize;
    for (i, ch) in text.char_indices() {
        if i < skip_until {
            continue;
        }
        if let Some(quote) = in_string {
            if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '/' if text[i..].starts_with("/*") => {
                skip_until = text[i..].find("*/").map(|n| i + n + 2).unwrap_or(text.len());
            }
            '{' => opens += 1,
            '}' => closes += 1,
            _ => {}
        }
    }
    (opens, closes)
}

/// `@media ((condition)` -> `@media (condition)` when the prelude's
/// parentheses are actually unbalanced; well-formed preludes are left alone.
fn normalize_media(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.lines() {
        if !line.trim_start().starts_with("@media") {
            out.push(line.to_string());
            continue;
        }
        let brace = line.find('{').unwrap_or(line.len());
        let mut prelude = line[..brace].to_string();
        let tail = &line[brace..];
        while paren_surplus(&prelude) > 0 && prelude.contains("((") {
            prelude = prelude.replacen("((", "(", 1);
        }
        out.push(format!("{}{}", prelude, tail));
    }
    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

fn paren_surplus(text: &str) -> usize {
    let opens = text.matches('(').count();
    let closes = text.matches(')').count();
    opens.saturating_sub(closes)
}

/// Drop lines that are nothing but leftover symbols from malformed nesting.
fn strip_stray_symbols(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if matches!(trimmed, ")" | ");" | ";") {
            continue;
        }
        out.push(line);
    }
    let mut joined = out.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_input_is_unchanged() {
        let input = ".a {\n  color: red;\n}\n@media (min-width: 700px) {\n  .b {\n    margin: 0;\n  }\n}\n";
        let repaired = repair(input);
        assert_eq!(repaired.text, input);
        assert!(repaired.warnings.is_empty());
    }

    #[test]
    fn missing_closing_brace_is_appended() {
        let repaired = repair(".x {\n  color: red;\n");
        let (opens, closes) = brace_counts(&repaired.text);
        assert_eq!(opens, closes);
        assert_eq!(repaired.warnings.len(), 1);
        assert_eq!(repaired.warnings[0].kind, WarningKind::UnterminatedBlock);
    }

    #[test]
    fn excess_closing_braces_trigger_rebuild_with_marker() {
        let repaired = repair(".x {\n  color: red;\n}\n}\n");
        let (opens, closes) = brace_counts(&repaired.text);
        assert_eq!(opens, closes);
        assert!(repaired.text.contains("rebalanced braces"));
    }

    #[test]
    fn missing_terminator_before_closing_brace() {
        let repaired = repair(".x {\n  color: red\n}\n");
        assert!(repaired.text.contains("color: red;"));
    }

    #[test]
    fn missing_terminator_between_declarations() {
        let repaired = repair(".x {\n  color: red\n  margin: 0;\n}\n");
        assert!(repaired.text.contains("color: red;"));
    }

    #[test]
    fn selector_lines_do_not_gain_terminators() {
        let repaired = repair(".x:hover {\n  color: red;\n}\n");
        assert!(!repaired.text.contains("hover {;"));
        assert!(!repaired.text.contains(".x:hover;"));
    }

    #[test]
    fn doubled_media_paren_is_collapsed() {
        let repaired = repair("@media ((min-width: 700px) {\n  .a {\n    color: red;\n  }\n}\n");
        assert!(repaired.text.contains("@media (min-width: 700px) {"));
    }

    #[test]
    fn balanced_media_parens_are_left_alone() {
        let input = "@media ((min-width: 700px) and (max-width: 900px)) {\n  .a {\n    color: red;\n  }\n}\n";
        let repaired = repair(input);
        assert!(repaired.text.contains("((min-width: 700px)"));
    }

    #[test]
    fn stray_symbol_lines_are_dropped() {
        let repaired = repair(".a {\n  color: red;\n}\n);\n");
        assert!(!repaired.text.contains(");"));
    }

    #[test]
    fn braces_in_strings_do_not_count() {
        let repaired = repair(".q {\n  content: \"{\";\n}\n");
        assert!(repaired.warnings.is_empty());
        assert!(repaired.text.contains("content: \"{\";"));
    }
}
