//! Brace Expansion
//!
//! `{a,b,c}` alternation and `{1..10}` / `{a..e}` / `{1..10..2}` ranges on
//! unquoted literal text. Runs before every other expansion stage.

use crate::ast::types::{Quoting, WordNode, WordPart, WordPartKind};

/// Maximum results of one brace expression
const MAX_BRACE_RESULTS: usize = 10_000;

/// Expand braces in a word. A word without brace expressions is returned
/// unchanged as the only element.
pub fn expand_word_braces(word: &WordNode) -> Vec<WordNode> {
    let mut results: Vec<Vec<WordPart>> = vec![Vec::new()];
    let mut expanded = false;
    for part in &word.parts {
        let alternatives = match (&part.kind, part.quoting) {
            (WordPartKind::Literal(text), Quoting::Unquoted) if text.contains('{') => {
                let alts = expand_braces(text);
                if alts.len() == 1 && alts[0] == *text {
                    None
                } else {
                    Some(alts)
                }
            }
            _ => None,
        };
        match alternatives {
            None => results.iter_mut().for_each(|r| r.push(part.clone())),
            Some(alts) => {
                expanded = true;
                let mut next = Vec::with_capacity(results.len() * alts.len());
                for prefix in &results {
                    for alt in &alts {
                        let mut parts = prefix.clone();
                        parts.push(WordPart::literal(alt, Quoting::Unquoted));
                        next.push(parts);
                    }
                }
                next.truncate(MAX_BRACE_RESULTS);
                results = next;
            }
        }
    }
    if !expanded {
        return vec![word.clone()];
    }
    results
        .into_iter()
        .map(|parts| WordNode::new(parts, word.source.clone()))
        .collect()
}

/// Expand every brace expression in unquoted text.
pub fn expand_braces(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();
    let mut search = 0;
    while let Some(offset) = text[search..].find('{') {
        let open = search + offset;
        let Some(close) = find_close(bytes, open) else {
            break;
        };
        let body = &text[open + 1..close];
        if let Some(alternatives) = brace_alternatives(body) {
            let prefix = &text[..open];
            let suffixes = expand_braces(&text[close + 1..]);
            let mut out = Vec::new();
            for alt in alternatives {
                for alt_expanded in expand_braces(&alt) {
                    for suffix in &suffixes {
                        if out.len() >= MAX_BRACE_RESULTS {
                            return out;
                        }
                        out.push(format!("{}{}{}", prefix, alt_expanded, suffix));
                    }
                }
            }
            return out;
        }
        search = open + 1;
    }
    vec![text.to_string()]
}

fn find_close(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Alternatives of a brace body, or `None` if it is not a brace expression.
fn brace_alternatives(body: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(body[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if !parts.is_empty() {
        parts.push(body[start..].to_string());
        return Some(parts);
    }
    expand_range(body)
}

fn expand_range(body: &str) -> Option<Vec<String>> {
    let pieces: Vec<&str> = body.split("..").collect();
    let (start, end, step) = match pieces.as_slice() {
        [start, end] => (*start, *end, None),
        [start, end, step] => (*start, *end, Some(step.parse::<i64>().ok()?)),
        _ => return None,
    };

    if let (Ok(a), Ok(b)) = (start.parse::<i64>(), end.parse::<i64>()) {
        let width = pad_width(start).max(pad_width(end));
        let values = stepped(a, b, step)?;
        return Some(
            values
                .into_iter()
                .map(|n| {
                    if width > 0 {
                        let digits = format!("{:0>width$}", n.unsigned_abs(), width = width);
                        if n < 0 { format!("-{}", digits) } else { digits }
                    } else {
                        n.to_string()
                    }
                })
                .collect(),
        );
    }

    let mut a = start.chars();
    let mut b = end.chars();
    match (a.next(), a.next(), b.next(), b.next()) {
        (Some(a), None, Some(b), None) if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
            let values = stepped(a as i64, b as i64, step)?;
            Some(values.into_iter().filter_map(|n| char::from_u32(n as u32)).map(String::from).collect())
        }
        _ => None,
    }
}

/// Zero-padding width implied by a leading zero (`01`, `-007`).
fn pad_width(s: &str) -> usize {
    let digits = s.trim_start_matches('-');
    if digits.len() > 1 && digits.starts_with('0') {
        digits.len()
    } else {
        0
    }
}

/// Inclusive range in the natural direction; the step's sign is ignored.
fn stepped(start: i64, end: i64, step: Option<i64>) -> Option<Vec<i64>> {
    let step = step.map(i64::unsigned_abs).filter(|s| *s > 0).unwrap_or(1);
    let count = start.abs_diff(end) / step + 1;
    if count > MAX_BRACE_RESULTS as u64 {
        return None;
    }
    let step = step as i64;
    Some(
        (0..count as i64)
            .map(|k| if start <= end { start + k * step } else { start - k * step })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternation() {
        assert_eq!(expand_braces("a{b,c}d"), vec!["abd", "acd"]);
        assert_eq!(expand_braces("{x,y}{1,2}"), vec!["x1", "x2", "y1", "y2"]);
        assert_eq!(expand_braces("{a,{b,c}}"), vec!["a", "b", "c"]);
        assert_eq!(expand_braces("pre{,s}"), vec!["pre", "pres"]);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(expand_braces("{1..4}"), vec!["1", "2", "3", "4"]);
        assert_eq!(expand_braces("{3..1}"), vec!["3", "2", "1"]);
        assert_eq!(expand_braces("{1..10..4}"), vec!["1", "5", "9"]);
        assert_eq!(expand_braces("{01..03}"), vec!["01", "02", "03"]);
        assert_eq!(expand_braces("{a..c}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_not_brace_expressions() {
        assert_eq!(expand_braces("{}"), vec!["{}"]);
        assert_eq!(expand_braces("{abc}"), vec!["{abc}"]);
        assert_eq!(expand_braces("{a,b"), vec!["{a,b"]);
        assert_eq!(expand_braces("{1..x}"), vec!["{1..x}"]);
    }

    #[test]
    fn test_word_level_expansion_keeps_other_parts() {
        let word = WordNode::new(
            vec![
                WordPart::literal("f{1,2}", Quoting::Unquoted),
                WordPart::literal("{x,y}", Quoting::SingleQuoted),
            ],
            "f{1,2}'{x,y}'",
        );
        let words = expand_word_braces(&word);
        assert_eq!(words.len(), 2);
        assert_eq!(words[1].parts[1], WordPart::literal("{x,y}", Quoting::SingleQuoted));
    }
}
