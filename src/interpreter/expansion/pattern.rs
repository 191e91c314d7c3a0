//! Pattern Matching
//!
//! Shell wildcard patterns (`*`, `?`, `[...]`) used by `case`, the
//! `${var#pattern}` family and `${var/pattern/replacement}`.
//!
//! Patterns reach this module as text in which characters that were quoted
//! in the source are preceded by a backslash, so `"*"` matches a literal
//! star while an unquoted `*` is a wildcard.

use std::collections::HashMap;

use regex_lite::Regex;

use crate::ast::types::PatternRemovalSide;

lazy_static::lazy_static! {
    /// Valid POSIX character class names
    static ref POSIX_CLASSES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("alnum", "a-zA-Z0-9");
        m.insert("alpha", "a-zA-Z");
        m.insert("blank", " \\t");
        m.insert("cntrl", "\\x00-\\x1F\\x7F");
        m.insert("digit", "0-9");
        m.insert("graph", "!-~");
        m.insert("lower", "a-z");
        m.insert("print", " -~");
        m.insert("punct", "!-/:-@\\[-`{-~");
        m.insert("space", " \\t\\n\\r\\f\\v");
        m.insert("upper", "A-Z");
        m.insert("xdigit", "0-9A-Fa-f");
        m
    };
}

const GLOB_SPECIAL: &[char] = &['*', '?', '[', ']', '\\'];

/// Backslash-escape every wildcard character in literal text.
pub fn escape_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if GLOB_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Remove pattern escapes, yielding the literal text.
pub fn unescape_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            _ => out.push(c),
        }
    }
    out
}

/// True if the pattern contains an unescaped wildcard.
pub fn has_glob_chars(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '*' | '?' => return true,
            '[' if chars.clone().any(|c| c == ']') => return true,
            _ => {}
        }
    }
    false
}

/// Rewrite escapes into the bracket form understood by the `glob` crate.
pub fn to_glob_syntax(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('*' | '?' | '[' | ']')) => {
                out.push('[');
                out.push(next);
                out.push(']');
            }
            Some(next) => out.push(next),
            None => out.push('\\'),
        }
    }
    out
}

/// Convert a shell pattern to a regex string (unanchored).
pub fn pattern_to_regex(pattern: &str, greedy: bool) -> String {
    let mut regex = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                match chars.get(i + 1) {
                    Some(next) => push_literal(&mut regex, *next),
                    None => regex.push_str("\\\\"),
                }
                i += 2;
            }
            '*' => {
                regex.push_str(if greedy { ".*" } else { ".*?" });
                i += 1;
            }
            '?' => {
                regex.push('.');
                i += 1;
            }
            '[' => match find_char_class_end(&chars, i) {
                Some(end) => {
                    let content: String = chars[i + 1..end].iter().collect();
                    regex.push_str(&convert_char_class(&content));
                    i = end + 1;
                }
                None => {
                    regex.push_str("\\[");
                    i += 1;
                }
            },
            _ => {
                push_literal(&mut regex, c);
                i += 1;
            }
        }
    }
    regex
}

fn push_literal(regex: &mut String, c: char) {
    if "\\^$.|+(){}[]*?".contains(c) {
        regex.push('\\');
    }
    regex.push(c);
}

/// Index of the `]` closing the class opened at `start`.
fn find_char_class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    if matches!(chars.get(i), Some('!' | '^')) {
        i += 1;
    }
    // A ] immediately after [ or [! is literal
    if chars.get(i) == Some(&']') {
        i += 1;
    }
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            ']' => return Some(i),
            '[' if chars.get(i + 1) == Some(&':') => {
                let rest: String = chars[i + 2..].iter().collect();
                match rest.find(":]") {
                    Some(close) => i += 2 + rest[..close].chars().count() + 2,
                    None => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    None
}

fn convert_char_class(content: &str) -> String {
    let mut result = String::from("[");
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    if matches!(chars.first(), Some('!' | '^')) {
        result.push('^');
        i += 1;
    }

    while i < chars.len() {
        let c = chars[i];
        if c == '[' && chars.get(i + 1) == Some(&':') {
            let rest: String = chars[i + 2..].iter().collect();
            if let Some(close) = rest.find(":]") {
                result.push_str(POSIX_CLASSES.get(&rest[..close]).copied().unwrap_or(""));
                i += 2 + rest[..close].chars().count() + 2;
                continue;
            }
        }
        match c {
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    result.push('\\');
                    result.push(*next);
                }
                i += 2;
            }
            '-' if i > 0 && i + 1 < chars.len() => {
                result.push('-');
                i += 1;
            }
            '[' | ']' | '^' => {
                result.push('\\');
                result.push(c);
                i += 1;
            }
            _ => {
                result.push(c);
                i += 1;
            }
        }
    }

    result.push(']');
    result
}

/// Compile a pattern that must match an entire string.
fn compile_full(pattern: &str) -> Option<Regex> {
    Regex::new(&format!("^(?s:{})$", pattern_to_regex(pattern, true))).ok()
}

/// Whole-string match, as used by `case`.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match compile_full(pattern) {
        Some(re) => re.is_match(value),
        None => value == unescape_pattern(pattern),
    }
}

fn boundaries(value: &str) -> Vec<usize> {
    value.char_indices().map(|(i, _)| i).chain(std::iter::once(value.len())).collect()
}

/// `${v#p}`, `${v##p}`, `${v%p}`, `${v%%p}`.
pub fn remove_pattern(value: &str, pattern: &str, side: PatternRemovalSide, greedy: bool) -> String {
    let Some(re) = compile_full(pattern) else {
        return value.to_string();
    };
    let bounds = boundaries(value);
    match side {
        PatternRemovalSide::Prefix => {
            let mut ends: Box<dyn Iterator<Item = &usize>> = if greedy {
                Box::new(bounds.iter().rev())
            } else {
                Box::new(bounds.iter())
            };
            match ends.find(|&&end| re.is_match(&value[..end])) {
                Some(&end) => value[end..].to_string(),
                None => value.to_string(),
            }
        }
        PatternRemovalSide::Suffix => {
            let mut starts: Box<dyn Iterator<Item = &usize>> = if greedy {
                Box::new(bounds.iter())
            } else {
                Box::new(bounds.iter().rev())
            };
            match starts.find(|&&start| re.is_match(&value[start..])) {
                Some(&start) => value[..start].to_string(),
                None => value.to_string(),
            }
        }
    }
}

/// `${v/p/r}` and `${v//p/r}`: the longest match at each leftmost position
/// is replaced. An empty pattern leaves the value unchanged.
pub fn replace_pattern(value: &str, pattern: &str, replacement: &str, all: bool) -> String {
    if pattern.is_empty() {
        return value.to_string();
    }
    let Some(re) = compile_full(pattern) else {
        return value.to_string();
    };
    let bounds = boundaries(value);
    let mut out = String::new();
    let mut copied_to = 0;
    let mut idx = 0;
    while idx < bounds.len() {
        let start = bounds[idx];
        let found = bounds[idx + 1..]
            .iter()
            .rev()
            .position(|&end| re.is_match(&value[start..end]))
            .map(|from_end| bounds.len() - 1 - from_end);
        match found {
            Some(end_idx) => {
                out.push_str(&value[copied_to..start]);
                out.push_str(replacement);
                copied_to = bounds[end_idx];
                idx = end_idx;
                if !all {
                    break;
                }
            }
            None => idx += 1,
        }
    }
    out.push_str(&value[copied_to..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_patterns() {
        assert_eq!(pattern_to_regex("*", true), ".*");
        assert_eq!(pattern_to_regex("*", false), ".*?");
        assert_eq!(pattern_to_regex("?", true), ".");
        assert_eq!(pattern_to_regex("a.b", true), "a\\.b");
        assert_eq!(pattern_to_regex("\\*", true), "\\*");
    }

    #[test]
    fn test_character_class() {
        assert_eq!(pattern_to_regex("[abc]", true), "[abc]");
        assert_eq!(pattern_to_regex("[a-z]", true), "[a-z]");
        assert_eq!(pattern_to_regex("[!abc]", true), "[^abc]");
        assert_eq!(pattern_to_regex("[[:digit:]]", true), "[0-9]");
        assert_eq!(pattern_to_regex("[abc", true), "\\[abc");
    }

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("hello.txt", "*.txt"));
        assert!(!matches_pattern("hello.md", "*.txt"));
        assert!(matches_pattern("b", "[abc]"));
        assert!(matches_pattern("a\nb", "a*b"));
        assert!(matches_pattern("*", "\\*"));
        assert!(!matches_pattern("x", "\\*"));
        assert!(matches_pattern("", "*"));
    }

    #[test]
    fn test_remove_pattern() {
        use PatternRemovalSide::*;
        let path = "/usr/local/bin";
        assert_eq!(remove_pattern(path, "*/", Prefix, false), "usr/local/bin");
        assert_eq!(remove_pattern(path, "*/", Prefix, true), "bin");
        assert_eq!(remove_pattern(path, "/*", Suffix, false), "/usr/local");
        assert_eq!(remove_pattern(path, "/*", Suffix, true), "");
        assert_eq!(remove_pattern("file.tar.gz", ".*", Suffix, false), "file.tar");
        assert_eq!(remove_pattern("abc", "x", Prefix, true), "abc");
    }

    #[test]
    fn test_replace_pattern() {
        assert_eq!(replace_pattern("hello world", "o", "0", false), "hell0 world");
        assert_eq!(replace_pattern("hello world", "o", "0", true), "hell0 w0rld");
        assert_eq!(replace_pattern("aaa", "a*", "b", true), "b");
        assert_eq!(replace_pattern("abc", "", "x", true), "abc");
        assert_eq!(replace_pattern("a-b-c", "-", "", true), "abc");
    }

    #[test]
    fn test_escaping_helpers() {
        assert_eq!(escape_pattern("a*b"), "a\\*b");
        assert_eq!(unescape_pattern("a\\*b"), "a*b");
        assert!(has_glob_chars("*.txt"));
        assert!(has_glob_chars("[ab]"));
        assert!(!has_glob_chars("\\*.txt"));
        assert!(!has_glob_chars("plain["));
        assert_eq!(to_glob_syntax("\\*x*"), "[*]x*");
    }
}
