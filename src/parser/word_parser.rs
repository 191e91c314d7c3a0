//! Word Parser
//!
//! Converts the quoting-tagged segments produced by the lexer into
//! `WordPart`s: literals, tilde prefixes, parameter expansions, command
//! substitutions and arithmetic expansions.

use crate::ast::types::{
    ArithmeticExpansionPart, ArrayIndex, CommandSubstitutionPart, DefaultValueOp,
    ParameterExpansionPart, ParameterOperation, PatternRemovalOp, PatternRemovalSide,
    PatternReplacementOp, Position, Quoting, TildePrefix, WordNode, WordPart, WordPartKind,
};
use crate::parser::lexer::{split_heredoc_segments, split_segments, Segment};
use crate::parser::parser::parse_nested;
use crate::parser::types::{SyntaxError, MAX_PARSER_DEPTH};

/// Special single-character parameters
const SPECIAL_PARAMS: &[char] = &['@', '*', '#', '?', '$', '!', '-'];

/// Check if a string is a valid variable name
pub fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Parses words at a given nesting depth.
#[derive(Debug, Clone, Copy)]
pub struct WordParser {
    depth: usize,
    position: Position,
}

impl WordParser {
    pub fn new(depth: usize, position: Position) -> Self {
        Self { depth, position }
    }

    fn error(&self, expected: impl Into<String>, found: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.position, expected, found)
    }

    /// Parse a word from its segments.
    ///
    /// In `assignment` mode a `~` after each unquoted `:` is also a tilde
    /// prefix, as in `PATH=~/bin:~/sbin`.
    pub fn parse_segments(&self, segments: &[Segment], source: &str, assignment: bool) -> Result<WordNode, SyntaxError> {
        if self.depth > MAX_PARSER_DEPTH {
            return Err(self.error("shallower nesting", "too many nested constructs"));
        }
        let mut parts = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            match seg.quoting {
                Quoting::SingleQuoted | Quoting::Escaped => {
                    push_literal(&mut parts, &seg.text, seg.quoting);
                }
                Quoting::Unquoted | Quoting::DoubleQuoted => {
                    let tilde_here = i == 0 && seg.quoting == Quoting::Unquoted;
                    let at_word_end = i + 1 == segments.len();
                    self.parse_text(&seg.text, seg.quoting, tilde_here, at_word_end, assignment, &mut parts)?;
                }
            }
        }
        if parts.is_empty() && segments.iter().any(|s| s.quoting.is_quoted()) {
            // "" and '' still form a (possibly empty) quoted word
            let quoting = segments.iter().map(|s| s.quoting).find(|q| q.is_quoted()).unwrap_or(Quoting::DoubleQuoted);
            parts.push(WordPart::literal("", quoting));
        }
        Ok(WordNode::new(parts, source))
    }

    /// Parse free-standing text as one word (operands of `${...}` forms,
    /// arithmetic bodies, array subscripts).
    /// The text is one nesting level below this word.
    pub fn parse_text_word(&self, text: &str, in_double_quotes: bool) -> Result<WordNode, SyntaxError> {
        let inner = WordParser::new(self.depth + 1, self.position);
        let segments = split_segments(text, in_double_quotes)?;
        let mut word = inner.parse_segments(&segments, text, false)?;
        if word.parts.is_empty() && in_double_quotes {
            word.parts.push(WordPart::literal("", Quoting::DoubleQuoted));
        }
        Ok(word)
    }

    /// Parse an unquoted here-document body. The whole body behaves as if
    /// it were double-quoted, except that `"` is an ordinary character.
    pub fn parse_heredoc(&self, body: &str) -> Result<WordNode, SyntaxError> {
        let segments = split_heredoc_segments(body)?;
        let mut word = self.parse_segments(&segments, body, false)?;
        if word.parts.is_empty() {
            word.parts.push(WordPart::literal("", Quoting::DoubleQuoted));
        }
        Ok(word)
    }

    fn parse_text(
        &self,
        text: &str,
        quoting: Quoting,
        tilde_at_start: bool,
        at_word_end: bool,
        assignment: bool,
        parts: &mut Vec<WordPart>,
    ) -> Result<(), SyntaxError> {
        let mut literal = String::new();
        let mut i = 0;
        let bytes = text.as_bytes();

        if tilde_at_start {
            if let Some((prefix, len)) = tilde_prefix(text, at_word_end, assignment) {
                parts.push(WordPart::new(WordPartKind::Tilde(prefix), Quoting::Unquoted));
                i = len;
            }
        }

        while i < text.len() {
            let Some(c) = text[i..].chars().next() else { break };
            match c {
                '$' => {
                    let (kind, consumed) = self.parse_dollar(&text[i..], quoting)?;
                    match kind {
                        Some(kind) => {
                            flush_literal(parts, &mut literal, quoting);
                            parts.push(WordPart::new(kind, quoting));
                        }
                        None => literal.push('$'),
                    }
                    i += consumed;
                }
                '`' => {
                    let end = find_backtick(bytes, i + 1)
                        .ok_or_else(|| self.error("closing '`'", "end of input"))?;
                    let inner = unescape_backtick(&text[i + 1..end]);
                    flush_literal(parts, &mut literal, quoting);
                    let body = parse_nested(&inner, self.depth + 1)?;
                    parts.push(WordPart::new(
                        WordPartKind::CommandSubstitution(CommandSubstitutionPart { body }),
                        quoting,
                    ));
                    i = end + 1;
                }
                ':' if assignment && quoting == Quoting::Unquoted => {
                    literal.push(':');
                    i += 1;
                    let rest = &text[i..];
                    if let Some((prefix, len)) = tilde_prefix(rest, at_word_end, true) {
                        flush_literal(parts, &mut literal, quoting);
                        parts.push(WordPart::new(WordPartKind::Tilde(prefix), Quoting::Unquoted));
                        i += len;
                    }
                }
                _ => {
                    literal.push(c);
                    i += c.len_utf8();
                }
            }
        }
        flush_literal(parts, &mut literal, quoting);
        Ok(())
    }

    /// Parse an expansion starting at `$`. Returns the part (None for a
    /// literal dollar sign) and the number of bytes consumed.
    fn parse_dollar(&self, text: &str, quoting: Quoting) -> Result<(Option<WordPartKind>, usize), SyntaxError> {
        let bytes = text.as_bytes();
        match bytes.get(1).copied() {
            Some(b'(') => {
                let close = find_matching(bytes, 2, b'(', b')', false)
                    .ok_or_else(|| self.error("closing ')'", "end of input"))?;
                if bytes.get(2) == Some(&b'(')
                    && close > 3
                    && bytes[close - 1] == b')'
                    && find_matching(bytes, 3, b'(', b')', false) == Some(close - 1)
                {
                    let expression = self.parse_text_word(&text[3..close - 1], true)?;
                    return Ok((
                        Some(WordPartKind::Arithmetic(ArithmeticExpansionPart { expression })),
                        close + 1,
                    ));
                }
                let body = parse_nested(&text[2..close], self.depth + 1)?;
                Ok((
                    Some(WordPartKind::CommandSubstitution(CommandSubstitutionPart { body })),
                    close + 1,
                ))
            }
            Some(b'{') => {
                let single_quotes_literal = quoting == Quoting::DoubleQuoted;
                let close = find_matching(bytes, 2, b'{', b'}', single_quotes_literal)
                    .ok_or_else(|| self.error("closing '}'", "end of input"))?;
                let kind = self.parse_braced(&text[2..close], quoting)?;
                Ok((Some(kind), close + 1))
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                let len = 1 + text[1..]
                    .bytes()
                    .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                    .count();
                Ok((Some(WordPartKind::Parameter(ParameterExpansionPart::simple(&text[1..len]))), len))
            }
            Some(b) if b.is_ascii_digit() => Ok((
                Some(WordPartKind::Parameter(ParameterExpansionPart::simple((b as char).to_string()))),
                2,
            )),
            Some(b) if SPECIAL_PARAMS.contains(&(b as char)) => Ok((
                Some(WordPartKind::Parameter(ParameterExpansionPart::simple((b as char).to_string()))),
                2,
            )),
            _ => Ok((None, 1)),
        }
    }

    /// Parse the inside of `${...}`.
    fn parse_braced(&self, inner: &str, quoting: Quoting) -> Result<WordPartKind, SyntaxError> {
        let bad = || Ok(WordPartKind::BadSubstitution(format!("${{{}}}", inner)));

        // ${#NAME} / ${#A[@]}
        if let Some(rest) = inner.strip_prefix('#') {
            if !rest.is_empty() {
                let Some((parameter, index, remainder)) = self.parse_parameter_name(rest)? else {
                    return bad();
                };
                if !remainder.is_empty() {
                    return bad();
                }
                return Ok(WordPartKind::Parameter(ParameterExpansionPart {
                    parameter,
                    index,
                    operation: Some(ParameterOperation::Length),
                }));
            }
        }

        let Some((parameter, index, rest)) = self.parse_parameter_name(inner)? else {
            return bad();
        };
        let in_dq = quoting == Quoting::DoubleQuoted;
        let operation = if rest.is_empty() {
            None
        } else if let Some(op) = self.parse_default_op(rest, in_dq)? {
            Some(op)
        } else if let Some(pattern) = rest.strip_prefix("##") {
            Some(self.removal(pattern, PatternRemovalSide::Prefix, true)?)
        } else if let Some(pattern) = rest.strip_prefix('#') {
            Some(self.removal(pattern, PatternRemovalSide::Prefix, false)?)
        } else if let Some(pattern) = rest.strip_prefix("%%") {
            Some(self.removal(pattern, PatternRemovalSide::Suffix, true)?)
        } else if let Some(pattern) = rest.strip_prefix('%') {
            Some(self.removal(pattern, PatternRemovalSide::Suffix, false)?)
        } else if let Some(body) = rest.strip_prefix('/') {
            let (all, body) = match body.strip_prefix('/') {
                Some(b) => (true, b),
                None => (false, body),
            };
            let (pattern, replacement) = split_replacement(body);
            Some(ParameterOperation::PatternReplacement(PatternReplacementOp {
                pattern: self.parse_text_word(pattern, false)?,
                replacement: self.parse_text_word(replacement, in_dq)?,
                all,
            }))
        } else {
            return bad();
        };

        Ok(WordPartKind::Parameter(ParameterExpansionPart { parameter, index, operation }))
    }

    fn parse_default_op(&self, rest: &str, in_dq: bool) -> Result<Option<ParameterOperation>, SyntaxError> {
        let (check_empty, body) = match rest.strip_prefix(':') {
            Some(body) => (true, body),
            None => (false, rest),
        };
        let mut chars = body.chars();
        let Some(op) = chars.next() else {
            return Ok(None);
        };
        if !matches!(op, '-' | '=' | '?' | '+') {
            return Ok(None);
        }
        let word = self.parse_text_word(chars.as_str(), in_dq)?;
        let operand = DefaultValueOp { word, check_empty };
        Ok(Some(match op {
            '-' => ParameterOperation::DefaultValue(operand),
            '=' => ParameterOperation::AssignDefault(operand),
            '?' => ParameterOperation::ErrorIfUnset(operand),
            _ => ParameterOperation::UseAlternative(operand),
        }))
    }

    fn removal(&self, pattern: &str, side: PatternRemovalSide, greedy: bool) -> Result<ParameterOperation, SyntaxError> {
        Ok(ParameterOperation::PatternRemoval(PatternRemovalOp {
            pattern: self.parse_text_word(pattern, false)?,
            side,
            greedy,
        }))
    }

    /// Split `NAME[index]rest`. Returns None when no valid parameter name
    /// starts the text.
    fn parse_parameter_name<'t>(&self, text: &'t str) -> Result<Option<(String, Option<ArrayIndex>, &'t str)>, SyntaxError> {
        let bytes = text.as_bytes();
        let len = match bytes.first().copied() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {
                text.bytes().take_while(|b| b.is_ascii_alphanumeric() || *b == b'_').count()
            }
            Some(b) if b.is_ascii_digit() => text.bytes().take_while(|b| b.is_ascii_digit()).count(),
            Some(b) if SPECIAL_PARAMS.contains(&(b as char)) => 1,
            _ => return Ok(None),
        };
        let name = text[..len].to_string();
        let rest = &text[len..];

        if rest.starts_with('[') && is_valid_name(&name) {
            let Some(close) = find_matching(rest.as_bytes(), 1, b'[', b']', false) else {
                return Ok(None);
            };
            let subscript = &rest[1..close];
            let index = match subscript {
                "@" => ArrayIndex::All,
                "*" => ArrayIndex::Star,
                _ => ArrayIndex::Expr(self.parse_text_word(subscript, true)?),
            };
            return Ok(Some((name, Some(index), &rest[close + 1..])));
        }
        Ok(Some((name, None, rest)))
    }
}

fn push_literal(parts: &mut Vec<WordPart>, text: &str, quoting: Quoting) {
    if let Some(WordPart { kind: WordPartKind::Literal(existing), quoting: q }) = parts.last_mut() {
        if *q == quoting {
            existing.push_str(text);
            return;
        }
    }
    parts.push(WordPart::literal(text, quoting));
}

fn flush_literal(parts: &mut Vec<WordPart>, literal: &mut String, quoting: Quoting) {
    if !literal.is_empty() {
        push_literal(parts, literal, quoting);
        literal.clear();
    }
}

/// Recognize a tilde prefix at the start of `text`, returning it and the
/// number of bytes it spans.
fn tilde_prefix(text: &str, at_word_end: bool, assignment: bool) -> Option<(TildePrefix, usize)> {
    let rest = text.strip_prefix('~')?;
    let end = rest
        .find(|c: char| c == '/' || (assignment && c == ':'))
        .unwrap_or(rest.len());
    if end == rest.len() && !at_word_end {
        // ~"user": the prefix continues into quoted text, so no expansion
        return None;
    }
    let name = &rest[..end];
    let prefix = match name {
        "" => TildePrefix::Home,
        "+" => TildePrefix::Pwd,
        "-" => TildePrefix::OldPwd,
        _ if name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')) => {
            TildePrefix::User(name.to_string())
        }
        _ => return None,
    };
    Some((prefix, 1 + end))
}

/// Split `pattern/replacement` on the first unescaped slash.
fn split_replacement(body: &str) -> (&str, &str) {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'/' => return (&body[..i], &body[i + 1..]),
            _ => i += 1,
        }
    }
    (body, "")
}

fn find_backtick(bytes: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn unescape_backtick(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '`' | '\\' | '$') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// Find the byte index of the delimiter closing a construct whose body
/// starts at `from`. Delimiters are ASCII so byte scanning is safe on UTF-8.
pub(crate) fn find_matching(bytes: &[u8], from: usize, open: u8, close: u8, single_quotes_literal: bool) -> Option<usize> {
    let mut depth = 1usize;
    let mut in_double = false;
    let mut i = from;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b'\\' => {
                i += 2;
                continue;
            }
            b'\'' if !in_double && !single_quotes_literal => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'\'' {
                    i += 1;
                }
            }
            b'"' => in_double = !in_double,
            b'`' => {
                i = find_backtick(bytes, i + 1)?;
            }
            _ if !in_double && b == open => depth += 1,
            _ if !in_double && b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}
