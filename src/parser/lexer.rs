//! Lexer for Shell Scripts
//!
//! The lexer tokenizes input into a lazy stream of tokens that the parser
//! consumes. It handles:
//! - Operators and delimiters
//! - Words, split into segments tagged with their quoting context
//! - Comments and line continuations
//! - Here-documents (bodies are attached to the delimiter word)
//!
//! Expansions (`$(...)`, `${...}`, backticks) are scanned as balanced units
//! and kept raw inside their segment; the word parser interprets them.

use crate::ast::types::{Position, Quoting};
use crate::parser::types::{SyntaxError, MAX_PARSER_DEPTH};

/// Token types for the shell lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // End of input
    Eof,

    // Newlines and separators
    Newline,
    Semicolon,
    Amp, // &

    // Operators
    Pipe,   // |
    AndAnd, // &&
    OrOr,   // ||

    // Redirections
    Less,      // <
    Great,     // >
    DLess,     // <<
    DGreat,    // >>
    LessAnd,   // <&
    GreatAnd,  // >&
    DLessDash, // <<-
    TLess,     // <<<
    AndGreat,  // &>

    // Grouping
    LParen, // (
    RParen, // )

    // Case terminators
    DSemi,       // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&

    // Words
    Word,
    IoNumber, // digits directly before a redirection operator
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eof => "end of input",
            Self::Newline => "newline",
            Self::Semicolon => ";",
            Self::Amp => "&",
            Self::Pipe => "|",
            Self::AndAnd => "&&",
            Self::OrOr => "||",
            Self::Less => "<",
            Self::Great => ">",
            Self::DLess => "<<",
            Self::DGreat => ">>",
            Self::LessAnd => "<&",
            Self::GreatAnd => ">&",
            Self::DLessDash => "<<-",
            Self::TLess => "<<<",
            Self::AndGreat => "&>",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::DSemi => ";;",
            Self::SemiAnd => ";&",
            Self::SemiSemiAnd => ";;&",
            Self::Word => "word",
            Self::IoNumber => "file descriptor",
        }
    }

    pub fn is_redirection(&self) -> bool {
        matches!(
            self,
            Self::Less
                | Self::Great
                | Self::DLess
                | Self::DGreat
                | Self::LessAnd
                | Self::GreatAnd
                | Self::DLessDash
                | Self::TLess
                | Self::AndGreat
        )
    }
}

/// A run of characters sharing one quoting context.
///
/// For unquoted and double-quoted runs `text` is raw source (expansions
/// still unparsed). Single-quoted and escaped runs are final literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub quoting: Quoting,
}

/// Here-document body read ahead for a `<<` delimiter word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HereDocBody {
    pub content: String,
    /// Any part of the delimiter was quoted: the body stays literal
    pub quoted: bool,
}

/// A token produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Raw source text
    pub value: String,
    /// For WORD tokens: quoting-tagged segments
    pub segments: Vec<Segment>,
    /// Original position in input
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    /// For here-document delimiter words
    pub heredoc: Option<HereDocBody>,
}

impl Token {
    fn new(token_type: TokenType, value: impl Into<String>, start: usize, end: usize, line: usize, column: usize) -> Self {
        Self {
            token_type,
            value: value.into(),
            segments: Vec::new(),
            start,
            end,
            line,
            column,
            heredoc: None,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column, self.start)
    }

    /// The word's text when it is a single unquoted segment.
    pub fn unquoted_text(&self) -> Option<&str> {
        match (self.token_type, self.segments.as_slice()) {
            (TokenType::Word, [seg]) if seg.quoting == Quoting::Unquoted => Some(seg.text.as_str()),
            _ => None,
        }
    }

    /// True for an unquoted word spelled exactly like `word`.
    pub fn is_reserved(&self, word: &str) -> bool {
        self.unquoted_text() == Some(word)
    }

    /// Human-readable description used in syntax errors.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::Eof | TokenType::Newline => self.token_type.as_str().to_string(),
            _ => format!("'{}'", self.value),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct HeredocResume {
    /// Byte offset just past the last body read for the current line
    resume: usize,
    /// Lines covered by the bodies
    lines: usize,
}

/// Three-character operators
const THREE_CHAR_OPS: &[(&str, TokenType)] = &[
    (";;&", TokenType::SemiSemiAnd),
    ("<<<", TokenType::TLess),
    ("<<-", TokenType::DLessDash),
];

/// Two-character operators
const TWO_CHAR_OPS: &[(&str, TokenType)] = &[
    ("&&", TokenType::AndAnd),
    ("||", TokenType::OrOr),
    (";;", TokenType::DSemi),
    (";&", TokenType::SemiAnd),
    (">>", TokenType::DGreat),
    ("<<", TokenType::DLess),
    ("<&", TokenType::LessAnd),
    (">&", TokenType::GreatAnd),
    ("&>", TokenType::AndGreat),
];

fn single_char_op(c: char) -> Option<TokenType> {
    match c {
        '|' => Some(TokenType::Pipe),
        '&' => Some(TokenType::Amp),
        ';' => Some(TokenType::Semicolon),
        '(' => Some(TokenType::LParen),
        ')' => Some(TokenType::RParen),
        '<' => Some(TokenType::Less),
        '>' => Some(TokenType::Great),
        _ => None,
    }
}

/// Check if a character is a word boundary (ends a word token)
fn is_word_boundary(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | ';' | '&' | '|' | '(' | ')' | '<' | '>')
}

/// Accumulates segments, merging adjacent runs with the same quoting.
#[derive(Debug, Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn push_str(&mut self, quoting: Quoting, text: &str) {
        match self.segments.last_mut() {
            Some(last) if last.quoting == quoting => last.text.push_str(text),
            _ => self.segments.push(Segment { text: text.to_string(), quoting }),
        }
    }

    fn push_char(&mut self, quoting: Quoting, c: char) {
        let mut buf = [0u8; 4];
        self.push_str(quoting, c.encode_utf8(&mut buf));
    }
}

/// Lazy, restartable (cloneable) token stream over shell source text.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    /// Set after `<<`/`<<-`: the next word is a here-doc delimiter (value = strip tabs)
    pending_heredoc: Option<bool>,
    heredoc_resume: Option<HeredocResume>,
    /// Nested `$(..)`, `${..}` and quotes inside the expansion being scanned
    expansion_depth: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            pending_heredoc: None,
            heredoc_resume: None,
            expansion_depth: 0,
            finished: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.pos)
    }

    fn unterminated(&self, what: &str) -> SyntaxError {
        SyntaxError::new(self.current_position(), format!("closing {}", what), "end of input")
    }

    /// Skip blanks, line continuations and comments.
    fn skip_blanks(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.bump();
                }
                Some('\\') if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_blanks();
        let (start, line, column) = (self.pos, self.line, self.column);

        let Some(c) = self.peek() else {
            if self.pending_heredoc.is_some() {
                return Err(SyntaxError::new(self.current_position(), "here-document delimiter", "end of input"));
            }
            return Ok(Token::new(TokenType::Eof, "", start, start, line, column));
        };

        if c == '\n' {
            if self.pending_heredoc.is_some() {
                return Err(SyntaxError::new(self.current_position(), "here-document delimiter", "newline"));
            }
            self.bump();
            let token = Token::new(TokenType::Newline, "\n", start, self.pos, line, column);
            if let Some(resume) = self.heredoc_resume.take() {
                self.pos = resume.resume;
                self.line += resume.lines;
                self.column = 1;
            }
            return Ok(token);
        }

        if let Some(token) = self.lex_operator(start, line, column) {
            return Ok(token);
        }

        let segments = self.lex_segments(true, false)?;
        let value = self.input[start..self.pos].to_string();
        let mut token = Token::new(TokenType::Word, value, start, self.pos, line, column);
        token.segments = segments;

        if let Some(strip_tabs) = self.pending_heredoc.take() {
            let quoted = token.segments.iter().any(|s| s.quoting.is_quoted());
            let delimiter: String = token.segments.iter().map(|s| s.text.as_str()).collect();
            let content = self.read_heredoc_body(&delimiter, strip_tabs, token.position())?;
            token.heredoc = Some(HereDocBody { content, quoted });
        } else if token.unquoted_text().is_some_and(|t| t.chars().all(|c| c.is_ascii_digit()))
            && matches!(self.peek(), Some('<' | '>'))
        {
            token.token_type = TokenType::IoNumber;
        }
        Ok(token)
    }

    fn lex_operator(&mut self, start: usize, line: usize, column: usize) -> Option<Token> {
        let rest = self.rest();
        let matched = THREE_CHAR_OPS
            .iter()
            .chain(TWO_CHAR_OPS.iter())
            .find(|(op, _)| rest.starts_with(op))
            .map(|(op, tt)| (op.len(), *tt))
            .or_else(|| rest.chars().next().and_then(single_char_op).map(|tt| (1, tt)))?;

        let (len, token_type) = matched;
        for _ in 0..len {
            self.bump();
        }
        match token_type {
            TokenType::DLess => self.pending_heredoc = Some(false),
            TokenType::DLessDash => self.pending_heredoc = Some(true),
            _ => {}
        }
        Some(Token::new(token_type, &self.input[start..self.pos], start, self.pos, line, column))
    }

    /// Lex one word's worth of segments.
    ///
    /// With `stop_at_boundary` unset the whole remaining input is one word;
    /// with `in_double_quotes` set, unquoted text is tagged double-quoted
    /// and single quotes are literal.
    fn lex_segments(&mut self, stop_at_boundary: bool, in_double_quotes: bool) -> Result<Vec<Segment>, SyntaxError> {
        let plain = if in_double_quotes { Quoting::DoubleQuoted } else { Quoting::Unquoted };
        let mut segs = SegmentBuilder::default();
        while let Some(c) = self.peek() {
            if stop_at_boundary && is_word_boundary(c) {
                break;
            }
            match c {
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some('\n') => {
                            self.bump();
                        }
                        Some(n) if !in_double_quotes || matches!(n, '$' | '`' | '"' | '\\') => {
                            self.bump();
                            segs.push_char(Quoting::Escaped, n);
                        }
                        _ => segs.push_char(plain, '\\'),
                    }
                }
                '\'' if !in_double_quotes => {
                    self.bump();
                    let text = self.read_single_quoted()?;
                    segs.push_str(Quoting::SingleQuoted, &text);
                }
                '"' => {
                    self.bump();
                    self.lex_double_quoted(&mut segs)?;
                }
                '$' | '`' => {
                    let raw = self.scan_expansion(in_double_quotes)?;
                    segs.push_str(plain, &raw);
                }
                _ => {
                    self.bump();
                    segs.push_char(plain, c);
                }
            }
        }
        Ok(segs.segments)
    }

    /// Segments of an unquoted here-document body: `$`, backticks and
    /// `\\` escapes are active, quotes are ordinary characters.
    fn lex_heredoc_segments(&mut self) -> Result<Vec<Segment>, SyntaxError> {
        let mut segs = SegmentBuilder::default();
        while let Some(c) = self.peek() {
            match c {
                '\\' => {
                    self.bump();
                    match self.peek() {
                        Some('\n') => {
                            self.bump();
                        }
                        Some(n @ ('$' | '`' | '\\')) => {
                            self.bump();
                            segs.push_char(Quoting::Escaped, n);
                        }
                        _ => segs.push_char(Quoting::DoubleQuoted, '\\'),
                    }
                }
                '$' | '`' => {
                    let raw = self.scan_expansion(true)?;
                    segs.push_str(Quoting::DoubleQuoted, &raw);
                }
                _ => {
                    self.bump();
                    segs.push_char(Quoting::DoubleQuoted, c);
                }
            }
        }
        Ok(segs.segments)
    }

    fn read_single_quoted(&mut self) -> Result<String, SyntaxError> {
        let start = self.pos;
        loop {
            match self.bump() {
                Some('\'') => return Ok(self.input[start..self.pos - 1].to_string()),
                Some(_) => {}
                None => return Err(self.unterminated("'")),
            }
        }
    }

    fn lex_double_quoted(&mut self, segs: &mut SegmentBuilder) -> Result<(), SyntaxError> {
        segs.push_str(Quoting::DoubleQuoted, "");
        loop {
            match self.peek() {
                None => return Err(self.unterminated("\"")),
                Some('"') => {
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    self.bump();
                    match self.peek() {
                        Some(n @ ('$' | '`' | '"' | '\\')) => {
                            self.bump();
                            segs.push_char(Quoting::Escaped, n);
                        }
                        Some('\n') => {
                            self.bump();
                        }
                        _ => segs.push_char(Quoting::DoubleQuoted, '\\'),
                    }
                }
                Some('$' | '`') => {
                    let raw = self.scan_expansion(true)?;
                    segs.push_str(Quoting::DoubleQuoted, &raw);
                }
                Some(c) => {
                    self.bump();
                    segs.push_char(Quoting::DoubleQuoted, c);
                }
            }
        }
    }

    /// Scan `$...` or a backtick substitution, returning its raw text.
    fn scan_expansion(&mut self, in_double_quotes: bool) -> Result<String, SyntaxError> {
        let start = self.pos;
        self.scan_expansion_inner(in_double_quotes)?;
        Ok(self.input[start..self.pos].to_string())
    }

    fn scan_expansion_inner(&mut self, in_double_quotes: bool) -> Result<(), SyntaxError> {
        if self.expansion_depth >= MAX_PARSER_DEPTH {
            return Err(SyntaxError::new(self.current_position(), "shallower nesting", "too many nested expansions"));
        }
        self.expansion_depth += 1;
        let scanned = self.scan_one_expansion(in_double_quotes);
        self.expansion_depth -= 1;
        scanned
    }

    fn scan_one_expansion(&mut self, in_double_quotes: bool) -> Result<(), SyntaxError> {
        match self.bump() {
            Some('`') => self.skip_backtick(),
            Some('$') => match self.peek() {
                Some('(') => {
                    self.bump();
                    self.skip_balanced('(', ')', false)
                }
                Some('{') => {
                    self.bump();
                    self.skip_balanced('{', '}', in_double_quotes)
                }
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn skip_backtick(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.bump() {
                Some('`') => return Ok(()),
                Some('\\') => {
                    self.bump();
                }
                Some(_) => {}
                None => return Err(self.unterminated("`")),
            }
        }
    }

    fn skip_double_quoted(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.peek() {
                None => return Err(self.unterminated("\"")),
                Some('"') => {
                    self.bump();
                    return Ok(());
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('$' | '`') => self.scan_expansion_inner(true)?,
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    fn skip_balanced(&mut self, open: char, close: char, single_quotes_literal: bool) -> Result<(), SyntaxError> {
        let mut depth = 1usize;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.unterminated(&format!("'{}'", close)));
            };
            match c {
                '\\' => {
                    self.bump();
                    self.bump();
                }
                '\'' if !single_quotes_literal => {
                    self.bump();
                    self.read_single_quoted()?;
                }
                '"' => {
                    self.bump();
                    self.skip_double_quoted()?;
                }
                '$' | '`' => self.scan_expansion_inner(single_quotes_literal)?,
                c if c == open => {
                    depth += 1;
                    self.bump();
                }
                c if c == close => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }
    }

    fn read_heredoc_body(&mut self, delimiter: &str, strip_tabs: bool, at: Position) -> Result<String, SyntaxError> {
        let input = self.input;
        let body_start = match self.heredoc_resume {
            Some(resume) => resume.resume,
            None => input[self.pos..].find('\n').map_or(input.len(), |i| self.pos + i + 1),
        };

        let mut content = String::new();
        let mut cursor = body_start;
        let mut lines = 0;
        let mut found = false;
        while cursor < input.len() {
            let line_end = input[cursor..].find('\n').map(|i| cursor + i);
            let raw_line = &input[cursor..line_end.unwrap_or(input.len())];
            cursor = line_end.map_or(input.len(), |e| e + 1);
            lines += 1;
            let line = if strip_tabs { raw_line.trim_start_matches('\t') } else { raw_line };
            if line == delimiter {
                found = true;
                break;
            }
            content.push_str(line);
            content.push('\n');
        }
        if !found {
            return Err(SyntaxError::new(at, format!("here-document delimiter '{}'", delimiter), "end of input"));
        }

        let previous = self.heredoc_resume.map_or(0, |r| r.lines);
        self.heredoc_resume = Some(HeredocResume { resume: cursor, lines: previous + lines });
        Ok(content)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if !matches!(&token, Ok(t) if t.token_type != TokenType::Eof) {
            self.finished = true;
        }
        Some(token)
    }
}

/// Tokenize a complete script.
pub fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(input).collect()
}

/// Split free-standing text (e.g. the operand of `${NAME:-word}`) into
/// quoting-tagged segments, treating the whole text as one word.
pub fn split_segments(text: &str, in_double_quotes: bool) -> Result<Vec<Segment>, SyntaxError> {
    Lexer::new(text).lex_segments(false, in_double_quotes)
}

/// Split an unquoted here-document body into segments.
pub fn split_heredoc_segments(body: &str) -> Result<Vec<Segment>, SyntaxError> {
    Lexer::new(body).lex_heredoc_segments()
}
