//! Recursive Descent Parser for Shell Scripts
//!
//! This parser consumes tokens from the lexer and produces an AST.
//! It follows the shell grammar, loosest to tightest binding:
//!
//! ```text
//! script       ::= statement_list EOF
//! statement    ::= pipeline (('&&' | '||') linebreak pipeline)* ['&']
//! pipeline     ::= ['!'] command ('|' linebreak command)*
//! command      ::= simple_command | compound_command redirect* | function_def
//! ```
//!
//! Parsing is all-or-nothing: any malformed input yields a `SyntaxError`
//! and no AST.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::ast::types::*;
use crate::parser::lexer::{Lexer, Segment, Token, TokenType};
use crate::parser::types::{SyntaxError, MAX_INPUT_SIZE, MAX_PARSER_DEPTH};
use crate::parser::word_parser::{is_valid_name, WordParser};

/// Builtins whose `NAME=value` arguments are parsed as assignments

/// Words that may never start a simple command
const CLOSING_RESERVED: &[&str] = &["then", "else", "elif", "fi", "do", "done", "esac", "}", "in"];

/// Parse a complete script.
pub fn parse(input: &str) -> Result<ScriptNode, SyntaxError> {
    Parser::new(input, 0)?.parse_script()
}

/// Parse the body of a command substitution at the given nesting depth.
pub(crate) fn parse_nested(input: &str, depth: usize) -> Result<ScriptNode, SyntaxError> {
    Parser::new(input, depth)?.parse_script()
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    eof: Option<Token>,
    /// Nesting inherited from enclosing command substitutions
    pub(crate) depth: usize,
    /// Current compound-command nesting
    pub(crate) nesting: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str, depth: usize) -> Result<Self, SyntaxError> {
        if input.len() > MAX_INPUT_SIZE {
            return Err(SyntaxError::new(
                Position::default(),
                format!("at most {} bytes of input", MAX_INPUT_SIZE),
                format!("{} bytes", input.len()),
            ));
        }
        Ok(Self {
            lexer: Lexer::new(input),
            lookahead: VecDeque::new(),
            eof: None,
            depth,
            nesting: 0,
        })
    }

    // =========================================================================
    // TOKEN STREAM
    // =========================================================================

    fn fill(&mut self, n: usize) -> Result<(), SyntaxError> {
        while self.lookahead.len() <= n {
            let token = match self.lexer.next() {
                Some(token) => token?,
                None => self
                    .eof
                    .clone()
                    .ok_or_else(|| SyntaxError::new(Position::default(), "token", "end of input"))?,
            };
            if token.token_type == TokenType::Eof {
                self.eof = Some(token.clone());
            }
            self.lookahead.push_back(token);
        }
        Ok(())
    }

    pub(crate) fn peek_nth(&mut self, n: usize) -> Result<&Token, SyntaxError> {
        self.fill(n)?;
        self.lookahead
            .get(n)
            .ok_or_else(|| SyntaxError::new(Position::default(), "token", "end of input"))
    }

    pub(crate) fn peek(&mut self) -> Result<&Token, SyntaxError> {
        self.peek_nth(0)
    }

    pub(crate) fn peek_type(&mut self) -> Result<TokenType, SyntaxError> {
        Ok(self.peek()?.token_type)
    }

    pub(crate) fn peek_is_reserved(&mut self, word: &str) -> Result<bool, SyntaxError> {
        Ok(self.peek()?.is_reserved(word))
    }

    pub(crate) fn advance(&mut self) -> Result<Token, SyntaxError> {
        self.fill(0)?;
        self.lookahead
            .pop_front()
            .ok_or_else(|| SyntaxError::new(Position::default(), "token", "end of input"))
    }

    pub(crate) fn unexpected(&mut self, expected: &str) -> SyntaxError {
        match self.peek() {
            Ok(token) => SyntaxError::new(token.position(), expected, token.describe()),
            Err(err) => err,
        }
    }

    pub(crate) fn expect(&mut self, token_type: TokenType) -> Result<Token, SyntaxError> {
        if self.peek_type()? == token_type {
            return self.advance();
        }
        Err(self.unexpected(&format!("'{}'", token_type.as_str())))
    }

    pub(crate) fn expect_reserved(&mut self, word: &str) -> Result<Token, SyntaxError> {
        if self.peek_is_reserved(word)? {
            return self.advance();
        }
        Err(self.unexpected(&format!("'{}'", word)))
    }

    pub(crate) fn skip_newlines(&mut self) -> Result<(), SyntaxError> {
        while self.peek_type()? == TokenType::Newline {
            self.advance()?;
        }
        Ok(())
    }

    pub(crate) fn word_parser(&self, token: &Token) -> WordParser {
        WordParser::new(self.depth + self.nesting, token.position())
    }

    pub(crate) fn word_from_token(&self, token: &Token) -> Result<WordNode, SyntaxError> {
        self.word_parser(token).parse_segments(&token.segments, &token.value, false)
    }

    pub(crate) fn expect_word(&mut self, expected: &str) -> Result<Token, SyntaxError> {
        if self.peek_type()? == TokenType::Word {
            return self.advance();
        }
        Err(self.unexpected(expected))
    }

    // =========================================================================
    // LISTS
    // =========================================================================

    pub fn parse_script(&mut self) -> Result<ScriptNode, SyntaxError> {
        let statements = self.parse_statement_list(&[])?;
        if self.peek_type()? != TokenType::Eof {
            return Err(self.unexpected("end of input"));
        }
        Ok(ScriptNode { statements })
    }

    /// Parse statements until EOF, a closing token, or one of `terminators`.
    pub(crate) fn parse_statement_list(&mut self, terminators: &[&str]) -> Result<Vec<StatementNode>, SyntaxError> {
        let mut statements = Vec::new();
        loop {
            self.skip_newlines()?;
            let token = self.peek()?;
            let at_end = match token.token_type {
                TokenType::Eof
                | TokenType::RParen
                | TokenType::DSemi
                | TokenType::SemiAnd
                | TokenType::SemiSemiAnd => true,
                TokenType::Word => terminators.iter().any(|t| token.is_reserved(t)),
                _ => false,
            };
            if at_end {
                break;
            }

            let statement = self.parse_statement()?;
            let background = statement.background;
            statements.push(statement);
            if background {
                continue;
            }
            match self.peek_type()? {
                TokenType::Semicolon | TokenType::Newline => {
                    self.advance()?;
                }
                _ => break,
            }
        }
        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<StatementNode, SyntaxError> {
        let mut pipelines = vec![self.parse_pipeline()?];
        let mut operators = Vec::new();
        loop {
            let operator = match self.peek_type()? {
                TokenType::AndAnd => StatementOperator::And,
                TokenType::OrOr => StatementOperator::Or,
                _ => break,
            };
            self.advance()?;
            self.skip_newlines()?;
            operators.push(operator);
            pipelines.push(self.parse_pipeline()?);
        }
        let background = self.peek_type()? == TokenType::Amp;
        if background {
            self.advance()?;
        }
        Ok(StatementNode { pipelines, operators, background })
    }

    fn parse_pipeline(&mut self) -> Result<PipelineNode, SyntaxError> {
        let negated = self.peek_is_reserved("!")?;
        if negated {
            self.advance()?;
        }
        let mut commands = vec![self.parse_command()?];
        while self.peek_type()? == TokenType::Pipe {
            self.advance()?;
            self.skip_newlines()?;
            commands.push(self.parse_command()?);
        }
        Ok(PipelineNode { commands, negated })
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    fn parse_command(&mut self) -> Result<CommandNode, SyntaxError> {
        let token = self.peek()?.clone();
        if token.token_type == TokenType::LParen || Self::starts_compound(&token) {
            return Ok(CommandNode::Compound(self.parse_compound_command()?));
        }
        if token.is_reserved("function") {
            return self.parse_function_keyword();
        }
        if let Some(text) = token.unquoted_text() {
            if CLOSING_RESERVED.contains(&text) {
                return Err(SyntaxError::new(token.position(), "command", token.describe()));
            }
            if is_valid_name(text)
                && self.peek_nth(1)?.token_type == TokenType::LParen
                && self.peek_nth(2)?.token_type == TokenType::RParen
            {
                let name = text.to_string();
                self.advance()?;
                self.advance()?;
                self.advance()?;
                return self.parse_function_body(name);
            }
        }
        Ok(CommandNode::Simple(self.parse_simple_command()?))
    }

    fn starts_compound(token: &Token) -> bool {
        ["{", "if", "while", "until", "for", "case"].iter().any(|w| token.is_reserved(w))
    }

    /// Parse a compound command together with its trailing redirections.
    pub(crate) fn parse_compound_command(&mut self) -> Result<CompoundCommandNode, SyntaxError> {
        self.nesting += 1;
        if self.depth + self.nesting > MAX_PARSER_DEPTH {
            return Err(self.unexpected("shallower nesting"));
        }
        let token = self.peek()?.clone();
        let body = if token.token_type == TokenType::LParen {
            self.advance()?;
            let list = self.parse_statement_list(&[])?;
            if list.is_empty() {
                return Err(self.unexpected("command"));
            }
            self.expect(TokenType::RParen)?;
            CompoundBody::Subshell(list)
        } else if token.is_reserved("{") {
            self.advance()?;
            let list = self.parse_statement_list(&["}"])?;
            if list.is_empty() {
                return Err(self.unexpected("command"));
            }
            self.expect_reserved("}")?;
            CompoundBody::Group(list)
        } else if token.is_reserved("if") {
            CompoundBody::If(self.parse_if()?)
        } else if token.is_reserved("while") {
            CompoundBody::While(self.parse_while()?)
        } else if token.is_reserved("until") {
            CompoundBody::Until(self.parse_until()?)
        } else if token.is_reserved("for") {
            CompoundBody::For(self.parse_for()?)
        } else if token.is_reserved("case") {
            CompoundBody::Case(self.parse_case()?)
        } else {
            return Err(SyntaxError::new(token.position(), "compound command", token.describe()));
        };
        self.nesting -= 1;

        let mut redirections = Vec::new();
        while self.at_redirection()? {
            redirections.push(self.parse_redirection()?);
        }
        Ok(CompoundCommandNode { body, redirections })
    }

    /// `function name [()] body`
    fn parse_function_keyword(&mut self) -> Result<CommandNode, SyntaxError> {
        self.advance()?;
        let name_token = self.expect_word("function name")?;
        let name = name_token
            .unquoted_text()
            .filter(|n| is_valid_name(n))
            .ok_or_else(|| SyntaxError::new(name_token.position(), "function name", name_token.describe()))?
            .to_string();
        if self.peek_type()? == TokenType::LParen {
            self.advance()?;
            self.expect(TokenType::RParen)?;
        }
        self.parse_function_body(name)
    }

    fn parse_function_body(&mut self, name: String) -> Result<CommandNode, SyntaxError> {
        self.skip_newlines()?;
        let body = self.parse_compound_command()?;
        Ok(CommandNode::FunctionDef(Arc::new(FunctionDefNode { name, body })))
    }

    fn at_redirection(&mut self) -> Result<bool, SyntaxError> {
        let token_type = self.peek_type()?;
        Ok(token_type == TokenType::IoNumber || token_type.is_redirection())
    }

    fn parse_redirection(&mut self) -> Result<RedirectionNode, SyntaxError> {
        let mut fd = None;
        if self.peek_type()? == TokenType::IoNumber {
            let token = self.advance()?;
            let parsed = token
                .value
                .parse::<i32>()
                .map_err(|_| SyntaxError::new(token.position(), "file descriptor", token.describe()))?;
            fd = Some(parsed);
        }
        let op_token = self.advance()?;
        let operator = match op_token.token_type {
            TokenType::Less => RedirectionOperator::Less,
            TokenType::Great => RedirectionOperator::Great,
            TokenType::DGreat => RedirectionOperator::DGreat,
            TokenType::GreatAnd => RedirectionOperator::GreatAnd,
            TokenType::LessAnd => RedirectionOperator::LessAnd,
            TokenType::AndGreat => RedirectionOperator::AndGreat,
            TokenType::TLess => RedirectionOperator::TLess,
            TokenType::DLess => RedirectionOperator::DLess,
            TokenType::DLessDash => RedirectionOperator::DLessDash,
            _ => return Err(SyntaxError::new(op_token.position(), "redirection operator", op_token.describe())),
        };
        let target_token = self.expect_word("redirection target")?;
        let target = match &target_token.heredoc {
            Some(body) => {
                let delimiter: String = target_token.segments.iter().map(|s| s.text.as_str()).collect();
                let content = if body.quoted {
                    WordNode::new(vec![WordPart::literal(&body.content, Quoting::SingleQuoted)], body.content.clone())
                } else {
                    self.word_parser(&target_token).parse_heredoc(&body.content)?
                };
                RedirectionTarget::HereDoc(HereDocNode { delimiter, content, quoted: body.quoted })
            }
            None => RedirectionTarget::Word(self.word_from_token(&target_token)?),
        };
        Ok(RedirectionNode { fd, operator, target })
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommandNode, SyntaxError> {
        let position = self.peek()?.position();
        let mut assignments = Vec::new();
        let mut words: Vec<WordNode> = Vec::new();
        let mut redirections = Vec::new();
        let mut declaration = false;

        loop {
            if self.at_redirection()? {
                redirections.push(self.parse_redirection()?);
                continue;
            }
            if self.peek_type()? != TokenType::Word {
                break;
            }
            if words.is_empty() {
                if let Some(assignment) = self.try_parse_assignment()? {
                    assignments.push(assignment);
                    continue;
                }
            }
            let token = self.advance()?;
            let word = match split_assignment(&token).filter(|_| declaration) {
                Some((prefix, value_segments)) => self.declaration_word(&token, prefix, &value_segments)?,
                None => self.word_from_token(&token)?,
            };
            if words.is_empty() {
                declaration = token.unquoted_text().is_some_and(|t| DECLARATION_BUILTINS.contains(&t));
            }
            words.push(word);
        }

        if assignments.is_empty() && words.is_empty() && redirections.is_empty() {
            return Err(self.unexpected("command"));
        }
        Ok(SimpleCommandNode { assignments, words, redirections, position })
    }

    /// `NAME=value` argument of a declaration builtin: the value part gets
    /// assignment tilde expansion.
    fn declaration_word(&self, token: &Token, prefix: String, value_segments: &[Segment]) -> Result<WordNode, SyntaxError> {
        let value_source = &token.value[prefix.len().min(token.value.len())..];
        let value = self.word_parser(token).parse_segments(value_segments, value_source, true)?;
        let mut parts = vec![WordPart::literal(&prefix, Quoting::Unquoted)];
        parts.extend(value.parts);
        Ok(WordNode::new(parts, token.value.clone()))
    }

    fn try_parse_assignment(&mut self) -> Result<Option<AssignmentNode>, SyntaxError> {
        let token = self.peek()?.clone();
        let Some((prefix, value_segments)) = split_assignment(&token) else {
            return Ok(None);
        };
        self.advance()?;

        let (name, append) = match prefix.trim_end_matches('=').strip_suffix('+') {
            Some(name) => (name.to_string(), true),
            None => (prefix.trim_end_matches('=').to_string(), false),
        };

        // NAME=( ... ) with the parenthesis directly adjacent
        if value_segments.is_empty() {
            let next = self.peek()?;
            if next.token_type == TokenType::LParen && next.start == token.end {
                self.advance()?;
                let mut elements = Vec::new();
                loop {
                    self.skip_newlines()?;
                    match self.peek_type()? {
                        TokenType::RParen => {
                            self.advance()?;
                            break;
                        }
                        TokenType::Word => {
                            let element = self.advance()?;
                            elements.push(self.word_from_token(&element)?);
                        }
                        _ => return Err(self.unexpected("')'")),
                    }
                }
                return Ok(Some(AssignmentNode { name, value: None, append, array: Some(elements) }));
            }
        }

        let value_source = &token.value[prefix.len().min(token.value.len())..];
        let value = self.word_parser(&token).parse_segments(&value_segments, value_source, true)?;
        Ok(Some(AssignmentNode { name, value: Some(value), append, array: None }))
    }
}

/// Split `NAME=rest` / `NAME+=rest` words into the literal prefix
/// (including `=`) and the value segments.
fn split_assignment(token: &Token) -> Option<(String, Vec<Segment>)> {
    if token.token_type != TokenType::Word {
        return None;
    }
    let first = token.segments.first()?;
    if first.quoting != Quoting::Unquoted {
        return None;
    }
    let eq = first.text.find('=')?;
    let name = first.text[..eq].strip_suffix('+').unwrap_or(&first.text[..eq]);
    if !is_valid_name(name) {
        return None;
    }
    let prefix = first.text[..=eq].to_string();
    let mut value = Vec::new();
    let rest = &first.text[eq + 1..];
    if !rest.is_empty() {
        value.push(Segment { text: rest.to_string(), quoting: Quoting::Unquoted });
    }
    value.extend(token.segments[1..].iter().cloned());
    Some((prefix, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(script: &ScriptNode, stmt: usize) -> &SimpleCommandNode {
        match &script.statements[stmt].pipelines[0].commands[0] {
            CommandNode::Simple(cmd) => cmd,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    fn compound(script: &ScriptNode, stmt: usize) -> &CompoundCommandNode {
        match &script.statements[stmt].pipelines[0].commands[0] {
            CommandNode::Compound(cmd) => cmd,
            other => panic!("expected compound command, got {:?}", other),
        }
    }

    #[test]
    fn test_simple_command() {
        let script = parse("echo hello world").unwrap();
        assert_eq!(script.statements.len(), 1);
        assert_eq!(simple(&script, 0).words.len(), 3);
    }

    #[test]
    fn test_lists_and_operators() {
        let script = parse("a && b || c; d & e\nf").unwrap();
        assert_eq!(script.statements.len(), 4);
        assert_eq!(script.statements[0].operators, vec![StatementOperator::And, StatementOperator::Or]);
        assert!(script.statements[1].background);
        assert!(!script.statements[2].background);
    }

    #[test]
    fn test_pipeline_and_negation() {
        let script = parse("! a | b |\n c").unwrap();
        let pipeline = &script.statements[0].pipelines[0];
        assert!(pipeline.negated);
        assert_eq!(pipeline.commands.len(), 3);
    }

    #[test]
    fn test_assignments() {
        let script = parse("FOO=bar BAZ+=qux cmd X=1").unwrap();
        let cmd = simple(&script, 0);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert!(cmd.assignments[1].append);
        // After the command name, NAME=value is an ordinary word
        assert_eq!(cmd.words.len(), 2);
    }

    #[test]
    fn test_array_assignment() {
        let script = parse("ARR=(one two\n three)").unwrap();
        let cmd = simple(&script, 0);
        assert_eq!(cmd.assignments[0].array.as_ref().map(Vec::len), Some(3));
        // A separated parenthesis is not an array assignment
        assert!(parse("ARR= (one)").is_err());
    }

    #[test]
    fn test_redirections_in_order() {
        let script = parse("cmd >out 2>&1 <in").unwrap();
        let cmd = simple(&script, 0);
        let ops: Vec<_> = cmd.redirections.iter().map(|r| r.operator).collect();
        assert_eq!(ops, vec![RedirectionOperator::Great, RedirectionOperator::GreatAnd, RedirectionOperator::Less]);
        assert_eq!(cmd.redirections[1].fd, Some(2));
    }

    #[test]
    fn test_heredoc_redirection() {
        let script = parse("cat <<EOF\nhi $USER\nEOF\n").unwrap();
        let cmd = simple(&script, 0);
        match &cmd.redirections[0].target {
            RedirectionTarget::HereDoc(doc) => {
                assert_eq!(doc.delimiter, "EOF");
                assert!(!doc.quoted);
                assert_eq!(doc.content.parts.len(), 3);
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn test_subshell_and_group() {
        let script = parse("(a; b) > out; { c; }").unwrap();
        let sub = compound(&script, 0);
        assert!(matches!(&sub.body, CompoundBody::Subshell(list) if list.len() == 2));
        assert_eq!(sub.redirections.len(), 1);
        assert!(matches!(&compound(&script, 1).body, CompoundBody::Group(_)));
    }

    #[test]
    fn test_function_definitions() {
        let script = parse("greet() { echo hi; }\nfunction bye { echo bye; }\nfunction x() ( echo x )").unwrap();
        let names: Vec<_> = script
            .statements
            .iter()
            .map(|s| match &s.pipelines[0].commands[0] {
                CommandNode::FunctionDef(f) => f.name.clone(),
                other => panic!("expected function, got {:?}", other),
            })
            .collect();
        assert_eq!(names, vec!["greet", "bye", "x"]);
    }

    #[test]
    fn test_reserved_words_only_in_command_position() {
        let script = parse("echo if then fi").unwrap();
        assert_eq!(simple(&script, 0).words.len(), 4);
        assert!(parse("fi").is_err());
    }

    #[test]
    fn test_declaration_builtin_tilde() {
        let script = parse("export DIR=~/x").unwrap();
        let word = &simple(&script, 0).words[1];
        assert!(word.parts.iter().any(|p| matches!(p.kind, WordPartKind::Tilde(TildePrefix::Home))));
    }

    #[test]
    fn test_syntax_errors() {
        for bad in ["if true; then", "echo (", "a &&", "while true; do echo; ", "case x in", "{ echo", "(", "| a"] {
            assert!(parse(bad).is_err(), "expected error for {:?}", bad);
        }
        let err = parse("if true; then echo; fi fi").unwrap_err();
        assert_eq!(err.found, "'fi'");
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |open: &str, body: &str, close: &str, n: usize| format!("{}{}{}", open.repeat(n), body, close.repeat(n));

        assert!(parse(&nested("( ", "echo", " )", MAX_PARSER_DEPTH)).is_ok());
        assert!(parse(&nested("( ", "echo", " )", MAX_PARSER_DEPTH + 1)).is_err());

        assert!(parse(&nested("if true; then ", "true", "; fi", MAX_PARSER_DEPTH)).is_ok());
        assert!(parse(&nested("if true; then ", "true", "; fi", MAX_PARSER_DEPTH + 1)).is_err());

        assert!(parse(&nested("echo $(", "echo", ")", MAX_PARSER_DEPTH)).is_ok());
        assert!(parse(&nested("echo $(", "echo", ")", MAX_PARSER_DEPTH + 1)).is_err());
    }

    #[test]
    fn test_nested_parameter_operands_are_bounded() {
        let deep = format!("echo {}x{}", "${a:-".repeat(MAX_PARSER_DEPTH + 5), "}".repeat(MAX_PARSER_DEPTH + 5));
        let err = parse(&deep).unwrap_err();
        assert!(err.to_string().contains("shallower nesting"));
        assert!(parse("echo ${a:-${b:-${c:-x}}}").is_ok());
    }
}
