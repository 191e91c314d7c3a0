//! Compound Command Parser
//!
//! Parsing for if/while/until/for/case. Bodies are nested statement lists.

use crate::ast::types::*;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::SyntaxError;
use crate::parser::word_parser::is_valid_name;

impl Parser<'_> {
    /// Statement list that must contain at least one statement.
    fn parse_required_list(&mut self, terminators: &[&str]) -> Result<Vec<StatementNode>, SyntaxError> {
        let list = self.parse_statement_list(terminators)?;
        if list.is_empty() {
            return Err(self.unexpected("command"));
        }
        Ok(list)
    }

    pub(crate) fn parse_if(&mut self) -> Result<IfNode, SyntaxError> {
        self.expect_reserved("if")?;
        let mut clauses = Vec::new();
        loop {
            let condition = self.parse_required_list(&["then"])?;
            self.expect_reserved("then")?;
            let body = self.parse_required_list(&["elif", "else", "fi"])?;
            clauses.push(IfClause { condition, body });
            if self.peek_is_reserved("elif")? {
                self.advance()?;
                continue;
            }
            break;
        }
        let else_body = if self.peek_is_reserved("else")? {
            self.advance()?;
            Some(self.parse_required_list(&["fi"])?)
        } else {
            None
        };
        self.expect_reserved("fi")?;
        Ok(IfNode { clauses, else_body })
    }

    fn parse_loop_parts(&mut self, keyword: &str) -> Result<(Vec<StatementNode>, Vec<StatementNode>), SyntaxError> {
        self.expect_reserved(keyword)?;
        let condition = self.parse_required_list(&["do"])?;
        let body = self.parse_do_group()?;
        Ok((condition, body))
    }

    fn parse_do_group(&mut self) -> Result<Vec<StatementNode>, SyntaxError> {
        self.expect_reserved("do")?;
        let body = self.parse_required_list(&["done"])?;
        self.expect_reserved("done")?;
        Ok(body)
    }

    pub(crate) fn parse_while(&mut self) -> Result<WhileNode, SyntaxError> {
        let (condition, body) = self.parse_loop_parts("while")?;
        Ok(WhileNode { condition, body })
    }

    pub(crate) fn parse_until(&mut self) -> Result<UntilNode, SyntaxError> {
        let (condition, body) = self.parse_loop_parts("until")?;
        Ok(UntilNode { condition, body })
    }

    /// `for NAME [in WORDS] (; | newline) do LIST done`
    pub(crate) fn parse_for(&mut self) -> Result<ForNode, SyntaxError> {
        self.expect_reserved("for")?;
        let name_token = self.expect_word("loop variable name")?;
        let variable = name_token
            .unquoted_text()
            .filter(|n| is_valid_name(n))
            .ok_or_else(|| SyntaxError::new(name_token.position(), "loop variable name", name_token.describe()))?
            .to_string();

        self.skip_newlines()?;
        let words = if self.peek_is_reserved("in")? {
            self.advance()?;
            let mut words = Vec::new();
            while self.peek_type()? == TokenType::Word {
                let token = self.advance()?;
                words.push(self.word_from_token(&token)?);
            }
            match self.peek_type()? {
                TokenType::Semicolon | TokenType::Newline => {
                    self.advance()?;
                }
                _ => return Err(self.unexpected("';' or newline")),
            }
            Some(words)
        } else {
            if self.peek_type()? == TokenType::Semicolon {
                self.advance()?;
            }
            None
        };
        self.skip_newlines()?;
        let body = self.parse_do_group()?;
        Ok(ForNode { variable, words, body })
    }

    /// `case WORD in [(]PATTERN[|PATTERN]...) LIST ;; ... esac`
    pub(crate) fn parse_case(&mut self) -> Result<CaseNode, SyntaxError> {
        self.expect_reserved("case")?;
        let word_token = self.expect_word("case subject")?;
        let word = self.word_from_token(&word_token)?;
        self.skip_newlines()?;
        self.expect_reserved("in")?;

        let mut items = Vec::new();
        loop {
            self.skip_newlines()?;
            if self.peek_is_reserved("esac")? {
                self.advance()?;
                break;
            }
            if self.peek_type()? == TokenType::LParen {
                self.advance()?;
            }

            let mut patterns = Vec::new();
            loop {
                let token = self.expect_word("case pattern")?;
                patterns.push(self.word_from_token(&token)?);
                if self.peek_type()? == TokenType::Pipe {
                    self.advance()?;
                    continue;
                }
                break;
            }
            self.expect(TokenType::RParen)?;

            let body = self.parse_statement_list(&["esac"])?;
            let at_esac = self.peek_is_reserved("esac")?;
            let terminator = match self.peek_type()? {
                TokenType::DSemi => CaseTerminator::DoubleSemi,
                TokenType::SemiAnd => CaseTerminator::SemiAnd,
                TokenType::SemiSemiAnd => CaseTerminator::SemiSemiAnd,
                _ if at_esac => {
                    // The last item may omit its terminator
                    items.push(CaseItemNode { patterns, body, terminator: CaseTerminator::DoubleSemi });
                    continue;
                }
                _ => return Err(self.unexpected("';;'")),
            };
            self.advance()?;
            items.push(CaseItemNode { patterns, body, terminator });
        }
        Ok(CaseNode { word, items })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::types::*;
    use crate::parser::parse;

    fn body(input: &str) -> CompoundBody {
        let script = parse(input).unwrap();
        match &script.statements[0].pipelines[0].commands[0] {
            CommandNode::Compound(cmd) => cmd.body.clone(),
            other => panic!("expected compound command, got {:?}", other),
        }
    }

    #[test]
    fn test_if_elif_else() {
        match body("if a; then b; elif c; then d; else e; fi") {
            CompoundBody::If(node) => {
                assert_eq!(node.clauses.len(), 2);
                assert!(node.else_body.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("if a; then fi").is_err());
    }

    #[test]
    fn test_loops() {
        assert!(matches!(body("while a; do b; done"), CompoundBody::While(_)));
        assert!(matches!(body("until a\ndo\n b\ndone"), CompoundBody::Until(_)));
    }

    #[test]
    fn test_for_forms() {
        match body("for x in a b c; do echo $x; done") {
            CompoundBody::For(node) => {
                assert_eq!(node.variable, "x");
                assert_eq!(node.words.map(|w| w.len()), Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
        match body("for x\ndo echo; done") {
            CompoundBody::For(node) => assert!(node.words.is_none()),
            other => panic!("unexpected {:?}", other),
        }
        match body("for x in; do echo; done") {
            CompoundBody::For(node) => assert_eq!(node.words.map(|w| w.len()), Some(0)),
            other => panic!("unexpected {:?}", other),
        }
        assert!(parse("for 1x in a; do echo; done").is_err());
    }

    #[test]
    fn test_case_items() {
        match body("case $x in\n (a|b) one;;\n c) two;&\n *) three;;&\n d) four\nesac") {
            CompoundBody::Case(node) => {
                assert_eq!(node.items.len(), 4);
                assert_eq!(node.items[0].patterns.len(), 2);
                assert_eq!(node.items[1].terminator, CaseTerminator::SemiAnd);
                assert_eq!(node.items[2].terminator, CaseTerminator::SemiSemiAnd);
                assert_eq!(node.items[3].terminator, CaseTerminator::DoubleSemi);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Empty bodies are allowed in case items
        assert!(matches!(body("case x in a) ;; esac"), CompoundBody::Case(_)));
    }
}
