//! Arithmetic Expression Parser
//!
//! Parses shell arithmetic expressions like:
//! - $((1 + 2))
//! - $((x++))
//! - $((a ? b : c))
//! - $((2#1010))
//!
//! The input is the already-expanded text of the `$((...))` body.

use thiserror::Error;

use crate::ast::types::{ArithAssignmentOperator, ArithBinaryOperator, ArithExpr, ArithUnaryOperator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (error token is \"{token}\")")]
pub struct ArithmeticParseError {
    pub message: String,
    pub token: String,
}

type ParseResult = Result<ArithExpr, ArithmeticParseError>;

/// Nesting limit for parenthesized, unary and right-associative operands
pub const MAX_ARITH_NESTING: usize = 256;
/// Height limit for a parsed expression tree, binary operator chains included
pub const MAX_ARITH_HEIGHT: usize = 4096;

/// Assignment operators, longest first
const ARITH_ASSIGN_OPS: &[(&str, ArithAssignmentOperator)] = &[
    ("<<=", ArithAssignmentOperator::LShiftAssign),
    (">>=", ArithAssignmentOperator::RShiftAssign),
    ("+=", ArithAssignmentOperator::AddAssign),
    ("-=", ArithAssignmentOperator::SubAssign),
    ("*=", ArithAssignmentOperator::MulAssign),
    ("/=", ArithAssignmentOperator::DivAssign),
    ("%=", ArithAssignmentOperator::ModAssign),
    ("&=", ArithAssignmentOperator::AndAssign),
    ("|=", ArithAssignmentOperator::OrAssign),
    ("^=", ArithAssignmentOperator::XorAssign),
    ("=", ArithAssignmentOperator::Assign),
];

/// Parse an arithmetic expression string into an AST node
pub fn parse_arithmetic_expression(input: &str) -> ParseResult {
    let mut parser = ArithParser { input, pos: 0, nesting: 0, height: 0 };
    parser.skip_whitespace();
    if parser.at_end() {
        // $(( )) evaluates to 0
        return Ok(ArithExpr::Number(0));
    }
    let expr = parser.parse_comma()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        let remaining = parser.input[parser.pos..].trim().to_string();
        return Err(parser.error("syntax error: invalid arithmetic operator", remaining));
    }
    Ok(expr)
}

struct ArithParser<'a> {
    input: &'a str,
    pos: usize,
    nesting: usize,
    height: usize,
}

impl<'a> ArithParser<'a> {
    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn error(&self, message: &str, token: impl Into<String>) -> ArithmeticParseError {
        ArithmeticParseError {
            message: message.to_string(),
            token: token.into(),
        }
    }

    fn too_deep(&self) -> ArithmeticParseError {
        let near: String = self.rest().trim_start().chars().take(16).collect();
        self.error("expression nested too deeply", near)
    }

    /// Grow the tree being built by one level.
    fn descend(&mut self) -> Result<(), ArithmeticParseError> {
        self.height += 1;
        if self.height > MAX_ARITH_HEIGHT {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// Parse a sub-expression through a recursive call.
    fn nested(&mut self, parse: fn(&mut Self) -> ParseResult) -> ParseResult {
        self.nesting += 1;
        if self.nesting > MAX_ARITH_NESTING {
            return Err(self.too_deep());
        }
        self.descend()?;
        let expr = parse(self)?;
        self.height -= 1;
        self.nesting -= 1;
        Ok(expr)
    }

    /// Consume `op` if it appears next and is not the prefix of one of
    /// the `not_followed_by` characters.
    fn eat(&mut self, op: &str, not_followed_by: &[char]) -> bool {
        self.skip_whitespace();
        let rest = self.rest();
        if let Some(after) = rest.strip_prefix(op) {
            if after.chars().next().is_some_and(|c| not_followed_by.contains(&c)) {
                return false;
            }
            self.pos += op.len();
            return true;
        }
        false
    }

    fn parse_comma(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_assignment()?;
        while self.eat(",", &[]) {
            self.descend()?;
            let right = self.parse_assignment()?;
            left = binary(ArithBinaryOperator::Comma, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_assignment(&mut self) -> ParseResult {
        self.skip_whitespace();
        let start = self.pos;
        let name_len = self
            .rest()
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        let looks_like_name = name_len > 0 && !self.rest().as_bytes()[0].is_ascii_digit();
        if looks_like_name {
            let name = self.rest()[..name_len].to_string();
            self.pos += name_len;
            self.skip_whitespace();
            for (op, operator) in ARITH_ASSIGN_OPS {
                let rest = self.rest();
                if rest.starts_with(op) {
                    // `==` is comparison, not assignment
                    if *op == "=" && rest.starts_with("==") {
                        break;
                    }
                    self.pos += op.len();
                    let value = self.nested(Self::parse_assignment)?;
                    return Ok(ArithExpr::Assignment {
                        operator: *operator,
                        name,
                        value: Box::new(value),
                    });
                }
            }
            self.pos = start;
        }
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> ParseResult {
        let condition = self.parse_logical_or()?;
        if self.eat("?", &[]) {
            let consequent = self.nested(Self::parse_assignment)?;
            if !self.eat(":", &[]) {
                return Err(self.error("syntax error: expected ':'", self.rest().trim()));
            }
            let alternate = self.nested(Self::parse_assignment)?;
            return Ok(ArithExpr::Ternary {
                condition: Box::new(condition),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }
        Ok(condition)
    }

    fn parse_logical_or(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_logical_and()?;
        while self.eat("||", &[]) {
            self.descend()?;
            let right = self.parse_logical_and()?;
            left = binary(ArithBinaryOperator::LogOr, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_bitwise_or()?;
        while self.eat("&&", &[]) {
            self.descend()?;
            let right = self.parse_bitwise_or()?;
            left = binary(ArithBinaryOperator::LogAnd, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_bitwise_xor()?;
        while self.eat("|", &['|', '=']) {
            self.descend()?;
            let right = self.parse_bitwise_xor()?;
            left = binary(ArithBinaryOperator::BitOr, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_bitwise_xor(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_bitwise_and()?;
        while self.eat("^", &['=']) {
            self.descend()?;
            let right = self.parse_bitwise_and()?;
            left = binary(ArithBinaryOperator::BitXor, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_bitwise_and(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_equality()?;
        while self.eat("&", &['&', '=']) {
            self.descend()?;
            let right = self.parse_equality()?;
            left = binary(ArithBinaryOperator::BitAnd, left, right);
        }
        self.height = base;
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_relational()?;
        loop {
            let operator = if self.eat("==", &[]) {
                ArithBinaryOperator::Eq
            } else if self.eat("!=", &[]) {
                ArithBinaryOperator::Ne
            } else {
                self.height = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_relational()?;
            left = binary(operator, left, right);
        }
    }

    fn parse_relational(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_shift()?;
        loop {
            let operator = if self.eat("<=", &[]) {
                ArithBinaryOperator::Le
            } else if self.eat(">=", &[]) {
                ArithBinaryOperator::Ge
            } else if self.eat("<", &['<']) {
                ArithBinaryOperator::Lt
            } else if self.eat(">", &['>']) {
                ArithBinaryOperator::Gt
            } else {
                self.height = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_shift()?;
            left = binary(operator, left, right);
        }
    }

    fn parse_shift(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_additive()?;
        loop {
            let operator = if self.eat("<<", &['=']) {
                ArithBinaryOperator::LShift
            } else if self.eat(">>", &['=']) {
                ArithBinaryOperator::RShift
            } else {
                self.height = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_additive()?;
            left = binary(operator, left, right);
        }
    }

    fn parse_additive(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_multiplicative()?;
        loop {
            let operator = if self.eat("+", &['+', '=']) {
                ArithBinaryOperator::Add
            } else if self.eat("-", &['-', '=']) {
                ArithBinaryOperator::Sub
            } else {
                self.height = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_multiplicative()?;
            left = binary(operator, left, right);
        }
    }

    fn parse_multiplicative(&mut self) -> ParseResult {
        let base = self.height;
        let mut left = self.parse_power()?;
        loop {
            let operator = if self.eat("*", &['*', '=']) {
                ArithBinaryOperator::Mul
            } else if self.eat("/", &['=']) {
                ArithBinaryOperator::Div
            } else if self.eat("%", &['=']) {
                ArithBinaryOperator::Mod
            } else {
                self.height = base;
                return Ok(left);
            };
            self.descend()?;
            let right = self.parse_power()?;
            left = binary(operator, left, right);
        }
    }

    fn parse_power(&mut self) -> ParseResult {
        let base = self.parse_unary()?;
        if self.eat("**", &[]) {
            // Right associative
            let exponent = self.nested(Self::parse_power)?;
            return Ok(binary(ArithBinaryOperator::Pow, base, exponent));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> ParseResult {
        self.skip_whitespace();
        for (op, increment) in [("++", true), ("--", false)] {
            if self.eat(op, &[]) {
                self.skip_whitespace();
                let name = self.parse_name().ok_or_else(|| self.error("syntax error: operand expected", op))?;
                return Ok(ArithExpr::IncDec { name, increment, prefix: true });
            }
        }
        let operator = if self.eat("-", &[]) {
            ArithUnaryOperator::Neg
        } else if self.eat("+", &[]) {
            ArithUnaryOperator::Pos
        } else if self.eat("!", &['=']) {
            ArithUnaryOperator::Not
        } else if self.eat("~", &[]) {
            ArithUnaryOperator::BitNot
        } else {
            return self.parse_postfix();
        };
        let operand = self.nested(Self::parse_unary)?;
        Ok(ArithExpr::Unary { operator, operand: Box::new(operand) })
    }

    fn parse_postfix(&mut self) -> ParseResult {
        let primary = self.parse_primary()?;
        if let ArithExpr::Variable(name) = &primary {
            for (op, increment) in [("++", true), ("--", false)] {
                if self.eat(op, &[]) {
                    return Ok(ArithExpr::IncDec { name: name.clone(), increment, prefix: false });
                }
            }
        }
        Ok(primary)
    }

    fn parse_primary(&mut self) -> ParseResult {
        self.skip_whitespace();
        if self.eat("(", &[]) {
            let inner = self.nested(Self::parse_comma)?;
            if !self.eat(")", &[]) {
                return Err(self.error("syntax error: expected ')'", self.rest().trim()));
            }
            return Ok(inner);
        }
        let rest = self.rest();
        match rest.chars().next() {
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => match self.parse_name() {
                Some(name) => Ok(ArithExpr::Variable(name)),
                None => Err(self.error("syntax error: operand expected", rest.trim())),
            },
            Some(_) => Err(self.error("syntax error: operand expected", rest.trim())),
            None => Err(self.error("syntax error: operand expected", "")),
        }
    }

    fn parse_name(&mut self) -> Option<String> {
        let rest = self.rest();
        let first = rest.chars().next()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let len = rest.bytes().take_while(|b| b.is_ascii_alphanumeric() || *b == b'_').count();
        self.pos += len;
        Some(rest[..len].to_string())
    }

    fn parse_number(&mut self) -> ParseResult {
        let rest = self.rest();
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'#' || *b == b'_' || *b == b'@')
            .count();
        let text = &rest[..len];
        self.pos += len;
        parse_arith_number(text)
            .map(ArithExpr::Number)
            .ok_or_else(|| self.error("value too great for base", text))
    }
}

fn binary(operator: ArithBinaryOperator, left: ArithExpr, right: ArithExpr) -> ArithExpr {
    ArithExpr::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// Parse an integer literal: decimal, `0x` hex, leading-zero octal, or `base#digits`.
pub fn parse_arith_number(text: &str) -> Option<i64> {
    if let Some((base, digits)) = text.split_once('#') {
        let base: u32 = base.parse().ok()?;
        if !(2..=64).contains(&base) || digits.is_empty() {
            return None;
        }
        let mut value: i64 = 0;
        for c in digits.chars() {
            let digit = match c {
                '0'..='9' => c as u32 - '0' as u32,
                'a'..='z' => c as u32 - 'a' as u32 + 10,
                'A'..='Z' if base <= 36 => c as u32 - 'A' as u32 + 10,
                'A'..='Z' => c as u32 - 'A' as u32 + 36,
                '@' => 62,
                '_' => 63,
                _ => return None,
            };
            if digit >= base {
                return None;
            }
            value = value.wrapping_mul(base as i64).wrapping_add(digit as i64);
        }
        return Some(value);
    }
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> ArithExpr {
        ArithExpr::Number(n)
    }

    #[test]
    fn test_simple_number() {
        assert_eq!(parse_arithmetic_expression("42").unwrap(), num(42));
        assert_eq!(parse_arithmetic_expression("  ").unwrap(), num(0));
    }

    #[test]
    fn test_precedence() {
        let expr = parse_arithmetic_expression("1 + 2 * 3").unwrap();
        assert_eq!(expr, binary(ArithBinaryOperator::Add, num(1), binary(ArithBinaryOperator::Mul, num(2), num(3))));
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_arithmetic_expression("2 ** 3 ** 2").unwrap();
        assert_eq!(expr, binary(ArithBinaryOperator::Pow, num(2), binary(ArithBinaryOperator::Pow, num(3), num(2))));
    }

    #[test]
    fn test_assignment() {
        let expr = parse_arithmetic_expression("x += 5").unwrap();
        assert_eq!(
            expr,
            ArithExpr::Assignment {
                operator: ArithAssignmentOperator::AddAssign,
                name: "x".into(),
                value: Box::new(num(5)),
            }
        );
        // Equality is not assignment
        assert!(matches!(
            parse_arithmetic_expression("x == 5").unwrap(),
            ArithExpr::Binary { operator: ArithBinaryOperator::Eq, .. }
        ));
    }

    #[test]
    fn test_ternary() {
        assert!(matches!(parse_arithmetic_expression("a ? 1 : 2").unwrap(), ArithExpr::Ternary { .. }));
    }

    #[test]
    fn test_increment() {
        assert_eq!(
            parse_arithmetic_expression("i++").unwrap(),
            ArithExpr::IncDec { name: "i".into(), increment: true, prefix: false }
        );
        assert_eq!(
            parse_arithmetic_expression("--i").unwrap(),
            ArithExpr::IncDec { name: "i".into(), increment: false, prefix: true }
        );
    }

    #[test]
    fn test_number_bases() {
        assert_eq!(parse_arith_number("0x1F"), Some(31));
        assert_eq!(parse_arith_number("017"), Some(15));
        assert_eq!(parse_arith_number("2#1010"), Some(10));
        assert_eq!(parse_arith_number("08"), None);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_arithmetic_expression("1 +").is_err());
        assert!(parse_arithmetic_expression("(1").is_err());
        let err = parse_arithmetic_expression("1 2").unwrap_err();
        assert_eq!(err.token, "2");
    }

    #[test]
    fn test_nesting_limit() {
        let n = MAX_ARITH_NESTING;
        let parens = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert!(parse_arithmetic_expression(&parens(n)).is_ok());
        let err = parse_arithmetic_expression(&parens(n + 1)).unwrap_err();
        assert_eq!(err.message, "expression nested too deeply");

        assert!(parse_arithmetic_expression(&format!("{}1", "- ".repeat(5000))).is_err());
        assert!(parse_arithmetic_expression(&format!("1{}", "+1".repeat(2000))).is_ok());
        let err = parse_arithmetic_expression(&format!("1{}", "+1".repeat(MAX_ARITH_HEIGHT + 1))).unwrap_err();
        assert_eq!(err.message, "expression nested too deeply");
    }
}
