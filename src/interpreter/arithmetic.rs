//! Arithmetic Evaluation
//!
//! Evaluates `$((...))` expressions over 64-bit signed integers with
//! wrapping overflow. Variables holding non-numeric text are themselves
//! evaluated as expressions, up to a fixed nesting depth.

use crate::ast::types::{ArithAssignmentOperator, ArithBinaryOperator, ArithExpr, ArithUnaryOperator};
use crate::interpreter::environment::Environment;
use crate::interpreter::errors::{ArithmeticError, ExpansionError};
use crate::parser::arithmetic_parser::{parse_arith_number, MAX_ARITH_HEIGHT};
use crate::parser::parse_arithmetic_expression;
use crate::parser::word_parser::is_valid_name;

/// Nesting limit for variables whose values are expressions
const MAX_ARITH_DEPTH: usize = 64;
/// Limit on nodes being evaluated at once, across variable indirections
const MAX_EVAL_HEIGHT: usize = 2 * MAX_ARITH_HEIGHT;

// ============================================================================
// Operators
// ============================================================================

fn apply_binary_op(left: i64, right: i64, operator: ArithBinaryOperator) -> Result<i64, String> {
    Ok(match operator {
        ArithBinaryOperator::Add => left.wrapping_add(right),
        ArithBinaryOperator::Sub => left.wrapping_sub(right),
        ArithBinaryOperator::Mul => left.wrapping_mul(right),
        ArithBinaryOperator::Div | ArithBinaryOperator::Mod if right == 0 => {
            return Err("division by 0".to_string())
        }
        ArithBinaryOperator::Div => left.wrapping_div(right),
        ArithBinaryOperator::Mod => left.wrapping_rem(right),
        ArithBinaryOperator::Pow => {
            if right < 0 {
                return Err("exponent less than 0".to_string());
            }
            left.wrapping_pow(right.min(u32::MAX as i64) as u32)
        }
        ArithBinaryOperator::LShift => left.wrapping_shl(right as u32),
        ArithBinaryOperator::RShift => left.wrapping_shr(right as u32),
        ArithBinaryOperator::Lt => (left < right) as i64,
        ArithBinaryOperator::Le => (left <= right) as i64,
        ArithBinaryOperator::Gt => (left > right) as i64,
        ArithBinaryOperator::Ge => (left >= right) as i64,
        ArithBinaryOperator::Eq => (left == right) as i64,
        ArithBinaryOperator::Ne => (left != right) as i64,
        ArithBinaryOperator::BitAnd => left & right,
        ArithBinaryOperator::BitOr => left | right,
        ArithBinaryOperator::BitXor => left ^ right,
        // Short-circuit forms are resolved by the evaluator
        ArithBinaryOperator::LogAnd => (left != 0 && right != 0) as i64,
        ArithBinaryOperator::LogOr => (left != 0 || right != 0) as i64,
        ArithBinaryOperator::Comma => right,
    })
}

fn assignment_binary_op(operator: ArithAssignmentOperator) -> Option<ArithBinaryOperator> {
    Some(match operator {
        ArithAssignmentOperator::Assign => return None,
        ArithAssignmentOperator::AddAssign => ArithBinaryOperator::Add,
        ArithAssignmentOperator::SubAssign => ArithBinaryOperator::Sub,
        ArithAssignmentOperator::MulAssign => ArithBinaryOperator::Mul,
        ArithAssignmentOperator::DivAssign => ArithBinaryOperator::Div,
        ArithAssignmentOperator::ModAssign => ArithBinaryOperator::Mod,
        ArithAssignmentOperator::LShiftAssign => ArithBinaryOperator::LShift,
        ArithAssignmentOperator::RShiftAssign => ArithBinaryOperator::RShift,
        ArithAssignmentOperator::AndAssign => ArithBinaryOperator::BitAnd,
        ArithAssignmentOperator::OrAssign => ArithBinaryOperator::BitOr,
        ArithAssignmentOperator::XorAssign => ArithBinaryOperator::BitXor,
    })
}

fn apply_unary_op(operand: i64, operator: ArithUnaryOperator) -> i64 {
    match operator {
        ArithUnaryOperator::Neg => operand.wrapping_neg(),
        ArithUnaryOperator::Pos => operand,
        ArithUnaryOperator::Not => (operand == 0) as i64,
        ArithUnaryOperator::BitNot => !operand,
    }
}

// ============================================================================
// Evaluation
// ============================================================================

struct Evaluator<'a> {
    env: &'a mut Environment,
    source: &'a str,
    height: usize,
}

impl Evaluator<'_> {
    fn error(&self, message: impl Into<String>) -> ExpansionError {
        ArithmeticError::new(self.source, message).into()
    }

    /// Numeric value of a variable. Empty and unset read as 0.
    fn variable(&mut self, name: &str, depth: usize) -> Result<i64, ExpansionError> {
        if depth > MAX_ARITH_DEPTH {
            return Err(self.error("expression recursion level exceeded"));
        }
        let value = self.env.get_value(name).unwrap_or_default();
        let value = value.trim();
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(n) = parse_arith_number(value) {
            return Ok(n);
        }
        if is_valid_name(value) {
            return self.variable(value, depth + 1);
        }
        let expr = parse_arithmetic_expression(value).map_err(|e| self.error(e.to_string()))?;
        self.eval(&expr, depth + 1)
    }

    fn assign(&mut self, name: &str, value: i64) -> Result<i64, ExpansionError> {
        let export = self.env.get(name).is_some_and(|v| v.exported);
        self.env.set(name, value.to_string(), export, false)?;
        Ok(value)
    }

    fn eval(&mut self, expr: &ArithExpr, depth: usize) -> Result<i64, ExpansionError> {
        if self.height >= MAX_EVAL_HEIGHT {
            return Err(self.error("expression recursion level exceeded"));
        }
        self.height += 1;
        let value = self.eval_node(expr, depth);
        self.height -= 1;
        value
    }

    fn eval_node(&mut self, expr: &ArithExpr, depth: usize) -> Result<i64, ExpansionError> {
        match expr {
            ArithExpr::Number(n) => Ok(*n),
            ArithExpr::Variable(name) => self.variable(name, depth),
            ArithExpr::Unary { operator, operand } => {
                let value = self.eval(operand, depth)?;
                Ok(apply_unary_op(value, *operator))
            }
            ArithExpr::Binary { operator: ArithBinaryOperator::LogAnd, left, right } => {
                if self.eval(left, depth)? == 0 {
                    return Ok(0);
                }
                Ok((self.eval(right, depth)? != 0) as i64)
            }
            ArithExpr::Binary { operator: ArithBinaryOperator::LogOr, left, right } => {
                if self.eval(left, depth)? != 0 {
                    return Ok(1);
                }
                Ok((self.eval(right, depth)? != 0) as i64)
            }
            ArithExpr::Binary { operator, left, right } => {
                let l = self.eval(left, depth)?;
                let r = self.eval(right, depth)?;
                apply_binary_op(l, r, *operator).map_err(|m| self.error(m))
            }
            ArithExpr::Assignment { operator, name, value } => {
                let rhs = self.eval(value, depth)?;
                let result = match assignment_binary_op(*operator) {
                    None => rhs,
                    Some(op) => {
                        let current = self.variable(name, depth)?;
                        apply_binary_op(current, rhs, op).map_err(|m| self.error(m))?
                    }
                };
                self.assign(name, result)
            }
            ArithExpr::IncDec { name, increment, prefix } => {
                let current = self.variable(name, depth)?;
                let updated = if *increment {
                    current.wrapping_add(1)
                } else {
                    current.wrapping_sub(1)
                };
                self.assign(name, updated)?;
                Ok(if *prefix { updated } else { current })
            }
            ArithExpr::Ternary { condition, consequent, alternate } => {
                if self.eval(condition, depth)? != 0 {
                    self.eval(consequent, depth)
                } else {
                    self.eval(alternate, depth)
                }
            }
        }
    }
}

/// Evaluate a parsed expression. `source` is the expression text used in
/// error messages.
pub fn evaluate_arithmetic(env: &mut Environment, expr: &ArithExpr, source: &str) -> Result<i64, ExpansionError> {
    Evaluator { env, source, height: 0 }.eval(expr, 0)
}

/// Parse and evaluate expression text (already expanded).
pub fn evaluate_arithmetic_text(env: &mut Environment, text: &str) -> Result<i64, ExpansionError> {
    let source = text.trim();
    let expr = parse_arithmetic_expression(text)
        .map_err(|e| ExpansionError::from(ArithmeticError::new(source, e.to_string())))?;
    evaluate_arithmetic(env, &expr, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(env: &mut Environment, text: &str) -> Result<i64, ExpansionError> {
        evaluate_arithmetic_text(env, text)
    }

    #[test]
    fn test_precedence() {
        let mut env = Environment::new();
        assert_eq!(eval(&mut env, "1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval(&mut env, "(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval(&mut env, "2 ** 3 ** 2").unwrap(), 512);
        assert_eq!(eval(&mut env, "-3 % 2").unwrap(), -1);
        assert_eq!(eval(&mut env, "1 < 2 && 3 > 4 || 5").unwrap(), 1);
        assert_eq!(eval(&mut env, "0 ? 10 : 20").unwrap(), 20);
        assert_eq!(eval(&mut env, "").unwrap(), 0);
    }

    #[test]
    fn test_division_by_zero() {
        let mut env = Environment::new();
        let err = eval(&mut env, "1 / 0").unwrap_err();
        assert_eq!(err.to_string(), "1 / 0: division by 0");
        assert!(eval(&mut env, "5 % 0").is_err());
    }

    #[test]
    fn test_variables_and_assignment() {
        let mut env = Environment::new();
        env.set("x", "5", false, false).unwrap();
        env.set("ref", "x", false, false).unwrap();
        env.set("expr", "x * 2", false, false).unwrap();
        assert_eq!(eval(&mut env, "x + 1").unwrap(), 6);
        assert_eq!(eval(&mut env, "ref").unwrap(), 5);
        assert_eq!(eval(&mut env, "expr + 1").unwrap(), 11);
        assert_eq!(eval(&mut env, "unset_var + 1").unwrap(), 1);

        assert_eq!(eval(&mut env, "x += 2").unwrap(), 7);
        assert_eq!(eval(&mut env, "x++").unwrap(), 7);
        assert_eq!(env.get_value("x").as_deref(), Some("8"));
        assert_eq!(eval(&mut env, "--x").unwrap(), 7);
        assert_eq!(eval(&mut env, "y = 3, y * y").unwrap(), 9);
    }

    #[test]
    fn test_short_circuit_skips_side_effects() {
        let mut env = Environment::new();
        assert_eq!(eval(&mut env, "0 && (n = 1)").unwrap(), 0);
        assert_eq!(eval(&mut env, "1 || (n = 1)").unwrap(), 1);
        assert!(env.get("n").is_none());
    }

    #[test]
    fn test_self_reference_is_bounded() {
        let mut env = Environment::new();
        env.set("a", "a", false, false).unwrap();
        assert!(eval(&mut env, "a").is_err());
    }

    #[test]
    fn test_deep_expressions_are_errors() {
        let mut env = Environment::new();
        let deep = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        let err = eval(&mut env, &deep).unwrap_err();
        assert!(err.to_string().contains("expression nested too deeply"));

        let long_sum = format!("1{}", "+1".repeat(1000));
        assert_eq!(eval(&mut env, &long_sum).unwrap(), 1001);
        assert_eq!(eval(&mut env, &format!("{}7{}", "(".repeat(100), ")".repeat(100))).unwrap(), 7);
    }
}
