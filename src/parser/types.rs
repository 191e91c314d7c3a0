//! Parser Types and Constants
//!
//! Shared types and limits used across parser modules.

use thiserror::Error;

use crate::ast::types::Position;

// Parser limits to prevent hangs and resource exhaustion
pub const MAX_INPUT_SIZE: usize = 1_000_000; // 1MB max input
pub const MAX_PARSER_DEPTH: usize = 32; // Max nesting of compound commands, substitutions and expansions

/// Lexing or grammar failure. Parsing is all-or-nothing: when this is
/// returned no part of the script has been executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at {position}: expected {expected}, found {found}")]
pub struct SyntaxError {
    pub position: Position,
    pub expected: String,
    pub found: String,
}

impl SyntaxError {
    pub fn new(position: Position, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = SyntaxError::new(Position::new(2, 5, 10), "'fi'", "end of input");
        assert_eq!(
            err.to_string(),
            "syntax error at line 2, column 5: expected 'fi', found end of input"
        );
    }
}
