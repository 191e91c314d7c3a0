//! Parser module for shell scripts
//!
//! This module contains the lexer and the recursive-descent parser.

pub mod types;
pub mod lexer;
pub mod arithmetic_parser;
pub mod word_parser;
pub mod compound_parser;
pub mod parser;

// Re-exports
pub use types::SyntaxError;
pub use lexer::{Lexer, Segment, Token, TokenType};
pub use arithmetic_parser::parse_arithmetic_expression;
pub use parser::{parse, Parser};
