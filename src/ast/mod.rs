//! Abstract Syntax Tree (AST) Types for shell scripts
//!
//! This module defines the AST produced by the parser and walked by the
//! execution engine.
//!
//! Architecture:
//!   Input → Lexer → Parser → AST → Expander → Interpreter → Output

pub mod types;
