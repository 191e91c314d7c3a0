//! Abstract Syntax Tree (AST) Types
//!
//! This module defines the complete AST structure for shell scripts.
//! The tree is built once per `exec` call and is read-only during execution.

use std::fmt;
use std::sync::Arc;

/// Builtins whose `NAME=value` arguments are parsed and expanded like
/// assignments: no field splitting, tilde after `=` and `:`.
pub const DECLARATION_BUILTINS: &[&str] = &["export", "local", "readonly", "declare"];

// =============================================================================
// BASE TYPES
// =============================================================================

/// Position information for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

// =============================================================================
// SCRIPT & STATEMENTS
// =============================================================================

/// Root node: a complete script (a sequential list)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScriptNode {
    pub statements: Vec<StatementNode>,
}

/// A statement is a list of pipelines connected by && or ||,
/// terminated by `;`, a newline, or `&`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementNode {
    pub pipelines: Vec<PipelineNode>,
    /// Operators between pipelines (`operators.len() == pipelines.len() - 1`)
    pub operators: Vec<StatementOperator>,
    /// Run in background?
    pub background: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementOperator {
    And, // &&
    Or,  // ||
}

// =============================================================================
// PIPELINES & COMMANDS
// =============================================================================

/// A pipeline: cmd1 | cmd2 | cmd3
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineNode {
    pub commands: Vec<CommandNode>,
    /// Negate exit status with !
    pub negated: bool,
}

/// Union of all command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandNode {
    Simple(SimpleCommandNode),
    Compound(CompoundCommandNode),
    FunctionDef(Arc<FunctionDefNode>),
}

/// Simple command: assignments, argv words and redirections
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleCommandNode {
    /// Variable assignments before command: VAR=value cmd
    pub assignments: Vec<AssignmentNode>,
    /// Command name followed by its arguments (empty for assignment-only)
    pub words: Vec<WordNode>,
    /// I/O redirections in declaration order
    pub redirections: Vec<RedirectionNode>,
    pub position: Position,
}

/// Compound command with the redirections attached to it
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundCommandNode {
    pub body: CompoundBody,
    pub redirections: Vec<RedirectionNode>,
}

/// Control structures
#[derive(Debug, Clone, PartialEq)]
pub enum CompoundBody {
    If(IfNode),
    For(ForNode),
    While(WhileNode),
    Until(UntilNode),
    Case(CaseNode),
    /// ( ... ): runs against an isolated environment snapshot
    Subshell(Vec<StatementNode>),
    /// { ...; }: runs in the current environment
    Group(Vec<StatementNode>),
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

/// if statement
#[derive(Debug, Clone, PartialEq)]
pub struct IfNode {
    pub clauses: Vec<IfClause>,
    pub else_body: Option<Vec<StatementNode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfClause {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

/// for loop: for VAR in WORDS; do ...; done
#[derive(Debug, Clone, PartialEq)]
pub struct ForNode {
    pub variable: String,
    /// Words to iterate over (None = "$@")
    pub words: Option<Vec<WordNode>>,
    pub body: Vec<StatementNode>,
}

/// while loop
#[derive(Debug, Clone, PartialEq)]
pub struct WhileNode {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

/// until loop
#[derive(Debug, Clone, PartialEq)]
pub struct UntilNode {
    pub condition: Vec<StatementNode>,
    pub body: Vec<StatementNode>,
}

/// case statement
#[derive(Debug, Clone, PartialEq)]
pub struct CaseNode {
    pub word: WordNode,
    pub items: Vec<CaseItemNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseItemNode {
    pub patterns: Vec<WordNode>,
    pub body: Vec<StatementNode>,
    pub terminator: CaseTerminator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseTerminator {
    DoubleSemi,  // ;;
    SemiAnd,     // ;&
    SemiSemiAnd, // ;;&
}

// =============================================================================
// FUNCTIONS
// =============================================================================

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefNode {
    pub name: String,
    pub body: CompoundCommandNode,
}

// =============================================================================
// ASSIGNMENTS
// =============================================================================

/// Variable assignment: VAR=value, VAR+=value or VAR=(a b c)
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub name: String,
    pub value: Option<WordNode>,
    /// Append mode: VAR+=value
    pub append: bool,
    /// Array assignment: VAR=(a b c)
    pub array: Option<Vec<WordNode>>,
}

// =============================================================================
// REDIRECTIONS
// =============================================================================

/// I/O redirection
#[derive(Debug, Clone, PartialEq)]
pub struct RedirectionNode {
    /// File descriptor (default depends on operator)
    pub fd: Option<i32>,
    pub operator: RedirectionOperator,
    pub target: RedirectionTarget,
}

impl RedirectionNode {
    /// The file descriptor this redirection applies to.
    pub fn target_fd(&self) -> i32 {
        self.fd.unwrap_or(match self.operator {
            RedirectionOperator::Less
            | RedirectionOperator::LessAnd
            | RedirectionOperator::DLess
            | RedirectionOperator::DLessDash
            | RedirectionOperator::TLess => 0,
            _ => 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectionTarget {
    Word(WordNode),
    HereDoc(HereDocNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionOperator {
    Less,      // <
    Great,     // >
    DGreat,    // >>
    GreatAnd,  // >&
    LessAnd,   // <&
    AndGreat,  // &>
    TLess,     // <<<
    DLess,     // <<
    DLessDash, // <<-
}

impl fmt::Display for RedirectionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Less => write!(f, "<"),
            Self::Great => write!(f, ">"),
            Self::DGreat => write!(f, ">>"),
            Self::GreatAnd => write!(f, ">&"),
            Self::LessAnd => write!(f, "<&"),
            Self::AndGreat => write!(f, "&>"),
            Self::TLess => write!(f, "<<<"),
            Self::DLess => write!(f, "<<"),
            Self::DLessDash => write!(f, "<<-"),
        }
    }
}

/// Here document
#[derive(Debug, Clone, PartialEq)]
pub struct HereDocNode {
    pub delimiter: String,
    pub content: WordNode,
    /// Quoted delimiter means no expansion
    pub quoted: bool,
}

// =============================================================================
// WORDS (the heart of shell parsing)
// =============================================================================

/// Quoting context a word segment appeared in.
///
/// Gates which expansion stages apply: only `Unquoted` segments undergo
/// tilde expansion, field splitting and pathname expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quoting {
    Unquoted,
    SingleQuoted,
    DoubleQuoted,
    /// Backslash-escaped character
    Escaped,
}

impl Quoting {
    pub fn is_quoted(self) -> bool {
        !matches!(self, Quoting::Unquoted)
    }
}

/// A Word is a sequence of parts that form a single shell word.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WordNode {
    pub parts: Vec<WordPart>,
    /// Source text of the word as written (used to re-splice aliases)
    pub source: String,
}

impl WordNode {
    pub fn new(parts: Vec<WordPart>, source: impl Into<String>) -> Self {
        Self { parts, source: source.into() }
    }

    /// Unquoted literal word made of a single run of text.
    pub fn literal(value: &str) -> Self {
        Self::new(vec![WordPart::literal(value, Quoting::Unquoted)], value)
    }

    /// The word's text if it consists only of unquoted literal parts.
    pub fn as_unquoted_literal(&self) -> Option<String> {
        let mut out = String::new();
        for part in &self.parts {
            match (&part.kind, part.quoting) {
                (WordPartKind::Literal(value), Quoting::Unquoted) => out.push_str(value),
                _ => return None,
            }
        }
        if out.is_empty() { None } else { Some(out) }
    }

    /// True when any part carries quoting (so an empty result still yields a field).
    pub fn has_quoted_part(&self) -> bool {
        self.parts.iter().any(|p| p.quoting.is_quoted())
    }
}

/// One segment of a word, tagged with the quoting context it appeared in.
#[derive(Debug, Clone, PartialEq)]
pub struct WordPart {
    pub kind: WordPartKind,
    pub quoting: Quoting,
}

impl WordPart {
    pub fn new(kind: WordPartKind, quoting: Quoting) -> Self {
        Self { kind, quoting }
    }

    pub fn literal(value: &str, quoting: Quoting) -> Self {
        Self::new(WordPartKind::Literal(value.to_string()), quoting)
    }
}

/// Parts that can make up a word
#[derive(Debug, Clone, PartialEq)]
pub enum WordPartKind {
    /// Literal text (no special meaning)
    Literal(String),
    /// Leading `~`, `~+`, `~-` or `~user`
    Tilde(TildePrefix),
    /// $VAR or ${VAR...}
    Parameter(ParameterExpansionPart),
    /// $(...) or `...`
    CommandSubstitution(CommandSubstitutionPart),
    /// $((...))
    Arithmetic(ArithmeticExpansionPart),
    /// Malformed ${...}; reported when the word is expanded
    BadSubstitution(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TildePrefix {
    Home,
    Pwd,
    OldPwd,
    User(String),
}

// =============================================================================
// PARAMETER EXPANSION
// =============================================================================

/// Parameter/variable expansion: $VAR or ${VAR...}
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterExpansionPart {
    pub parameter: String,
    /// Subscript for ${NAME[...]}
    pub index: Option<ArrayIndex>,
    pub operation: Option<ParameterOperation>,
}

impl ParameterExpansionPart {
    pub fn simple(parameter: impl Into<String>) -> Self {
        Self { parameter: parameter.into(), index: None, operation: None }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrayIndex {
    /// [@]
    All,
    /// [*]
    Star,
    /// Arithmetic subscript, expanded then evaluated
    Expr(WordNode),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterOperation {
    /// ${#VAR}
    Length,
    /// ${VAR:-default} or ${VAR-default}
    DefaultValue(DefaultValueOp),
    /// ${VAR:=default} or ${VAR=default}
    AssignDefault(DefaultValueOp),
    /// ${VAR:?error} or ${VAR?error}
    ErrorIfUnset(DefaultValueOp),
    /// ${VAR:+alternative} or ${VAR+alternative}
    UseAlternative(DefaultValueOp),
    /// ${VAR#pattern}, ${VAR##pattern}, ${VAR%pattern}, ${VAR%%pattern}
    PatternRemoval(PatternRemovalOp),
    /// ${VAR/pattern/replacement} or ${VAR//pattern/replacement}
    PatternReplacement(PatternReplacementOp),
}

/// Operand shared by the default/assign/error/alternative forms
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultValueOp {
    pub word: WordNode,
    /// The `:` variant also treats an empty value as unset
    pub check_empty: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRemovalOp {
    pub pattern: WordNode,
    pub side: PatternRemovalSide,
    pub greedy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternRemovalSide {
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternReplacementOp {
    pub pattern: WordNode,
    pub replacement: WordNode,
    pub all: bool,
}

// =============================================================================
// COMMAND SUBSTITUTION & ARITHMETIC
// =============================================================================

/// $(...) or `...`
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSubstitutionPart {
    pub body: ScriptNode,
}

/// $((...)): the body is expanded like a double-quoted word, then evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct ArithmeticExpansionPart {
    pub expression: WordNode,
}

/// Arithmetic expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum ArithExpr {
    Number(i64),
    Variable(String),
    Unary {
        operator: ArithUnaryOperator,
        operand: Box<ArithExpr>,
    },
    Binary {
        operator: ArithBinaryOperator,
        left: Box<ArithExpr>,
        right: Box<ArithExpr>,
    },
    Assignment {
        operator: ArithAssignmentOperator,
        name: String,
        value: Box<ArithExpr>,
    },
    /// ++x, --x, x++, x--
    IncDec {
        name: String,
        increment: bool,
        prefix: bool,
    },
    Ternary {
        condition: Box<ArithExpr>,
        consequent: Box<ArithExpr>,
        alternate: Box<ArithExpr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithUnaryOperator {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithBinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    LShift,
    RShift,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    LogAnd,
    LogOr,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithAssignmentOperator {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    LShiftAssign,
    RShiftAssign,
    AndAssign,
    OrAssign,
    XorAssign,
}
