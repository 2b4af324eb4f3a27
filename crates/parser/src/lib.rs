//! Frontend for the Lime language.
//!
//! This crate turns source text into a typed, arena-allocated AST:
//!
//! - [`token`] / [`lexer`] - single-pass scanner with a one-token
//!   look-behind/look-ahead window
//! - [`types`] - interned type registry with lazy pointer synthesis
//! - [`scope`] - lexical scope stack used while parsing
//! - [`ast`] - statement/expression sum types
//! - [`parser`] - Pratt/recursive-descent parser with inline resolution and
//!   error recovery

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod token;
pub mod types;

pub use ast::{
    BinOp, Expr, ExprKind, ExprRef, FuncDef, Module, Param, Prototype, Stmt, StmtKind, StructDef,
    UnaryOp, VarDef,
};
pub use lexer::{LexError, Lexer};
pub use parser::{parse, ParseResult};
pub use scope::{Binding, ScopeStack, VarFlags};
pub use token::{Token, TokenKind};
pub use types::{TypeError, TypeId, TypeKind, TypeRegistry};
