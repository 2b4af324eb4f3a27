//! Arena-allocated AST for the Lime language.
//!
//! Nodes are allocated in a `bumpalo` arena by the parser and reference each
//! other with `&'a` references; statement lists are arena slices. Every node
//! records its source line. Expressions additionally carry their resolved
//! type in a [`Cell`] so the post-parse call-resolution pass can fill in the
//! return types of forward calls without any other mutation.

use std::cell::Cell;

use crate::scope::VarFlags;
use crate::types::TypeId;

pub type ExprRef<'a> = &'a Expr<'a>;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    AddressOf,
    Deref,
}

/// Binary operators, including the compound-assign forms the parser lowers
/// into a store of the corresponding arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    CompoundAdd,
    Sub,
    CompoundSub,
    Mul,
    CompoundMul,
    Div,
    CompoundDiv,
    Assign,
    Eq,
    Neq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinOp {
    /// The source spelling, for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::CompoundAdd => "+=",
            BinOp::Sub => "-",
            BinOp::CompoundSub => "-=",
            BinOp::Mul => "*",
            BinOp::CompoundMul => "*=",
            BinOp::Div => "/",
            BinOp::CompoundDiv => "/=",
            BinOp::Assign => "=",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Less => "<",
            BinOp::LessEq => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEq => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Neq | BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq
        )
    }

    pub fn is_compound_assign(self) -> bool {
        matches!(
            self,
            BinOp::CompoundAdd | BinOp::CompoundSub | BinOp::CompoundMul | BinOp::CompoundDiv
        )
    }
}

/// An expression node.
#[derive(Debug)]
pub struct Expr<'a> {
    /// Line number (1-based).
    pub line: u32,
    /// Resolved type; [`TypeId::UNRESOLVED`] only for forward calls until
    /// the post-parse resolution pass runs.
    pub ty: Cell<TypeId>,
    pub kind: ExprKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum ExprKind<'a> {
    IntLit(i64),
    FloatLit(f32),
    BoolLit(bool),
    NullLit,
    StrLit(&'a str),
    /// Read a variable. With `emit_load` cleared the lowering yields the
    /// storage slot instead of the value (address-of, pre/post-inc, …).
    Load { name: &'a str, emit_load: bool },
    /// Assign to a variable. With `through_deref` set the slot holds a
    /// pointer which is loaded first and then stored through.
    Store { name: &'a str, value: ExprRef<'a>, through_deref: bool },
    Unary { op: UnaryOp, operand: ExprRef<'a> },
    Binary { op: BinOp, lhs: ExprRef<'a>, rhs: ExprRef<'a> },
    Call { callee: &'a str, args: &'a [ExprRef<'a>] },
}

/// A statement node. `Copy` so statement lists can live in arena slices.
#[derive(Debug, Clone, Copy)]
pub struct Stmt<'a> {
    /// Line number (1-based).
    pub line: u32,
    pub kind: StmtKind<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum StmtKind<'a> {
    Expr(ExprRef<'a>),
    Compound(&'a [Stmt<'a>]),
    Branch {
        cond: ExprRef<'a>,
        then_body: &'a [Stmt<'a>],
        /// Empty when there is no `else`.
        else_body: &'a [Stmt<'a>],
    },
    Return(Option<ExprRef<'a>>),
    VarDef(&'a VarDef<'a>),
    FuncDef(&'a FuncDef<'a>),
    StructDef(&'a StructDef<'a>),
    /// A bare prototype brought in with `import`.
    Import(&'a FuncDef<'a>),
}

/// A variable definition (local, global, or record member).
#[derive(Debug)]
pub struct VarDef<'a> {
    pub line: u32,
    pub name: &'a str,
    pub ty: TypeId,
    pub init: Option<ExprRef<'a>>,
    pub flags: VarFlags,
}

/// A function parameter. An empty name marks an unnamed prototype
/// parameter.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    pub name: &'a str,
    pub ty: TypeId,
}

/// A function signature, shared by definitions and imports.
#[derive(Debug, Clone, Copy)]
pub struct Prototype<'a> {
    pub line: u32,
    pub name: &'a str,
    pub params: &'a [Param<'a>],
    pub ret: TypeId,
    pub variadic: bool,
}

/// A function definition; `body` is `None` for a bare prototype.
#[derive(Debug)]
pub struct FuncDef<'a> {
    pub proto: Prototype<'a>,
    pub body: Option<&'a [Stmt<'a>]>,
}

/// A structure definition.
#[derive(Debug)]
pub struct StructDef<'a> {
    pub line: u32,
    pub name: &'a str,
    pub members: &'a [&'a VarDef<'a>],
}

/// A whole compilation unit.
#[derive(Debug, Clone, Copy)]
pub struct Module<'a> {
    pub stmts: &'a [Stmt<'a>],
}
