//! Typed SSA-style textual IR.
//!
//! This crate owns the textual shape of the compiler's output: modules with
//! type definitions, globals and string constants, functions made of basic
//! blocks, instructions, and terminators. The [`builder`] module provides
//! the insertion-point machinery the generator drives; [`verify`] checks
//! block discipline before a function is accepted.

pub mod builder;
pub mod func;
pub mod inst;
pub mod module;
pub mod ty;
pub mod value;
pub mod verify;

pub use builder::{FunctionBuilder, ModuleBuilder};
pub use func::{BasicBlock, Function, Param};
pub use inst::{BinArith, CastOp, FcmpPred, IcmpPred, Inst, Terminator};
pub use module::{Global, GlobalInit, Module, StringConst, StructDef};
pub use ty::Ty;
pub use value::Value;
pub use verify::{verify_function, VerifyError};
