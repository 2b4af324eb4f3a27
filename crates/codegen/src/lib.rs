//! IR lowering for the Lime compiler.
//!
//! [`generate`] walks a parsed module and produces target IR text through
//! the [`ir`] builder, applying the implicit-cast table ([`casts`]) at
//! every unification site and verifying each function before it is
//! accepted.

pub mod casts;
pub mod gen;

pub use casts::{Cast, CastKind, CastTable};
pub use gen::{generate, CompileResult};
