//! Instructions and block terminators.

use std::fmt;

use crate::ty::Ty;
use crate::value::Value;

/// Integer and float arithmetic plus bitwise xor (used for `!`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinArith {
    Add,
    Sub,
    Mul,
    FAdd,
    FSub,
    FMul,
    FDiv,
    Xor,
}

impl BinArith {
    fn mnemonic(self) -> &'static str {
        match self {
            BinArith::Add => "add",
            BinArith::Sub => "sub",
            BinArith::Mul => "mul",
            BinArith::FAdd => "fadd",
            BinArith::FSub => "fsub",
            BinArith::FMul => "fmul",
            BinArith::FDiv => "fdiv",
            BinArith::Xor => "xor",
        }
    }
}

/// Unsigned integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcmpPred {
    Eq,
    Ne,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl IcmpPred {
    fn mnemonic(self) -> &'static str {
        match self {
            IcmpPred::Eq => "eq",
            IcmpPred::Ne => "ne",
            IcmpPred::Ult => "ult",
            IcmpPred::Ule => "ule",
            IcmpPred::Ugt => "ugt",
            IcmpPred::Uge => "uge",
        }
    }
}

/// Unordered float comparison predicates: a comparison involving NaN is
/// true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FcmpPred {
    Ueq,
    Une,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl FcmpPred {
    fn mnemonic(self) -> &'static str {
        match self {
            FcmpPred::Ueq => "ueq",
            FcmpPred::Une => "une",
            FcmpPred::Ult => "ult",
            FcmpPred::Ule => "ule",
            FcmpPred::Ugt => "ugt",
            FcmpPred::Uge => "uge",
        }
    }
}

/// Value conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Sign-extend to a wider integer.
    Sext,
    /// Truncate to a narrower integer.
    Trunc,
}

impl CastOp {
    fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Sext => "sext",
            CastOp::Trunc => "trunc",
        }
    }
}

/// A non-terminator instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Alloca { dst: Value, ty: Ty },
    Load { dst: Value, ty: Ty, ptr: Value },
    Store { ty: Ty, value: Value, ptr: Value },
    Bin { dst: Value, op: BinArith, ty: Ty, lhs: Value, rhs: Value },
    FNeg { dst: Value, ty: Ty, value: Value },
    Icmp { dst: Value, pred: IcmpPred, ty: Ty, lhs: Value, rhs: Value },
    Fcmp { dst: Value, pred: FcmpPred, ty: Ty, lhs: Value, rhs: Value },
    Cast { dst: Value, op: CastOp, from: Ty, value: Value, to: Ty },
    Call {
        dst: Option<Value>,
        ret: Ty,
        callee: String,
        /// Full function type, rendered instead of the bare return type for
        /// variadic callees (`i32 (i8*, ...)`).
        sig: Option<String>,
        args: Vec<(Ty, Value)>,
    },
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Alloca { dst, ty } => write!(f, "{} = alloca {}", dst, ty),
            Inst::Load { dst, ty, ptr } => write!(f, "{} = load {}, {}* {}", dst, ty, ty, ptr),
            Inst::Store { ty, value, ptr } => write!(f, "store {} {}, {}* {}", ty, value, ty, ptr),
            Inst::Bin { dst, op, ty, lhs, rhs } => {
                write!(f, "{} = {} {} {}, {}", dst, op.mnemonic(), ty, lhs, rhs)
            }
            Inst::FNeg { dst, ty, value } => write!(f, "{} = fneg {} {}", dst, ty, value),
            Inst::Icmp { dst, pred, ty, lhs, rhs } => {
                write!(f, "{} = icmp {} {} {}, {}", dst, pred.mnemonic(), ty, lhs, rhs)
            }
            Inst::Fcmp { dst, pred, ty, lhs, rhs } => {
                write!(f, "{} = fcmp {} {} {}, {}", dst, pred.mnemonic(), ty, lhs, rhs)
            }
            Inst::Cast { dst, op, from, value, to } => {
                write!(f, "{} = {} {} {} to {}", dst, op.mnemonic(), from, value, to)
            }
            Inst::Call { dst, ret, callee, sig, args } => {
                if let Some(dst) = dst {
                    write!(f, "{} = ", dst)?;
                }
                let callee_ty = match sig {
                    Some(sig) => sig.clone(),
                    None => ret.to_string(),
                };
                write!(f, "call {} @{}(", callee_ty, callee)?;
                for (index, (ty, value)) in args.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", ty, value)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// The single terminator each basic block ends with.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Ret { ty: Ty, value: Option<Value> },
    Br { target: String },
    CondBr { cond: Value, then_target: String, else_target: String },
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Ret { value: Some(value), ty } => write!(f, "ret {} {}", ty, value),
            Terminator::Ret { value: None, .. } => write!(f, "ret void"),
            Terminator::Br { target } => write!(f, "br label %{}", target),
            Terminator::CondBr { cond, then_target, else_target } => {
                write!(f, "br i1 {}, label %{}, label %{}", cond, then_target, else_target)
            }
        }
    }
}
