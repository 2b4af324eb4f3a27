//! Functions and basic blocks.

use std::fmt;

use crate::inst::{Inst, Terminator};
use crate::ty::Ty;

/// A function parameter; the incoming value is `%name`.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// A basic block: a label, its instructions, and at most one terminator,
/// always last. An unterminated block is rejected by the verifier.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub label: String,
    pub insts: Vec<Inst>,
    pub term: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(label: String) -> Self {
        Self { label, insts: Vec::new(), term: None }
    }

    pub fn is_terminated(&self) -> bool {
        self.term.is_some()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for inst in &self.insts {
            writeln!(f, "  {}", inst)?;
        }
        if let Some(term) = &self.term {
            writeln!(f, "  {}", term)?;
        }
        Ok(())
    }
}

/// A function. Without blocks it renders as a `declare` prototype.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: Ty,
    pub params: Vec<Param>,
    pub variadic: bool,
    pub blocks: Vec<BasicBlock>,
    pub is_declaration: bool,
}

impl Function {
    /// The textual function type, used for calls to variadic functions.
    pub fn signature(&self) -> String {
        let mut params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        if self.variadic {
            params.push("...".to_string());
        }
        format!("{} ({})", self.ret, params.join(", "))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_declaration {
            let mut params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
            if self.variadic {
                params.push("...".to_string());
            }
            return writeln!(f, "declare {} @{}({})", self.ret, self.name, params.join(", "));
        }

        let params: Vec<String> =
            self.params.iter().map(|p| format!("{} %{}", p.ty, p.name)).collect();
        writeln!(f, "define {} @{}({}) {{", self.ret, self.name, params.join(", "))?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::Terminator;
    use crate::value::Value;
    use indoc::indoc;

    #[test]
    fn test_declaration_display() {
        let func = Function {
            name: "printf".to_string(),
            ret: Ty::I32,
            params: vec![Param { name: String::new(), ty: Ty::I8.ptr_to() }],
            variadic: true,
            blocks: Vec::new(),
            is_declaration: true,
        };
        assert_eq!(func.to_string(), "declare i32 @printf(i8*, ...)\n");
        assert_eq!(func.signature(), "i32 (i8*, ...)");
    }

    #[test]
    fn test_definition_display() {
        let mut entry = BasicBlock::new("entry".to_string());
        entry.insts.push(Inst::Alloca { dst: Value::Temp("x.addr".to_string()), ty: Ty::I32 });
        entry.term = Some(Terminator::Ret { ty: Ty::I32, value: Some(Value::ConstInt(0)) });

        let func = Function {
            name: "main".to_string(),
            ret: Ty::I32,
            params: vec![Param { name: "x".to_string(), ty: Ty::I32 }],
            variadic: false,
            blocks: vec![entry],
            is_declaration: false,
        };
        let expected = indoc! {"
            define i32 @main(i32 %x) {
            entry:
              %x.addr = alloca i32
              ret i32 0
            }
        "};
        assert_eq!(func.to_string(), expected);
    }

    #[test]
    fn test_block_termination() {
        let mut block = BasicBlock::new("entry".to_string());
        assert!(!block.is_terminated());
        block.term = Some(Terminator::Ret { ty: Ty::Void, value: None });
        assert!(block.is_terminated());
    }
}
