//! Per-function verification.
//!
//! By construction a block holds its instructions and at most one
//! terminator, so the checks left are that every block of a definition is
//! actually terminated and that every branch target names a block of the
//! function.

use std::collections::HashSet;
use std::fmt;

use crate::func::Function;
use crate::inst::Terminator;

/// A verification failure; the generator erases the offending function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub function: String,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function '{}': {}", self.function, self.message)
    }
}

impl std::error::Error for VerifyError {}

pub fn verify_function(func: &Function) -> Result<(), VerifyError> {
    if func.is_declaration {
        return Ok(());
    }

    let labels: HashSet<&str> = func.blocks.iter().map(|b| b.label.as_str()).collect();

    for block in &func.blocks {
        let Some(term) = &block.term else {
            return Err(VerifyError {
                function: func.name.clone(),
                message: format!("block '{}' has no terminator", block.label),
            });
        };

        let targets: &[&String] = match term {
            Terminator::Ret { .. } => &[],
            Terminator::Br { target } => &[target],
            Terminator::CondBr { then_target, else_target, .. } => &[then_target, else_target],
        };
        for target in targets {
            if !labels.contains(target.as_str()) {
                return Err(VerifyError {
                    function: func.name.clone(),
                    message: format!(
                        "block '{}' branches to unknown block '{}'",
                        block.label, target
                    ),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::inst::Terminator;
    use crate::ty::Ty;

    #[test]
    fn test_terminated_function_passes() {
        let mut fb = FunctionBuilder::new("f", Ty::Void, Vec::new(), false);
        fb.terminate(Terminator::Ret { ty: Ty::Void, value: None });
        assert!(verify_function(&fb.finish()).is_ok());
    }

    #[test]
    fn test_unterminated_block_fails() {
        let fb = FunctionBuilder::new("f", Ty::Void, Vec::new(), false);
        let err = verify_function(&fb.finish()).unwrap_err();
        assert_eq!(err.function, "f");
        assert!(err.message.contains("no terminator"));
    }

    #[test]
    fn test_unknown_branch_target_fails() {
        let mut fb = FunctionBuilder::new("f", Ty::Void, Vec::new(), false);
        fb.terminate(Terminator::Br { target: "nowhere".to_string() });
        let err = verify_function(&fb.finish()).unwrap_err();
        assert!(err.message.contains("unknown block 'nowhere'"));
    }

    #[test]
    fn test_branch_targets_resolve() {
        let mut fb = FunctionBuilder::new("f", Ty::Void, Vec::new(), false);
        let end = fb.append_block("end");
        fb.terminate(Terminator::Br { target: end.clone() });
        fb.position_at_end(&end);
        fb.terminate(Terminator::Ret { ty: Ty::Void, value: None });
        assert!(verify_function(&fb.finish()).is_ok());
    }

    #[test]
    fn test_declaration_is_trivially_valid() {
        let fb = FunctionBuilder::new("f", Ty::Void, Vec::new(), false);
        let mut func = fb.finish();
        func.blocks.clear();
        func.is_declaration = true;
        assert!(verify_function(&func).is_ok());
    }
}
