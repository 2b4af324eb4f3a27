//! Builders owning the module under construction and the current insertion
//! point inside a function.

use std::collections::HashMap;

use crate::func::{BasicBlock, Function, Param};
use crate::inst::{BinArith, CastOp, FcmpPred, IcmpPred, Inst, Terminator};
use crate::module::{Global, GlobalInit, Module, StringConst, StructDef};
use crate::ty::Ty;
use crate::value::Value;

/// Builds the module-level sections: type definitions, globals, string
/// constants, and the function list.
pub struct ModuleBuilder {
    module: Module,
    next_string: u32,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { module: Module::new(name), next_string: 0 }
    }

    pub fn add_struct(&mut self, name: impl Into<String>, fields: Vec<Ty>) {
        self.module.structs.push(StructDef { name: name.into(), fields });
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: Ty, init: GlobalInit) {
        self.module.globals.push(Global { name: name.into(), ty, init });
    }

    /// Intern a NUL-terminated string constant and return the pointer value
    /// to its first byte.
    pub fn add_string(&mut self, data: &str) -> Value {
        let id = self.next_string;
        self.next_string += 1;
        let constant = StringConst { id, data: data.to_string() };
        let len = constant.len();
        self.module.strings.push(constant);
        Value::CStr { id, len }
    }

    /// Emit a `declare` prototype.
    pub fn declare_function(&mut self, name: impl Into<String>, ret: Ty, params: Vec<Param>, variadic: bool) {
        self.module.functions.push(Function {
            name: name.into(),
            ret,
            params,
            variadic,
            blocks: Vec::new(),
            is_declaration: true,
        });
    }

    /// Append a finished function body.
    pub fn add_function(&mut self, func: Function) {
        self.module.functions.push(func);
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

/// Builds one function body. Created with an `entry` block that is also the
/// initial insertion point; instructions go to the block the cursor is on,
/// and each block takes at most one terminator.
pub struct FunctionBuilder {
    func: Function,
    cursor: usize,
    names: HashMap<String, u32>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>, ret: Ty, params: Vec<Param>, variadic: bool) -> Self {
        let mut builder = Self {
            func: Function {
                name: name.into(),
                ret,
                params,
                variadic,
                blocks: Vec::new(),
                is_declaration: false,
            },
            cursor: 0,
            names: HashMap::new(),
        };
        // Incoming arguments already occupy their names.
        for param in &builder.func.params {
            builder.names.insert(param.name.clone(), 1);
        }
        let entry = builder.unique_name("entry");
        builder.func.blocks.push(BasicBlock::new(entry));
        builder
    }

    fn unique_name(&mut self, hint: &str) -> String {
        let count = self.names.entry(hint.to_string()).or_insert(0);
        let name = if *count == 0 { hint.to_string() } else { format!("{}{}", hint, count) };
        *count += 1;
        name
    }

    /// A fresh temporary named after `hint`.
    pub fn fresh(&mut self, hint: &str) -> Value {
        Value::Temp(self.unique_name(hint))
    }

    /// Append a new block (without moving the cursor) and return its label.
    pub fn append_block(&mut self, hint: &str) -> String {
        let label = self.unique_name(hint);
        self.func.blocks.push(BasicBlock::new(label.clone()));
        label
    }

    /// Move the cursor to the block with `label`. Labels must come from
    /// [`append_block`](Self::append_block); an unknown label leaves the
    /// cursor unchanged.
    pub fn position_at_end(&mut self, label: &str) {
        if let Some(index) = self.func.blocks.iter().position(|b| b.label == label) {
            self.cursor = index;
        }
    }

    pub fn current_block(&self) -> &str {
        &self.func.blocks[self.cursor].label
    }

    pub fn is_terminated(&self) -> bool {
        self.func.blocks[self.cursor].is_terminated()
    }

    pub fn emit(&mut self, inst: Inst) {
        self.func.blocks[self.cursor].insts.push(inst);
    }

    /// Set the current block's terminator if it does not have one yet.
    pub fn terminate(&mut self, term: Terminator) {
        let block = &mut self.func.blocks[self.cursor];
        if block.term.is_none() {
            block.term = Some(term);
        }
    }

    // ------------------------------------------------------------------
    // Convenience emitters
    // ------------------------------------------------------------------

    pub fn alloca(&mut self, hint: &str, ty: Ty) -> Value {
        let dst = self.fresh(hint);
        self.emit(Inst::Alloca { dst: dst.clone(), ty });
        dst
    }

    pub fn load(&mut self, hint: &str, ty: Ty, ptr: Value) -> Value {
        let dst = self.fresh(hint);
        self.emit(Inst::Load { dst: dst.clone(), ty, ptr });
        dst
    }

    pub fn store(&mut self, ty: Ty, value: Value, ptr: Value) {
        self.emit(Inst::Store { ty, value, ptr });
    }

    pub fn bin(&mut self, hint: &str, op: BinArith, ty: Ty, lhs: Value, rhs: Value) -> Value {
        let dst = self.fresh(hint);
        self.emit(Inst::Bin { dst: dst.clone(), op, ty, lhs, rhs });
        dst
    }

    pub fn fneg(&mut self, hint: &str, ty: Ty, value: Value) -> Value {
        let dst = self.fresh(hint);
        self.emit(Inst::FNeg { dst: dst.clone(), ty, value });
        dst
    }

    pub fn icmp(&mut self, pred: IcmpPred, ty: Ty, lhs: Value, rhs: Value) -> Value {
        let dst = self.fresh("cmptmp");
        self.emit(Inst::Icmp { dst: dst.clone(), pred, ty, lhs, rhs });
        dst
    }

    pub fn fcmp(&mut self, pred: FcmpPred, ty: Ty, lhs: Value, rhs: Value) -> Value {
        let dst = self.fresh("cmptmp");
        self.emit(Inst::Fcmp { dst: dst.clone(), pred, ty, lhs, rhs });
        dst
    }

    pub fn cast(&mut self, op: CastOp, from: Ty, value: Value, to: Ty) -> Value {
        let dst = self.fresh("casttmp");
        self.emit(Inst::Cast { dst: dst.clone(), op, from, value, to });
        dst
    }

    /// Emit a call; returns the result value, or `None` for a void call.
    pub fn call(
        &mut self,
        ret: Ty,
        callee: impl Into<String>,
        sig: Option<String>,
        args: Vec<(Ty, Value)>,
    ) -> Option<Value> {
        let dst = if ret.is_void() { None } else { Some(self.fresh("calltmp")) };
        self.emit(Inst::Call { dst: dst.clone(), ret, callee: callee.into(), sig, args });
        dst
    }

    pub fn finish(self) -> Function {
        self.func
    }
}
