//! The generator: walks the AST and produces target IR text.
//!
//! One [`Generator`] lives for one compilation. It resolves type backings
//! first, then lowers module statements in source order. The current
//! function under construction is threaded through the statement and
//! expression lowering as an explicit [`FunctionBuilder`]; named values are
//! split into a module-wide `globals` table and a per-function `locals`
//! table that is reset at every function entry.

use std::collections::{HashMap, HashSet};

use common::{create_logger, log, Diagnostic, Logger};
use ir::{
    verify_function, BinArith, CastOp, FcmpPred, FunctionBuilder, GlobalInit, IcmpPred,
    ModuleBuilder, Terminator, Ty, Value,
};
use parser::{
    BinOp, ExprKind, ExprRef, FuncDef, Module, Prototype, Stmt, StmtKind, TypeId, TypeKind,
    TypeRegistry, UnaryOp, VarDef,
};

use crate::casts::{CastKind, CastTable};

/// Result of lowering one module.
pub struct CompileResult {
    /// The rendered IR text, present on success.
    pub ir: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub succeeded: bool,
}

#[derive(Debug)]
struct CompileError {
    line: u32,
    message: String,
}

type GResult<T> = Result<T, CompileError>;

fn error(line: u32, message: impl Into<String>) -> CompileError {
    CompileError { line, message: message.into() }
}

/// A lowered value together with its source-level type.
struct Operand {
    value: Value,
    ty: TypeId,
}

/// A storage cell in the named-value tables.
#[derive(Clone)]
struct Slot {
    ptr: Value,
    ty: TypeId,
    is_const: bool,
}

/// Which unification site an implicit cast was applied at; decides the
/// wording of the warning and of the failure.
enum CastContext<'s> {
    Binary,
    Assign,
    Arg { index: usize, func: &'s str },
    Return,
}

impl CastContext<'_> {
    fn warning(&self, types: &TypeRegistry, from: TypeId, to: TypeId) -> String {
        let from = types.name(from);
        let to = types.name(to);
        match self {
            CastContext::Binary => {
                format!("binary op: implicit cast from '{}' to '{}'", from, to)
            }
            CastContext::Assign => {
                format!("assignment: implicit cast from '{}' to '{}'", from, to)
            }
            CastContext::Arg { index, .. } => format!(
                "call: implicit cast of argument {} from '{}' to '{}'",
                index + 1,
                from,
                to
            ),
            CastContext::Return => {
                format!("return statement: implicit cast to return type from '{}'", from)
            }
        }
    }

    fn failure(&self, types: &TypeRegistry, from: TypeId, to: TypeId) -> String {
        let from = types.name(from);
        let to = types.name(to);
        match self {
            CastContext::Binary => {
                format!("binary op: operand type mismatch ('{}' and '{}')", to, from)
            }
            CastContext::Assign => {
                format!("cannot assign a value of type '{}' to '{}'", from, to)
            }
            CastContext::Arg { index, func } => format!(
                "argument {} of '{}': expected '{}', got '{}'",
                index + 1,
                func,
                to,
                from
            ),
            CastContext::Return => {
                format!("cannot return '{}' from a function returning '{}'", from, to)
            }
        }
    }
}

/// Lower a parsed module to IR text.
pub fn generate<'a>(
    module_name: &str,
    module: &Module<'a>,
    types: &mut TypeRegistry,
    protos: &HashMap<&'a str, Prototype<'a>>,
) -> CompileResult {
    let mut generator = Generator {
        types,
        protos,
        module: ModuleBuilder::new(module_name),
        backings: HashMap::new(),
        resolving: HashSet::new(),
        globals: HashMap::new(),
        locals: HashMap::new(),
        declared: HashSet::new(),
        defined: HashSet::new(),
        current_ret: TypeRegistry::VOID,
        casts: CastTable::with_defaults(),
        warnings: Vec::new(),
        log: create_logger("codegen"),
    };

    match generator.run(module) {
        Ok(()) => CompileResult {
            ir: Some(generator.module.finish().to_string()),
            diagnostics: generator.warnings,
            succeeded: true,
        },
        Err(e) => {
            let mut diagnostics = generator.warnings;
            diagnostics.push(Diagnostic::error(e.line, e.message));
            CompileResult { ir: None, diagnostics, succeeded: false }
        }
    }
}

struct Generator<'g, 'a> {
    types: &'g mut TypeRegistry,
    protos: &'g HashMap<&'a str, Prototype<'a>>,
    module: ModuleBuilder,
    /// Memoized lowering of registry types.
    backings: HashMap<TypeId, Ty>,
    resolving: HashSet<TypeId>,
    globals: HashMap<String, Slot>,
    /// Reset at every function entry.
    locals: HashMap<String, Slot>,
    declared: HashSet<String>,
    defined: HashSet<String>,
    current_ret: TypeId,
    casts: CastTable,
    warnings: Vec<Diagnostic>,
    log: Logger,
}

impl<'g, 'a> Generator<'g, 'a> {
    fn run(&mut self, module: &Module<'a>) -> GResult<()> {
        // Bind every registered type to its lowering before any code is
        // emitted; record types become module-level aggregates here.
        let ids: Vec<TypeId> = self.types.ids().collect();
        for id in ids {
            self.resolve_backing(id, 0)?;
        }

        for stmt in module.stmts {
            match stmt.kind {
                StmtKind::StructDef(_) => {}
                StmtKind::Import(def) => self.declare_prototype(def)?,
                StmtKind::VarDef(def) => self.gen_global(def)?,
                StmtKind::FuncDef(def) => self.gen_function(def)?,
                _ => {
                    return Err(error(stmt.line, "statement not allowed at global scope"));
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Type backings
    // ------------------------------------------------------------------

    fn resolve_backing(&mut self, id: TypeId, line: u32) -> GResult<Ty> {
        if let Some(ty) = self.backings.get(&id) {
            return Ok(ty.clone());
        }
        if !self.resolving.insert(id) {
            return Err(error(
                line,
                format!("unresolved type backing for '{}'", self.types.name(id)),
            ));
        }

        let ty = match self.types.kind(id) {
            TypeKind::Primitive => match self.types.name(id) {
                "int8" => Ty::I8,
                "int32" => Ty::I32,
                "int64" => Ty::I64,
                "float" => Ty::F32,
                "bool" => Ty::I1,
                "string" => Ty::I8.ptr_to(),
                "void" => Ty::Void,
                other => {
                    let message = format!("unresolved type backing for '{}'", other);
                    self.resolving.remove(&id);
                    return Err(error(line, message));
                }
            },
            TypeKind::Pointer => {
                let Some(inner) = self.types.pointee(id) else {
                    let message =
                        format!("unresolved type backing for '{}'", self.types.name(id));
                    self.resolving.remove(&id);
                    return Err(error(line, message));
                };
                self.resolve_backing(inner, line)?.ptr_to()
            }
            TypeKind::Record => {
                let members: Vec<TypeId> =
                    self.types.members(id).iter().map(|(_, ty)| *ty).collect();
                let mut fields = Vec::with_capacity(members.len());
                for member in members {
                    fields.push(self.resolve_backing(member, line)?);
                }
                let name = self.types.name(id).to_string();
                self.module.add_struct(name.clone(), fields);
                Ty::Struct(name)
            }
        };

        self.resolving.remove(&id);
        self.backings.insert(id, ty.clone());
        Ok(ty)
    }

    // ------------------------------------------------------------------
    // Unification via the cast table
    // ------------------------------------------------------------------

    /// Make `operand` usable where `to` is expected: identical source
    /// types and identical backings pass through; otherwise the cast table
    /// decides, warning on an implicit conversion and failing when none
    /// applies.
    fn unify(
        &mut self,
        fb: &mut FunctionBuilder,
        operand: Operand,
        to: TypeId,
        line: u32,
        ctx: CastContext<'_>,
    ) -> GResult<Value> {
        if operand.ty == to {
            return Ok(operand.value);
        }
        let from_backing = self.resolve_backing(operand.ty, line)?;
        let to_backing = self.resolve_backing(to, line)?;
        if from_backing == to_backing {
            return Ok(operand.value);
        }

        if let Some(cast) = self.casts.find_implicit(operand.ty, to) {
            let message = ctx.warning(self.types, operand.ty, to);
            self.warnings.push(Diagnostic::warning(line, message));
            let op = match cast.kind {
                CastKind::SignExtend => CastOp::Sext,
                CastKind::Truncate => CastOp::Trunc,
            };
            return Ok(fb.cast(op, from_backing, operand.value, to_backing));
        }

        Err(error(line, ctx.failure(self.types, operand.ty, to)))
    }

    // ------------------------------------------------------------------
    // Module-level statements
    // ------------------------------------------------------------------

    fn declare_prototype(&mut self, def: &FuncDef<'a>) -> GResult<()> {
        let proto = def.proto;
        if self.defined.contains(proto.name) {
            return Err(error(
                proto.line,
                format!("function '{}' is already defined", proto.name),
            ));
        }
        if self.declared.contains(proto.name) {
            return Ok(());
        }

        let ret = self.resolve_backing(proto.ret, proto.line)?;
        let params = self.lower_params(&proto)?;
        self.module.declare_function(proto.name, ret, params, proto.variadic);
        self.declared.insert(proto.name.to_string());
        Ok(())
    }

    fn lower_params(&mut self, proto: &Prototype<'a>) -> GResult<Vec<ir::Param>> {
        let mut params = Vec::with_capacity(proto.params.len());
        for (index, param) in proto.params.iter().enumerate() {
            let name = if param.name.is_empty() {
                format!("arg{}", index)
            } else {
                param.name.to_string()
            };
            params.push(ir::Param { name, ty: self.resolve_backing(param.ty, proto.line)? });
        }
        Ok(params)
    }

    /// A module-scope variable: common linkage, constant initializer.
    fn gen_global(&mut self, def: &VarDef<'a>) -> GResult<()> {
        let backing = self.resolve_backing(def.ty, def.line)?;

        let init = match def.init {
            None => GlobalInit::Zero,
            Some(init) => match init.kind {
                ExprKind::IntLit(v) if self.types.is_int(def.ty) => GlobalInit::Int(v),
                ExprKind::FloatLit(v) if def.ty == TypeRegistry::FLOAT => GlobalInit::Float(v),
                ExprKind::BoolLit(v) if def.ty == TypeRegistry::BOOL => GlobalInit::Bool(v),
                ExprKind::NullLit if self.types.is_pointer(def.ty) => GlobalInit::Null,
                ExprKind::IntLit(_)
                | ExprKind::FloatLit(_)
                | ExprKind::BoolLit(_)
                | ExprKind::NullLit => {
                    return Err(error(
                        def.line,
                        format!(
                            "global initializer does not match type '{}'",
                            self.types.name(def.ty)
                        ),
                    ));
                }
                _ => {
                    return Err(error(
                        def.line,
                        "global initializer must be a constant expression",
                    ));
                }
            },
        };

        self.module.add_global(def.name, backing, init);
        self.globals.insert(
            def.name.to_string(),
            Slot { ptr: Value::Global(def.name.to_string()), ty: def.ty, is_const: def.flags.is_const },
        );
        Ok(())
    }

    fn gen_function(&mut self, def: &FuncDef<'a>) -> GResult<()> {
        let proto = def.proto;
        let Some(body) = def.body else {
            return self.declare_prototype(def);
        };

        if self.defined.contains(proto.name) || self.declared.contains(proto.name) {
            return Err(error(
                proto.line,
                format!("function '{}' is already defined", proto.name),
            ));
        }

        let ret = self.resolve_backing(proto.ret, proto.line)?;
        let params = self.lower_params(&proto)?;
        let mut fb = FunctionBuilder::new(proto.name, ret, params.clone(), proto.variadic);

        self.locals.clear();
        self.current_ret = proto.ret;

        // Prologue: spill every incoming argument into a stack slot.
        for (param, ast_param) in params.iter().zip(proto.params.iter()) {
            let slot = fb.alloca(&format!("{}.addr", param.name), param.ty.clone());
            fb.store(param.ty.clone(), Value::Temp(param.name.clone()), slot.clone());
            self.locals.insert(
                param.name.clone(),
                Slot { ptr: slot, ty: ast_param.ty, is_const: false },
            );
        }

        for stmt in body {
            self.gen_stmt(&mut fb, stmt)?;
        }

        if !fb.is_terminated() {
            if proto.ret == TypeRegistry::VOID {
                fb.terminate(Terminator::Ret { ty: Ty::Void, value: None });
            } else {
                return Err(error(
                    proto.line,
                    format!(
                        "missing return in function '{}' returning '{}'",
                        proto.name,
                        self.types.name(proto.ret)
                    ),
                ));
            }
        }

        // The function is only added to the module once the verifier
        // accepts it, so a rejected body leaves no trace.
        let func = fb.finish();
        if let Err(e) = verify_function(&func) {
            return Err(error(proto.line, e.to_string()));
        }
        self.module.add_function(func);
        self.defined.insert(proto.name.to_string());
        log!(self.log, "generated function '{}'", proto.name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn gen_stmt(&mut self, fb: &mut FunctionBuilder, stmt: &Stmt<'a>) -> GResult<()> {
        match stmt.kind {
            StmtKind::Expr(expr) => {
                self.gen_expr(fb, expr)?;
                Ok(())
            }
            StmtKind::Compound(stmts) => {
                for stmt in stmts {
                    self.gen_stmt(fb, stmt)?;
                }
                Ok(())
            }
            StmtKind::Branch { cond, then_body, else_body } => {
                self.gen_branch(fb, cond, then_body, else_body, stmt.line)
            }
            StmtKind::Return(value) => self.gen_return(fb, value, stmt.line),
            StmtKind::VarDef(def) => self.gen_local(fb, def),
            StmtKind::FuncDef(_) => {
                Err(error(stmt.line, "function definitions are only allowed at global scope"))
            }
            StmtKind::StructDef(_) => {
                Err(error(stmt.line, "structure definitions are only allowed at global scope"))
            }
            StmtKind::Import(_) => {
                Err(error(stmt.line, "imports are only allowed at global scope"))
            }
        }
    }

    /// Lower `if` into `then`/`else`/`end` blocks. An arm that does not
    /// return falls through to the join block.
    fn gen_branch(
        &mut self,
        fb: &mut FunctionBuilder,
        cond: ExprRef<'a>,
        then_body: &'a [Stmt<'a>],
        else_body: &'a [Stmt<'a>],
        line: u32,
    ) -> GResult<()> {
        let cond = self.gen_expr(fb, cond)?;
        if cond.ty != TypeRegistry::BOOL {
            return Err(error(
                line,
                format!("branch condition must be 'bool', got '{}'", self.types.name(cond.ty)),
            ));
        }

        let then_label = fb.append_block("then");
        let else_label = fb.append_block("else");
        let end_label = fb.append_block("end");
        fb.terminate(Terminator::CondBr {
            cond: cond.value,
            then_target: then_label.clone(),
            else_target: else_label.clone(),
        });

        fb.position_at_end(&then_label);
        for stmt in then_body {
            self.gen_stmt(fb, stmt)?;
        }
        if !fb.is_terminated() {
            fb.terminate(Terminator::Br { target: end_label.clone() });
        }

        fb.position_at_end(&else_label);
        for stmt in else_body {
            self.gen_stmt(fb, stmt)?;
        }
        if !fb.is_terminated() {
            fb.terminate(Terminator::Br { target: end_label.clone() });
        }

        fb.position_at_end(&end_label);
        Ok(())
    }

    fn gen_return(
        &mut self,
        fb: &mut FunctionBuilder,
        value: Option<ExprRef<'a>>,
        line: u32,
    ) -> GResult<()> {
        let Some(value) = value else {
            if self.current_ret != TypeRegistry::VOID {
                return Err(error(
                    line,
                    format!(
                        "missing return value in function returning '{}'",
                        self.types.name(self.current_ret)
                    ),
                ));
            }
            fb.terminate(Terminator::Ret { ty: Ty::Void, value: None });
            return Ok(());
        };

        let operand = self.gen_expr(fb, value)?;
        if self.current_ret == TypeRegistry::VOID {
            if operand.ty == TypeRegistry::VOID {
                fb.terminate(Terminator::Ret { ty: Ty::Void, value: None });
                return Ok(());
            }
            return Err(error(line, "cannot return a value from a function returning 'void'"));
        }

        let value = self.unify(fb, operand, self.current_ret, line, CastContext::Return)?;
        let ty = self.resolve_backing(self.current_ret, line)?;
        fb.terminate(Terminator::Ret { ty, value: Some(value) });
        Ok(())
    }

    fn gen_local(&mut self, fb: &mut FunctionBuilder, def: &VarDef<'a>) -> GResult<()> {
        let backing = self.resolve_backing(def.ty, def.line)?;
        let slot = fb.alloca(&format!("{}.addr", def.name), backing.clone());

        if let Some(init) = def.init {
            let operand = self.gen_expr(fb, init)?;
            let value = self.unify(fb, operand, def.ty, def.line, CastContext::Assign)?;
            fb.store(backing, value, slot.clone());
        }

        self.locals.insert(
            def.name.to_string(),
            Slot { ptr: slot, ty: def.ty, is_const: def.flags.is_const },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn lookup_slot(&self, name: &str) -> Option<Slot> {
        self.locals.get(name).or_else(|| self.globals.get(name)).cloned()
    }

    fn slot_or_error(&self, name: &str, line: u32) -> GResult<Slot> {
        self.lookup_slot(name)
            .ok_or_else(|| error(line, format!("unknown variable name '{}'", name)))
    }

    fn gen_expr(&mut self, fb: &mut FunctionBuilder, expr: ExprRef<'a>) -> GResult<Operand> {
        match expr.kind {
            ExprKind::IntLit(v) => {
                Ok(Operand { value: Value::ConstInt(v), ty: TypeRegistry::INT32 })
            }
            ExprKind::FloatLit(v) => {
                Ok(Operand { value: Value::ConstFloat(v), ty: TypeRegistry::FLOAT })
            }
            ExprKind::BoolLit(v) => {
                Ok(Operand { value: Value::ConstBool(v), ty: TypeRegistry::BOOL })
            }
            ExprKind::NullLit => {
                let ty = self.types.pointer_to(TypeRegistry::INT64);
                Ok(Operand { value: Value::Null, ty })
            }
            ExprKind::StrLit(s) => {
                Ok(Operand { value: self.module.add_string(s), ty: TypeRegistry::STRING })
            }
            ExprKind::Load { name, emit_load } => self.gen_load(fb, name, emit_load, expr.line),
            ExprKind::Store { name, value, through_deref } => {
                self.gen_store(fb, name, value, through_deref, expr.line)
            }
            ExprKind::Unary { op, operand } => self.gen_unary(fb, op, operand, expr.line),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(fb, op, lhs, rhs, expr.line),
            ExprKind::Call { callee, args } => self.gen_call(fb, callee, args, expr.line),
        }
    }

    fn gen_load(
        &mut self,
        fb: &mut FunctionBuilder,
        name: &'a str,
        emit_load: bool,
        line: u32,
    ) -> GResult<Operand> {
        let slot = self.slot_or_error(name, line)?;
        if emit_load {
            let ty = self.resolve_backing(slot.ty, line)?;
            let value = fb.load(name, ty, slot.ptr);
            Ok(Operand { value, ty: slot.ty })
        } else {
            // The slot itself, for address-of and increment operators.
            let ty = self.types.pointer_to(slot.ty);
            Ok(Operand { value: slot.ptr, ty })
        }
    }

    fn gen_store(
        &mut self,
        fb: &mut FunctionBuilder,
        name: &'a str,
        value: ExprRef<'a>,
        through_deref: bool,
        line: u32,
    ) -> GResult<Operand> {
        let operand = self.gen_expr(fb, value)?;
        let slot = self.slot_or_error(name, line)?;
        if slot.is_const {
            return Err(error(line, "cannot assign to an immutable variable"));
        }

        if through_deref {
            // The slot holds a pointer: materialize it, then store through.
            let Some(pointee) = self.types.pointee(slot.ty) else {
                return Err(error(
                    line,
                    format!("cannot assign through a value of type '{}'", self.types.name(slot.ty)),
                ));
            };
            let slot_backing = self.resolve_backing(slot.ty, line)?;
            let ptr = fb.load(name, slot_backing, slot.ptr);
            let value = self.unify(fb, operand, pointee, line, CastContext::Assign)?;
            let pointee_backing = self.resolve_backing(pointee, line)?;
            fb.store(pointee_backing, value.clone(), ptr);
            Ok(Operand { value, ty: pointee })
        } else {
            let value = self.unify(fb, operand, slot.ty, line, CastContext::Assign)?;
            let backing = self.resolve_backing(slot.ty, line)?;
            fb.store(backing, value.clone(), slot.ptr);
            Ok(Operand { value, ty: slot.ty })
        }
    }

    fn gen_unary(
        &mut self,
        fb: &mut FunctionBuilder,
        op: UnaryOp,
        operand: ExprRef<'a>,
        line: u32,
    ) -> GResult<Operand> {
        match op {
            UnaryOp::Not => {
                let operand = self.gen_expr(fb, operand)?;
                if operand.ty == TypeRegistry::BOOL {
                    let value =
                        fb.bin("nottmp", BinArith::Xor, Ty::I1, operand.value, Value::ConstBool(true));
                    Ok(Operand { value, ty: TypeRegistry::BOOL })
                } else if self.types.is_int(operand.ty) {
                    let ty = self.resolve_backing(operand.ty, line)?;
                    let value =
                        fb.bin("nottmp", BinArith::Xor, ty, operand.value, Value::ConstInt(-1));
                    Ok(Operand { value, ty: operand.ty })
                } else {
                    Err(error(
                        line,
                        format!(
                            "operator '!' requires an integer operand, got '{}'",
                            self.types.name(operand.ty)
                        ),
                    ))
                }
            }
            UnaryOp::Neg => {
                let operand = self.gen_expr(fb, operand)?;
                if operand.ty == TypeRegistry::FLOAT {
                    let value = fb.fneg("negtmp", Ty::F32, operand.value);
                    Ok(Operand { value, ty: operand.ty })
                } else if self.types.is_int(operand.ty) {
                    let ty = self.resolve_backing(operand.ty, line)?;
                    let value =
                        fb.bin("negtmp", BinArith::Sub, ty, Value::ConstInt(0), operand.value);
                    Ok(Operand { value, ty: operand.ty })
                } else {
                    Err(error(
                        line,
                        format!(
                            "operator '-' requires a numeric operand, got '{}'",
                            self.types.name(operand.ty)
                        ),
                    ))
                }
            }
            UnaryOp::PreInc => self.gen_increment(fb, operand, line, true, false),
            UnaryOp::PreDec => self.gen_increment(fb, operand, line, false, false),
            UnaryOp::PostInc => self.gen_increment(fb, operand, line, true, true),
            UnaryOp::PostDec => self.gen_increment(fb, operand, line, false, true),
            UnaryOp::AddressOf => {
                // The operand's load is suppressed, so this is the slot.
                self.gen_expr(fb, operand)
            }
            UnaryOp::Deref => {
                let operand = self.gen_expr(fb, operand)?;
                let Some(pointee) = self.types.pointee(operand.ty) else {
                    return Err(error(
                        line,
                        format!(
                            "cannot dereference a value of type '{}'",
                            self.types.name(operand.ty)
                        ),
                    ));
                };
                let backing = self.resolve_backing(pointee, line)?;
                let value = fb.load("dereftmp", backing, operand.value);
                Ok(Operand { value, ty: pointee })
            }
        }
    }

    /// `++`/`--`, prefix and postfix. The postfix forms spill the prior
    /// value to a temporary slot and return it; the prefix forms return the
    /// updated value.
    fn gen_increment(
        &mut self,
        fb: &mut FunctionBuilder,
        operand: ExprRef<'a>,
        line: u32,
        add: bool,
        postfix: bool,
    ) -> GResult<Operand> {
        let symbol = if add { "++" } else { "--" };
        let ExprKind::Load { name, .. } = operand.kind else {
            return Err(error(line, format!("operand of '{}' must be a variable", symbol)));
        };
        let slot = self.slot_or_error(name, line)?;
        if slot.is_const {
            return Err(error(line, "cannot assign to an immutable variable"));
        }

        let (arith, one) = if slot.ty == TypeRegistry::FLOAT {
            (if add { BinArith::FAdd } else { BinArith::FSub }, Value::ConstFloat(1.0))
        } else if self.types.is_int(slot.ty) {
            (if add { BinArith::Add } else { BinArith::Sub }, Value::ConstInt(1))
        } else {
            return Err(error(
                line,
                format!(
                    "operator '{}' requires a numeric operand, got '{}'",
                    symbol,
                    self.types.name(slot.ty)
                ),
            ));
        };
        let backing = self.resolve_backing(slot.ty, line)?;
        let hint = if add { "inctmp" } else { "dectmp" };

        if postfix {
            let spill = fb.alloca(&format!("{}.old", name), backing.clone());
            let current = fb.load(name, backing.clone(), slot.ptr.clone());
            fb.store(backing.clone(), current.clone(), spill.clone());
            let updated = fb.bin(hint, arith, backing.clone(), current, one);
            fb.store(backing.clone(), updated, slot.ptr);
            let old = fb.load(&format!("{}.old", name), backing, spill);
            Ok(Operand { value: old, ty: slot.ty })
        } else {
            let current = fb.load(name, backing.clone(), slot.ptr.clone());
            let updated = fb.bin(hint, arith, backing.clone(), current, one);
            fb.store(backing, updated.clone(), slot.ptr);
            Ok(Operand { value: updated, ty: slot.ty })
        }
    }

    fn gen_binary(
        &mut self,
        fb: &mut FunctionBuilder,
        op: BinOp,
        lhs: ExprRef<'a>,
        rhs: ExprRef<'a>,
        line: u32,
    ) -> GResult<Operand> {
        if op == BinOp::Assign {
            return self.gen_assign(fb, lhs, rhs, line);
        }

        // Compound assigns reject an immutable target before lowering as
        // the plain arithmetic form.
        if op.is_compound_assign() {
            if let ExprKind::Load { name, .. } = lhs.kind {
                let slot = self.slot_or_error(name, line)?;
                if slot.is_const {
                    return Err(error(line, "cannot assign to an immutable variable"));
                }
            }
        }

        let left = self.gen_expr(fb, lhs)?;
        let right = self.gen_expr(fb, rhs)?;
        let result_ty = left.ty;
        let right_value = self.unify(fb, right, result_ty, line, CastContext::Binary)?;
        let backing = self.resolve_backing(result_ty, line)?;

        if op.is_comparison() {
            let value = if backing.is_float() {
                let pred = match op {
                    BinOp::Eq => FcmpPred::Ueq,
                    BinOp::Neq => FcmpPred::Une,
                    BinOp::Less => FcmpPred::Ult,
                    BinOp::LessEq => FcmpPred::Ule,
                    BinOp::Greater => FcmpPred::Ugt,
                    _ => FcmpPred::Uge,
                };
                fb.fcmp(pred, backing, left.value, right_value)
            } else if backing.is_integer() || backing.is_pointer() {
                let pred = match op {
                    BinOp::Eq => IcmpPred::Eq,
                    BinOp::Neq => IcmpPred::Ne,
                    BinOp::Less => IcmpPred::Ult,
                    BinOp::LessEq => IcmpPred::Ule,
                    BinOp::Greater => IcmpPred::Ugt,
                    _ => IcmpPred::Uge,
                };
                fb.icmp(pred, backing, left.value, right_value)
            } else {
                return Err(error(
                    line,
                    format!("cannot compare values of type '{}'", self.types.name(result_ty)),
                ));
            };
            return Ok(Operand { value, ty: TypeRegistry::BOOL });
        }

        if backing.is_float() {
            let (arith, hint) = match op {
                BinOp::Add | BinOp::CompoundAdd => (BinArith::FAdd, "addtmp"),
                BinOp::Sub | BinOp::CompoundSub => (BinArith::FSub, "subtmp"),
                BinOp::Mul | BinOp::CompoundMul => (BinArith::FMul, "multmp"),
                _ => (BinArith::FDiv, "divtmp"),
            };
            let value = fb.bin(hint, arith, backing, left.value, right_value);
            return Ok(Operand { value, ty: result_ty });
        }

        if self.types.is_int(result_ty) {
            let (arith, hint) = match op {
                BinOp::Add | BinOp::CompoundAdd => (BinArith::Add, "addtmp"),
                BinOp::Sub | BinOp::CompoundSub => (BinArith::Sub, "subtmp"),
                BinOp::Mul | BinOp::CompoundMul => (BinArith::Mul, "multmp"),
                _ => {
                    return Err(error(line, "integer division is not supported"));
                }
            };
            let value = fb.bin(hint, arith, backing, left.value, right_value);
            return Ok(Operand { value, ty: result_ty });
        }

        Err(error(
            line,
            format!(
                "invalid operand type '{}' for binary op '{}'",
                self.types.name(result_ty),
                op.symbol()
            ),
        ))
    }

    /// `=` used inside an expression; the left side is a variable or a
    /// dereference of a pointer value.
    fn gen_assign(
        &mut self,
        fb: &mut FunctionBuilder,
        lhs: ExprRef<'a>,
        rhs: ExprRef<'a>,
        line: u32,
    ) -> GResult<Operand> {
        match lhs.kind {
            ExprKind::Load { name, .. } => self.gen_store(fb, name, rhs, false, line),
            ExprKind::Unary { op: UnaryOp::Deref, operand } => {
                let pointer = self.gen_expr(fb, operand)?;
                let Some(pointee) = self.types.pointee(pointer.ty) else {
                    return Err(error(
                        line,
                        format!(
                            "cannot assign through a value of type '{}'",
                            self.types.name(pointer.ty)
                        ),
                    ));
                };
                let operand = self.gen_expr(fb, rhs)?;
                let value = self.unify(fb, operand, pointee, line, CastContext::Assign)?;
                let backing = self.resolve_backing(pointee, line)?;
                fb.store(backing, value.clone(), pointer.value);
                Ok(Operand { value, ty: pointee })
            }
            _ => Err(error(line, "invalid assignment target")),
        }
    }

    fn gen_call(
        &mut self,
        fb: &mut FunctionBuilder,
        callee: &'a str,
        args: &'a [ExprRef<'a>],
        line: u32,
    ) -> GResult<Operand> {
        let Some(proto) = self.protos.get(callee).copied() else {
            return Err(error(line, format!("call to undefined function '{}'", callee)));
        };

        let fixed = proto.params.len();
        if proto.variadic {
            if args.len() < fixed {
                return Err(error(
                    line,
                    format!(
                        "function '{}' expects at least {} arguments (got {})",
                        callee,
                        fixed,
                        args.len()
                    ),
                ));
            }
        } else if args.len() != fixed {
            return Err(error(
                line,
                format!("function '{}' expects {} arguments (got {})", callee, fixed, args.len()),
            ));
        }

        let mut lowered = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let operand = self.gen_expr(fb, arg)?;
            if index < fixed {
                let expected = proto.params[index].ty;
                let value =
                    self.unify(fb, operand, expected, line, CastContext::Arg { index, func: callee })?;
                lowered.push((self.resolve_backing(expected, line)?, value));
            } else {
                // Variadic tail: passed through with its own type.
                lowered.push((self.resolve_backing(operand.ty, line)?, operand.value));
            }
        }

        let ret = self.resolve_backing(proto.ret, line)?;
        let sig = if proto.variadic {
            let mut params = Vec::with_capacity(fixed + 1);
            for param in proto.params {
                params.push(self.resolve_backing(param.ty, line)?.to_string());
            }
            params.push("...".to_string());
            Some(format!("{} ({})", ret, params.join(", ")))
        } else {
            None
        };

        let value = fb.call(ret, callee, sig, lowered);
        Ok(Operand { value: value.unwrap_or(Value::Null), ty: proto.ret })
    }
}
