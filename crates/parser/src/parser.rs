//! Recursive-descent parser with an embedded scope/type resolution pass.
//!
//! Expressions are parsed with a Pratt-style precedence climber; statements,
//! definitions and imports with plain recursive descent. Identifier types
//! are resolved against the scope stack while parsing, definitions are
//! registered on the fly, and calls are resolved against the collected
//! prototypes once the whole module has been read, so functions may be
//! referenced before their definition.
//!
//! On a parse error the parser reports a diagnostic, advances to the next
//! synchronization point (`;` or `}`) and resumes; the final result carries
//! `succeeded = false` if any error was reported. Lex errors abort the
//! parse.

use std::collections::HashMap;

use bumpalo::Bump;
use common::{create_logger, log, Diagnostic, Logger};

use crate::ast::{
    BinOp, Expr, ExprKind, ExprRef, FuncDef, Module, Param, Prototype, Stmt, StmtKind, StructDef,
    UnaryOp, VarDef,
};
use crate::lexer::{LexError, Lexer};
use crate::scope::{Binding, ScopeStack, VarFlags};
use crate::token::{Token, TokenKind};
use crate::types::{TypeId, TypeRegistry};

use std::cell::Cell;

/// Result of parsing one compilation unit.
///
/// `module` is `None` when parsing failed; the type registry and prototype
/// table are returned either way so the generator and diagnostics can use
/// them.
pub struct ParseResult<'a> {
    pub module: Option<Module<'a>>,
    pub types: TypeRegistry,
    pub protos: HashMap<&'a str, Prototype<'a>>,
    pub diagnostics: Vec<Diagnostic>,
    pub succeeded: bool,
}

#[derive(Debug)]
struct ParseError {
    line: u32,
    message: String,
    /// Lex errors cannot be recovered from; the parse stops.
    fatal: bool,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self { line: e.line, message: e.message, fatal: true }
    }
}

type PResult<T> = Result<T, ParseError>;

// Parser state bits, used to track which construct the expression grammar
// was entered from.
const STATE_EXPRESSION: u8 = 1 << 0;
const STATE_VARIABLE_WRITE: u8 = 1 << 1;
const STATE_FUNC_CALL_ARGS: u8 = 1 << 2;

/// Priority the assignment family binds with; the right operand of `=`
/// continues with this.
const ASSIGN_PRIORITY: i32 = 19;

fn binary_op(kind: TokenKind) -> Option<BinOp> {
    let op = match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::PlusEqual => BinOp::CompoundAdd,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::MinusEqual => BinOp::CompoundSub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::StarEqual => BinOp::CompoundMul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::SlashEqual => BinOp::CompoundDiv,
        TokenKind::Equal => BinOp::Assign,
        TokenKind::EqualEqual => BinOp::Eq,
        TokenKind::BangEqual => BinOp::Neq,
        TokenKind::Less => BinOp::Less,
        TokenKind::LessEqual => BinOp::LessEq,
        TokenKind::Greater => BinOp::Greater,
        TokenKind::GreaterEqual => BinOp::GreaterEq,
        _ => return None,
    };
    Some(op)
}

fn binary_priority(op: BinOp) -> i32 {
    match op {
        BinOp::Assign | BinOp::Eq | BinOp::Neq => 19,
        BinOp::Less | BinOp::LessEq | BinOp::Greater | BinOp::GreaterEq => 20,
        BinOp::Add | BinOp::Sub | BinOp::CompoundAdd | BinOp::CompoundSub => 24,
        BinOp::Mul | BinOp::Div | BinOp::CompoundMul | BinOp::CompoundDiv => 30,
    }
}

/// Parse `source` into an AST allocated in `arena`.
pub fn parse<'a>(arena: &'a Bump, source: &str) -> ParseResult<'a> {
    let src = arena.alloc_str(source);

    let lexer = match Lexer::new(src) {
        Ok(lexer) => lexer,
        Err(e) => {
            return ParseResult {
                module: None,
                types: TypeRegistry::new(),
                protos: HashMap::new(),
                diagnostics: vec![Diagnostic::error(e.line, e.message)],
                succeeded: false,
            }
        }
    };

    let mut parser = Parser {
        arena,
        lexer,
        types: TypeRegistry::new(),
        scopes: ScopeStack::new(),
        protos: HashMap::new(),
        calls: Vec::new(),
        diagnostics: Vec::new(),
        state: 0,
        log: create_logger("parser"),
    };

    let module = parser.parse_module();
    parser.resolve_calls();

    let succeeded = parser.diagnostics.iter().all(|d| !d.is_error());
    ParseResult {
        module: if succeeded { Some(module) } else { None },
        types: parser.types,
        protos: parser.protos,
        diagnostics: parser.diagnostics,
        succeeded,
    }
}

struct Parser<'a> {
    arena: &'a Bump,
    lexer: Lexer<'a>,
    types: TypeRegistry,
    scopes: ScopeStack<'a>,
    protos: HashMap<&'a str, Prototype<'a>>,
    /// Call sites, resolved against the prototype table after parsing.
    calls: Vec<ExprRef<'a>>,
    diagnostics: Vec<Diagnostic>,
    state: u8,
    log: Logger,
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn current(&self) -> Token<'a> {
        self.lexer.current()
    }

    fn peek(&self) -> Token<'a> {
        self.lexer.peek()
    }

    fn advance(&mut self) -> PResult<Token<'a>> {
        Ok(self.lexer.next()?)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> PResult<Token<'a>> {
        if !self.check(kind) {
            return Err(self.error_here(message));
        }
        let token = self.current();
        self.advance()?;
        Ok(token)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError { line: self.current().line, message: message.into(), fatal: false }
    }

    fn error_at(&self, line: u32, message: impl Into<String>) -> ParseError {
        ParseError { line, message: message.into(), fatal: false }
    }

    fn report(&mut self, e: ParseError) {
        self.diagnostics.push(Diagnostic::error(e.line, e.message));
    }

    /// Skip to the next synchronization point (`;` consumed, `}` left for
    /// the enclosing block).
    fn synchronize(&mut self) -> PResult<()> {
        loop {
            match self.current().kind {
                TokenKind::Eof | TokenKind::RightBrace => return Ok(()),
                TokenKind::Semicolon => {
                    self.advance()?;
                    return Ok(());
                }
                _ => {
                    self.advance()?;
                }
            }
        }
    }

    fn alloc_expr(&self, line: u32, ty: TypeId, kind: ExprKind<'a>) -> ExprRef<'a> {
        self.arena.alloc(Expr { line, ty: Cell::new(ty), kind })
    }

    // ------------------------------------------------------------------
    // Module level
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> Module<'a> {
        // Load the first token.
        if let Err(e) = self.advance() {
            self.report(e);
            return Module { stmts: &[] };
        }

        let mut stmts = Vec::new();
        while !self.check(TokenKind::Eof) {
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    let fatal = e.fatal;
                    self.report(e);
                    if fatal {
                        break;
                    }
                    if let Err(e) = self.synchronize() {
                        self.report(e);
                        break;
                    }
                }
            }
        }

        Module { stmts: self.arena.alloc_slice_copy(&stmts) }
    }

    /// Resolve every call site against the collected prototypes and patch
    /// the return types of forward calls.
    fn resolve_calls(&mut self) {
        let calls = std::mem::take(&mut self.calls);
        for call in calls {
            let ExprKind::Call { callee, .. } = call.kind else { continue };
            match self.protos.get(callee) {
                Some(proto) => {
                    if !call.ty.get().is_resolved() {
                        call.ty.set(proto.ret);
                    }
                }
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        call.line,
                        format!("call to undefined function '{}'", callee),
                    ));
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt<'a>> {
        match self.current().kind {
            TokenKind::LeftBrace => {
                let line = self.current().line;
                let stmts = self.parse_block()?;
                Ok(Stmt { line, kind: StmtKind::Compound(stmts) })
            }
            TokenKind::If => self.parse_branch(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Import => self.parse_import(),
            TokenKind::Ident => match self.peek().kind {
                TokenKind::Colon => self.parse_var_def(),
                TokenKind::Walrus => self.parse_inferred_var_def(),
                TokenKind::DoubleColon => self.parse_definition(),
                _ => self.parse_expr_statement(),
            },
            _ => self.parse_expr_statement(),
        }
    }

    /// `{ … }` with its own scope; statement errors are reported and
    /// recovered from inside the block.
    fn parse_block(&mut self) -> PResult<&'a [Stmt<'a>]> {
        self.expect(TokenKind::LeftBrace, "expected '{'")?;
        self.scopes.enter();

        let mut stmts = Vec::new();
        let mut fatal: Option<ParseError> = None;

        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) if e.fatal => {
                    fatal = Some(e);
                    break;
                }
                Err(e) => {
                    self.report(e);
                    match self.synchronize() {
                        Ok(()) => {}
                        Err(e) => {
                            fatal = Some(e);
                            break;
                        }
                    }
                }
            }
        }

        let close = if fatal.is_none() {
            self.expect(TokenKind::RightBrace, "expected '}' after block").map(|_| ())
        } else {
            Ok(())
        };

        // Unwind the scope before propagating any error.
        let _ = self.scopes.leave();
        if let Some(e) = fatal {
            return Err(e);
        }
        close?;

        Ok(self.arena.alloc_slice_copy(&stmts))
    }

    fn parse_expr_statement(&mut self) -> PResult<Stmt<'a>> {
        let old_state = self.state;
        self.state |= STATE_EXPRESSION;
        let expr = self.parse_expression(-1);
        self.state = old_state;
        let expr = expr?;

        self.expect(TokenKind::Semicolon, "expected ';' after expression")?;
        let expr = self.lower_assignment(expr);
        Ok(Stmt { line: expr.line, kind: StmtKind::Expr(expr) })
    }

    /// Rewrite statement-level `name = e` and `name op= e` into stores so
    /// the lowering sees an explicit write to the slot. For `op=` the value
    /// is the compound binary itself (`x += e` stores `x + e`), which
    /// preserves the const check on the target.
    fn lower_assignment(&mut self, expr: ExprRef<'a>) -> ExprRef<'a> {
        let ExprKind::Binary { op, lhs, rhs } = expr.kind else { return expr };
        let ExprKind::Load { name, .. } = lhs.kind else { return expr };

        if op == BinOp::Assign {
            self.alloc_expr(
                expr.line,
                lhs.ty.get(),
                ExprKind::Store { name, value: rhs, through_deref: false },
            )
        } else if op.is_compound_assign() {
            self.alloc_expr(
                expr.line,
                lhs.ty.get(),
                ExprKind::Store { name, value: expr, through_deref: false },
            )
        } else {
            expr
        }
    }

    /// `name : [const] T [= expr] ;`
    fn parse_var_def(&mut self) -> PResult<Stmt<'a>> {
        let name = self.expect(TokenKind::Ident, "expected variable name")?;
        self.advance()?; // ':'

        let mut flags = VarFlags { is_const: false, is_global: self.scopes.at_global() };
        if self.check(TokenKind::Const) {
            self.advance()?;
            flags.is_const = true;
        }
        let ty = self.parse_type()?;

        let mut init = None;
        if self.check(TokenKind::Equal) {
            self.advance()?;
            let old_state = self.state;
            self.state |= STATE_VARIABLE_WRITE;
            let expr = self.parse_expression(-1);
            self.state = old_state;
            init = Some(expr?);
        }
        self.expect(TokenKind::Semicolon, "expected ';' after variable definition")?;

        self.define_var(name, ty, flags)?;
        let def = self.arena.alloc(VarDef { line: name.line, name: name.text, ty, init, flags });
        Ok(Stmt { line: name.line, kind: StmtKind::VarDef(def) })
    }

    /// `name := expr ;` with the type taken from the initializer.
    fn parse_inferred_var_def(&mut self) -> PResult<Stmt<'a>> {
        let name = self.expect(TokenKind::Ident, "expected variable name")?;
        self.advance()?; // ':='

        let old_state = self.state;
        self.state |= STATE_VARIABLE_WRITE;
        let init = self.parse_expression(-1);
        self.state = old_state;
        let init = init?;
        self.expect(TokenKind::Semicolon, "expected ';' after variable definition")?;

        let ty = init.ty.get();
        if !ty.is_resolved() {
            return Err(self.error_at(
                name.line,
                format!("cannot infer type of '{}' from forward call", name.text),
            ));
        }
        if ty == TypeRegistry::VOID {
            return Err(
                self.error_at(name.line, format!("cannot define '{}' of type 'void'", name.text))
            );
        }

        let flags = VarFlags { is_const: false, is_global: self.scopes.at_global() };
        self.define_var(name, ty, flags)?;
        let def =
            self.arena.alloc(VarDef { line: name.line, name: name.text, ty, init: Some(init), flags });
        Ok(Stmt { line: name.line, kind: StmtKind::VarDef(def) })
    }

    fn define_var(&mut self, name: Token<'a>, ty: TypeId, flags: VarFlags) -> PResult<()> {
        if !self.scopes.define(name.text, Binding { ty, flags }) {
            return Err(self.error_at(
                name.line,
                format!("variable '{}' is already defined in this scope", name.text),
            ));
        }
        Ok(())
    }

    /// A type reference: `T` or `*T`.
    fn parse_type(&mut self) -> PResult<TypeId> {
        if self.check(TokenKind::Star) {
            self.advance()?;
            let name = self.expect(TokenKind::Ident, "expected type name after '*'")?;
            let inner = self
                .types
                .get(name.text)
                .map_err(|e| self.error_at(name.line, e.message))?;
            return Ok(self.types.pointer_to(inner));
        }

        let name = self.expect(TokenKind::Ident, "expected type name")?;
        self.types.get(name.text).map_err(|e| self.error_at(name.line, e.message))
    }

    /// `name :: ( … )` function definition or `name :: struct { … }`.
    fn parse_definition(&mut self) -> PResult<Stmt<'a>> {
        let name = self.expect(TokenKind::Ident, "expected name")?;
        self.advance()?; // '::'

        match self.current().kind {
            TokenKind::Struct => self.parse_struct_def(name),
            TokenKind::LeftParen => self.parse_func_def(name),
            _ => Err(self.error_here("expected '(' or 'struct' after '::'")),
        }
    }

    fn parse_struct_def(&mut self, name: Token<'a>) -> PResult<Stmt<'a>> {
        self.advance()?; // 'struct'
        self.expect(TokenKind::LeftBrace, "expected '{' after 'struct'")?;

        let mut members: Vec<&'a VarDef<'a>> = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let member = self.expect(TokenKind::Ident, "expected member name")?;
            self.expect(TokenKind::Colon, "expected ':' after member name")?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Semicolon, "expected ';' after member")?;
            members.push(self.arena.alloc(VarDef {
                line: member.line,
                name: member.text,
                ty,
                init: None,
                flags: VarFlags::default(),
            }));
        }
        self.expect(TokenKind::RightBrace, "expected '}' after struct members")?;

        let member_types: Vec<(String, TypeId)> =
            members.iter().map(|m| (m.name.to_string(), m.ty)).collect();
        self.types
            .define_record(name.text, member_types)
            .map_err(|e| self.error_at(name.line, e.message))?;
        log!(self.log, "registered struct '{}'", name.text);

        let def = self.arena.alloc(StructDef {
            line: name.line,
            name: name.text,
            members: self.arena.alloc_slice_copy(&members),
        });
        Ok(Stmt { line: name.line, kind: StmtKind::StructDef(def) })
    }

    fn parse_func_def(&mut self, name: Token<'a>) -> PResult<Stmt<'a>> {
        let (params, variadic) = self.parse_params()?;
        let ret = if self.check(TokenKind::Arrow) {
            self.advance()?;
            self.parse_type()?
        } else {
            TypeRegistry::VOID
        };

        let proto = Prototype { line: name.line, name: name.text, params, ret, variadic };
        // Registered before the body so the function can call itself.
        self.protos.insert(name.text, proto);

        self.scopes.enter();
        for param in params {
            if param.name.is_empty() {
                continue;
            }
            let binding = Binding { ty: param.ty, flags: VarFlags::default() };
            if !self.scopes.define(param.name, binding) {
                let e = self.error_at(
                    name.line,
                    format!("parameter '{}' is already defined", param.name),
                );
                let _ = self.scopes.leave();
                return Err(e);
            }
        }
        let body = self.parse_block();
        let _ = self.scopes.leave();
        let body = body?;
        log!(self.log, "parsed function '{}'", name.text);

        let def = self.arena.alloc(FuncDef { proto, body: Some(body) });
        Ok(Stmt { line: name.line, kind: StmtKind::FuncDef(def) })
    }

    /// `( name : T, …, [...] )`; parameter names may be omitted in
    /// prototypes. `...` must come last.
    fn parse_params(&mut self) -> PResult<(&'a [Param<'a>], bool)> {
        self.expect(TokenKind::LeftParen, "expected '(' after '::'")?;

        let mut params = Vec::new();
        let mut variadic = false;
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.check(TokenKind::Ellipsis) {
                    self.advance()?;
                    variadic = true;
                    if !self.check(TokenKind::RightParen) {
                        return Err(self.error_here("'...' must be the last parameter"));
                    }
                    break;
                }

                let param = self.parse_param()?;
                params.push(param);
                if self.check(TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after parameters")?;

        Ok((self.arena.alloc_slice_copy(&params), variadic))
    }

    fn parse_param(&mut self) -> PResult<Param<'a>> {
        // `name : T` when a colon follows, otherwise a bare type.
        if self.check(TokenKind::Ident) && self.peek().kind == TokenKind::Colon {
            let name = self.current();
            self.advance()?;
            self.advance()?; // ':'
            let ty = self.parse_type()?;
            return Ok(Param { name: name.text, ty });
        }
        if self.check(TokenKind::Ident) || self.check(TokenKind::Star) {
            let ty = self.parse_type()?;
            return Ok(Param { name: "", ty });
        }
        Err(self.error_here("expected a parameter"))
    }

    /// `import name :: ( params ) [-> T] ;`
    fn parse_import(&mut self) -> PResult<Stmt<'a>> {
        let line = self.current().line;
        self.advance()?; // 'import'

        let name = self.expect(TokenKind::Ident, "expected function name after 'import'")?;
        self.expect(TokenKind::DoubleColon, "expected '::' after function name")?;
        let (params, variadic) = self.parse_params()?;
        let ret = if self.check(TokenKind::Arrow) {
            self.advance()?;
            self.parse_type()?
        } else {
            TypeRegistry::VOID
        };
        self.expect(TokenKind::Semicolon, "expected ';' after import")?;

        let proto = Prototype { line: name.line, name: name.text, params, ret, variadic };
        self.protos.insert(name.text, proto);
        log!(self.log, "imported prototype '{}'", name.text);

        let def = self.arena.alloc(FuncDef { proto, body: None });
        Ok(Stmt { line, kind: StmtKind::Import(def) })
    }

    /// `if expr { … } [ else { … } ]`
    fn parse_branch(&mut self) -> PResult<Stmt<'a>> {
        let line = self.current().line;
        self.advance()?; // 'if'

        let old_state = self.state;
        self.state |= STATE_EXPRESSION;
        let cond = self.parse_expression(-1);
        self.state = old_state;
        let cond = cond?;

        let then_body = self.parse_block()?;
        let else_body: &'a [Stmt<'a>] = if self.check(TokenKind::Else) {
            self.advance()?;
            self.parse_block()?
        } else {
            &[]
        };

        Ok(Stmt { line, kind: StmtKind::Branch { cond, then_body, else_body } })
    }

    /// `return [expr] ;`
    fn parse_return(&mut self) -> PResult<Stmt<'a>> {
        let line = self.current().line;
        self.advance()?; // 'return'

        if self.check(TokenKind::Semicolon) {
            self.advance()?;
            return Ok(Stmt { line, kind: StmtKind::Return(None) });
        }

        let old_state = self.state;
        self.state |= STATE_EXPRESSION;
        let value = self.parse_expression(-1);
        self.state = old_state;
        let value = value?;
        self.expect(TokenKind::Semicolon, "expected ';' after return value")?;
        Ok(Stmt { line, kind: StmtKind::Return(Some(value)) })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Pratt loop: parse a unary expression, then keep consuming binary
    /// operators that bind tighter than `min_priority`, recursing on the
    /// right with the operator's own priority.
    fn parse_expression(&mut self, min_priority: i32) -> PResult<ExprRef<'a>> {
        let mut left = self.parse_unary_expression()?;

        loop {
            let token = self.current();
            let Some(op) = binary_op(token.kind) else { return Ok(left) };
            let priority = binary_priority(op);
            if priority <= min_priority {
                return Ok(left);
            }
            self.advance()?;

            let rhs = self.parse_expression(priority)?;
            // Comparisons yield bool; everything else takes the type of
            // its left operand and the lowering unifies the right operand
            // against it.
            let ty = if op.is_comparison() { TypeRegistry::BOOL } else { left.ty.get() };
            left = self.alloc_expr(token.line, ty, ExprKind::Binary { op, lhs: left, rhs });
        }
    }

    fn parse_unary_expression(&mut self) -> PResult<ExprRef<'a>> {
        let token = self.current();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance()?;
                let expr = self.parse_expression(-1)?;
                self.expect(TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::Bang => self.parse_prefix(token, UnaryOp::Not),
            TokenKind::Minus => self.parse_prefix(token, UnaryOp::Neg),
            TokenKind::Increment => self.parse_prefix_slot(token, UnaryOp::PreInc),
            TokenKind::Decrement => self.parse_prefix_slot(token, UnaryOp::PreDec),
            TokenKind::Ampersand => {
                self.advance()?;
                let operand = self.parse_slot_operand("&")?;
                let ty = self.types.pointer_to(operand.ty.get());
                Ok(self.alloc_expr(token.line, ty, ExprKind::Unary {
                    op: UnaryOp::AddressOf,
                    operand,
                }))
            }
            TokenKind::Star => self.parse_deref(token),
            TokenKind::Ident
                if matches!(self.peek().kind, TokenKind::Increment | TokenKind::Decrement) =>
            {
                // Postfix: the look-ahead token decides before the operand
                // is built, so its load suppression is set at construction.
                let operand = self.parse_primary(false)?;
                let op_token = self.current();
                let op = if op_token.kind == TokenKind::Increment {
                    UnaryOp::PostInc
                } else {
                    UnaryOp::PostDec
                };
                self.advance()?;
                Ok(self.alloc_expr(op_token.line, operand.ty.get(), ExprKind::Unary {
                    op,
                    operand,
                }))
            }
            _ => self.parse_primary(true),
        }
    }

    fn parse_prefix(&mut self, token: Token<'a>, op: UnaryOp) -> PResult<ExprRef<'a>> {
        self.advance()?;
        let operand = self.parse_primary(true)?;
        Ok(self.alloc_expr(token.line, operand.ty.get(), ExprKind::Unary { op, operand }))
    }

    fn parse_prefix_slot(&mut self, token: Token<'a>, op: UnaryOp) -> PResult<ExprRef<'a>> {
        self.advance()?;
        let symbol = if op == UnaryOp::PreInc { "++" } else { "--" };
        let operand = self.parse_slot_operand(symbol)?;
        Ok(self.alloc_expr(token.line, operand.ty.get(), ExprKind::Unary { op, operand }))
    }

    /// Parse an operand whose storage slot is wanted rather than its value.
    fn parse_slot_operand(&mut self, symbol: &str) -> PResult<ExprRef<'a>> {
        let operand = self.parse_primary(false)?;
        match operand.kind {
            ExprKind::Load { emit_load: false, .. } => Ok(operand),
            _ => Err(self.error_at(
                operand.line,
                format!("operand of '{}' must be a variable", symbol),
            )),
        }
    }

    /// Prefix `*`: either a read through a pointer or, when `=` follows the
    /// operand, an assignment through it. In the latter case the operand's
    /// load is dropped and the store is flagged to materialize the pointer
    /// from the slot first.
    fn parse_deref(&mut self, token: Token<'a>) -> PResult<ExprRef<'a>> {
        self.advance()?; // '*'
        let operand = self.parse_primary(true)?;

        let operand_ty = operand.ty.get();
        let pointee = if operand_ty.is_resolved() { self.types.pointee(operand_ty) } else { None };

        if self.check(TokenKind::Equal) {
            let ExprKind::Load { name, .. } = operand.kind else {
                return Err(self.error_here("invalid assignment target"));
            };
            let Some(pointee) = pointee else {
                return Err(self.error_at(
                    token.line,
                    format!("cannot assign through a value of type '{}'", self.type_name(operand_ty)),
                ));
            };
            self.advance()?; // '='
            let value = self.parse_expression(ASSIGN_PRIORITY)?;
            return Ok(self.alloc_expr(token.line, pointee, ExprKind::Store {
                name,
                value,
                through_deref: true,
            }));
        }

        let Some(pointee) = pointee else {
            return Err(self.error_at(
                token.line,
                format!("cannot dereference a value of type '{}'", self.type_name(operand_ty)),
            ));
        };
        Ok(self.alloc_expr(token.line, pointee, ExprKind::Unary { op: UnaryOp::Deref, operand }))
    }

    fn type_name(&self, ty: TypeId) -> &str {
        if ty.is_resolved() {
            self.types.name(ty)
        } else {
            "<unresolved>"
        }
    }

    fn parse_primary(&mut self, emit_load: bool) -> PResult<ExprRef<'a>> {
        let token = self.current();
        self.advance()?;

        match token.kind {
            TokenKind::Number => self.parse_number(token),
            TokenKind::Str => {
                Ok(self.alloc_expr(token.line, TypeRegistry::STRING, ExprKind::StrLit(token.text)))
            }
            TokenKind::True => {
                Ok(self.alloc_expr(token.line, TypeRegistry::BOOL, ExprKind::BoolLit(true)))
            }
            TokenKind::False => {
                Ok(self.alloc_expr(token.line, TypeRegistry::BOOL, ExprKind::BoolLit(false)))
            }
            TokenKind::Null => {
                let ty = self.types.pointer_to(TypeRegistry::INT64);
                Ok(self.alloc_expr(token.line, ty, ExprKind::NullLit))
            }
            TokenKind::LeftParen => {
                let expr = self.parse_expression(-1)?;
                self.expect(TokenKind::RightParen, "expected ')' after expression")?;
                Ok(expr)
            }
            TokenKind::Ident => {
                if self.check(TokenKind::LeftParen) {
                    return self.parse_call(token);
                }

                let allowed = STATE_EXPRESSION | STATE_VARIABLE_WRITE | STATE_FUNC_CALL_ARGS;
                if self.state & allowed == 0 {
                    return Err(
                        self.error_at(token.line, "invalid token for primary expression")
                    );
                }

                let Some(binding) = self.scopes.lookup(token.text) else {
                    return Err(self.error_at(
                        token.line,
                        format!("undefined variable '{}'", token.text),
                    ));
                };
                Ok(self.alloc_expr(token.line, binding.ty, ExprKind::Load {
                    name: token.text,
                    emit_load,
                }))
            }
            _ => Err(self.error_at(
                token.line,
                format!("invalid token '{}' for primary expression", token.kind),
            )),
        }
    }

    /// Integral or floating point, decided by the presence of `.` in the
    /// slice; a trailing `f` is stripped either way.
    fn parse_number(&mut self, token: Token<'a>) -> PResult<ExprRef<'a>> {
        let digits = token.text.trim_end_matches('f');
        if token.text.contains('.') {
            let value: f32 = digits.parse().map_err(|_| {
                self.error_at(token.line, format!("invalid number literal '{}'", token.text))
            })?;
            Ok(self.alloc_expr(token.line, TypeRegistry::FLOAT, ExprKind::FloatLit(value)))
        } else {
            let value: i64 = digits.parse().map_err(|_| {
                self.error_at(token.line, format!("invalid number literal '{}'", token.text))
            })?;
            Ok(self.alloc_expr(token.line, TypeRegistry::INT32, ExprKind::IntLit(value)))
        }
    }

    /// `name ( args )`; the callee is resolved after the whole module has
    /// been parsed, so the type may stay unresolved here.
    fn parse_call(&mut self, name: Token<'a>) -> PResult<ExprRef<'a>> {
        self.advance()?; // '('

        let old_state = self.state;
        self.state |= STATE_FUNC_CALL_ARGS;
        let args = self.parse_call_args();
        self.state = old_state;
        let args = args?;

        let ty = self.protos.get(name.text).map(|p| p.ret).unwrap_or(TypeId::UNRESOLVED);
        let expr = self.alloc_expr(name.line, ty, ExprKind::Call { callee: name.text, args });
        self.calls.push(expr);
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<&'a [ExprRef<'a>]> {
        let mut args: Vec<ExprRef<'a>> = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression(-1)?);
                if self.check(TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RightParen, "expected ')' after arguments")?;
        Ok(self.arena.alloc_slice_copy(&args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StmtKind;
    use bumpalo::Bump;
    use indoc::indoc;

    fn parse_ok<'a>(arena: &'a Bump, src: &str) -> ParseResult<'a> {
        let result = parse(arena, src);
        assert!(
            result.succeeded,
            "expected success, diagnostics: {:?}",
            result.diagnostics
        );
        result
    }

    fn body_of<'a>(result: &ParseResult<'a>, index: usize) -> &'a [Stmt<'a>] {
        let module = result.module.expect("module");
        let StmtKind::FuncDef(def) = module.stmts[index].kind else {
            panic!("expected function definition")
        };
        def.body.expect("body")
    }

    #[test]
    fn test_precedence_mul_over_add() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 1 + 2 * 3; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[0].kind else { panic!("expected var def") };
        let ExprKind::Binary { op, rhs, .. } = &def.init.unwrap().kind else {
            panic!("expected binary init")
        };
        assert_eq!(*op, BinOp::Add);
        let ExprKind::Binary { op: rhs_op, .. } = &rhs.kind else {
            panic!("expected nested binary")
        };
        assert_eq!(*rhs_op, BinOp::Mul);
    }

    #[test]
    fn test_left_associativity() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 1 - 2 + 3; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[0].kind else { panic!() };
        // (1 - 2) + 3
        let ExprKind::Binary { op, lhs, .. } = &def.init.unwrap().kind else { panic!() };
        assert_eq!(*op, BinOp::Add);
        let ExprKind::Binary { op: lhs_op, .. } = &lhs.kind else { panic!() };
        assert_eq!(*lhs_op, BinOp::Sub);
    }

    #[test]
    fn test_compound_assign_lowered_to_store() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { x := 1; x += 2; }");
        let body = body_of(&result, 0);
        let StmtKind::Expr(expr) = body[1].kind else { panic!("expected expr statement") };
        let ExprKind::Store { name, value, through_deref } = &expr.kind else {
            panic!("expected store")
        };
        assert_eq!(*name, "x");
        assert!(!*through_deref);
        let ExprKind::Binary { op, lhs, .. } = &value.kind else { panic!("expected binary") };
        assert_eq!(*op, BinOp::CompoundAdd);
        assert!(matches!(lhs.kind, ExprKind::Load { name: "x", emit_load: true }));
    }

    #[test]
    fn test_plain_assign_lowered_to_store() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { x := 1; x = 5; }");
        let body = body_of(&result, 0);
        let StmtKind::Expr(expr) = body[1].kind else { panic!() };
        let ExprKind::Store { name, value, through_deref } = &expr.kind else { panic!() };
        assert_eq!(*name, "x");
        assert!(!*through_deref);
        assert!(matches!(value.kind, ExprKind::IntLit(5)));
    }

    #[test]
    fn test_address_of_suppresses_load() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { x := 1; p := &x; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[1].kind else { panic!() };
        let init = def.init.unwrap();
        let ExprKind::Unary { op, operand } = &init.kind else { panic!("expected unary") };
        assert_eq!(*op, UnaryOp::AddressOf);
        assert!(matches!(operand.kind, ExprKind::Load { name: "x", emit_load: false }));
        // p : *int32
        assert_eq!(result.types.name(def.ty), "*int32");
    }

    #[test]
    fn test_deref_store() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: (p: *int32) { *p = 5; }");
        let body = body_of(&result, 0);
        let StmtKind::Expr(expr) = body[0].kind else { panic!() };
        let ExprKind::Store { name, through_deref, .. } = &expr.kind else {
            panic!("expected store, got {:?}", expr.kind)
        };
        assert_eq!(*name, "p");
        assert!(*through_deref);
        assert_eq!(result.types.name(expr.ty.get()), "int32");
    }

    #[test]
    fn test_deref_read() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: (p: *int32) -> int32 { return *p; }");
        let body = body_of(&result, 0);
        let StmtKind::Return(Some(value)) = body[0].kind else { panic!() };
        let ExprKind::Unary { op, operand } = &value.kind else { panic!() };
        assert_eq!(*op, UnaryOp::Deref);
        assert!(matches!(operand.kind, ExprKind::Load { emit_load: true, .. }));
        assert_eq!(result.types.name(value.ty.get()), "int32");
    }

    #[test]
    fn test_postfix_increment_suppresses_load() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 1; b := a++; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[1].kind else { panic!() };
        let ExprKind::Unary { op, operand } = &def.init.unwrap().kind else { panic!() };
        assert_eq!(*op, UnaryOp::PostInc);
        assert!(matches!(operand.kind, ExprKind::Load { name: "a", emit_load: false }));
    }

    #[test]
    fn test_prefix_increment() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 1; ++a; }");
        let body = body_of(&result, 0);
        let StmtKind::Expr(expr) = body[1].kind else { panic!() };
        let ExprKind::Unary { op, operand } = &expr.kind else { panic!() };
        assert_eq!(*op, UnaryOp::PreInc);
        assert!(matches!(operand.kind, ExprKind::Load { emit_load: false, .. }));
    }

    #[test]
    fn test_type_inference_from_initializer() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 3; b := 2.5; c := true; }");
        let body = body_of(&result, 0);
        let types = &result.types;
        let tys: Vec<&str> = body
            .iter()
            .map(|s| {
                let StmtKind::VarDef(def) = s.kind else { panic!() };
                types.name(def.ty)
            })
            .collect();
        assert_eq!(tys, vec!["int32", "float", "bool"]);
    }

    #[test]
    fn test_comparison_types_as_bool() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { x := 1; b := x < 10; c := x == 1; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[1].kind else { panic!() };
        assert_eq!(def.ty, TypeRegistry::BOOL);
        assert_eq!(def.init.unwrap().ty.get(), TypeRegistry::BOOL);
        let StmtKind::VarDef(def) = body[2].kind else { panic!() };
        assert_eq!(def.ty, TypeRegistry::BOOL);
    }

    #[test]
    fn test_undefined_variable() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { a := b; }");
        assert!(!result.succeeded);
        assert!(result.module.is_none());
        assert!(result.diagnostics[0].message.contains("undefined variable 'b'"));
    }

    #[test]
    fn test_duplicate_definition_in_scope() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { a := 1; a := 2; }");
        assert!(!result.succeeded);
        assert!(result.diagnostics[0].message.contains("already defined"));
    }

    #[test]
    fn test_shadowing_in_inner_scope_allowed() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a := 1; { a := 2.5; } }");
        assert!(result.succeeded);
    }

    #[test]
    fn test_error_recovery_reports_both_errors() {
        let arena = Bump::new();
        let src = indoc! {"
            f :: () {
                a := b;
                c := d;
            }
        "};
        let result = parse(&arena, src);
        assert!(!result.succeeded);
        let errors: Vec<_> = result.diagnostics.iter().filter(|d| d.is_error()).collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].line, 2);
        assert_eq!(errors[1].line, 3);
    }

    #[test]
    fn test_forward_call_resolved() {
        let arena = Bump::new();
        let src = indoc! {"
            f :: () -> int32 { return g(); }
            g :: () -> int32 { return 1; }
        "};
        let result = parse_ok(&arena, src);
        let body = body_of(&result, 0);
        let StmtKind::Return(Some(value)) = body[0].kind else { panic!() };
        assert!(matches!(value.kind, ExprKind::Call { callee: "g", .. }));
        assert_eq!(value.ty.get(), TypeRegistry::INT32);
    }

    #[test]
    fn test_undefined_call_fails_after_parse() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { g(); }");
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("call to undefined function 'g'")));
    }

    #[test]
    fn test_forward_call_inference_rejected() {
        let arena = Bump::new();
        let src = indoc! {"
            f :: () { a := g(); }
            g :: () -> int32 { return 1; }
        "};
        let result = parse(&arena, src);
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("cannot infer type of 'a'")));
    }

    #[test]
    fn test_import_variadic() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "import printf :: (*int8, ...);");
        let proto = result.protos.get("printf").expect("prototype registered");
        assert!(proto.variadic);
        assert_eq!(proto.params.len(), 1);
        assert_eq!(result.types.name(proto.params[0].ty), "*int8");
        assert_eq!(proto.ret, TypeRegistry::VOID);
    }

    #[test]
    fn test_ellipsis_must_be_last() {
        let arena = Bump::new();
        let result = parse(&arena, "import f :: (..., x: int32);");
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("'...' must be the last parameter")));
    }

    #[test]
    fn test_struct_registers_type() {
        let arena = Bump::new();
        let src = indoc! {"
            Vec2 :: struct {
                x : float;
                y : float;
            }
            f :: (v: *Vec2) { }
        "};
        let result = parse_ok(&arena, src);
        let id = result.types.lookup("Vec2").expect("record registered");
        assert_eq!(result.types.members(id).len(), 2);
        assert!(result.types.lookup("*Vec2").is_some());
    }

    #[test]
    fn test_branch_with_else() {
        let arena = Bump::new();
        let src = indoc! {"
            f :: (x: int32) {
                y := 0;
                if x < 10 { y = 1; } else { y = 2; }
            }
        "};
        let result = parse_ok(&arena, src);
        let body = body_of(&result, 0);
        let StmtKind::Branch { cond, then_body, else_body } = body[1].kind else {
            panic!("expected branch")
        };
        assert!(matches!(cond.kind, ExprKind::Binary { op: BinOp::Less, .. }));
        assert_eq!(then_body.len(), 1);
        assert_eq!(else_body.len(), 1);
    }

    #[test]
    fn test_branch_without_else() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: (x: bool) { if x { return; } }");
        let body = body_of(&result, 0);
        let StmtKind::Branch { else_body, .. } = body[0].kind else { panic!() };
        assert!(else_body.is_empty());
    }

    #[test]
    fn test_const_flag() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { a : const int32 = 1; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[0].kind else { panic!() };
        assert!(def.flags.is_const);
        assert!(!def.flags.is_global);
    }

    #[test]
    fn test_global_flag() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "g : int32 = 1;");
        let module = result.module.unwrap();
        let StmtKind::VarDef(def) = module.stmts[0].kind else { panic!() };
        assert!(def.flags.is_global);
    }

    #[test]
    fn test_null_literal_type() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { p := null; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[0].kind else { panic!() };
        assert_eq!(result.types.name(def.ty), "*int64");
    }

    #[test]
    fn test_string_literal() {
        let arena = Bump::new();
        let result = parse_ok(&arena, "f :: () { s := \"hi\"; }");
        let body = body_of(&result, 0);
        let StmtKind::VarDef(def) = body[0].kind else { panic!() };
        assert_eq!(def.ty, TypeRegistry::STRING);
        assert!(matches!(def.init.unwrap().kind, ExprKind::StrLit("hi")));
    }

    #[test]
    fn test_lex_error_stops_parse() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { a := 1; $ b := 2; }");
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("unexpected character")));
    }

    #[test]
    fn test_parse_purity() {
        let arena1 = Bump::new();
        let arena2 = Bump::new();
        let src = "f :: (x: int32) -> int32 { return x + 1; }";
        let a = parse(&arena1, src);
        let b = parse(&arena2, src);
        assert_eq!(a.succeeded, b.succeeded);
        assert_eq!(
            format!("{:?}", a.module.unwrap()),
            format!("{:?}", b.module.unwrap())
        );
    }

    #[test]
    fn test_missing_semicolon_recovers() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { a := 1 }");
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("expected ';'")));
    }

    #[test]
    fn test_unknown_type_reference() {
        let arena = Bump::new();
        let result = parse(&arena, "f :: () { a : vec3; }");
        assert!(!result.succeeded);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("type 'vec3' not registered")));
    }
}
