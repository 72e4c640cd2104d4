/// Bytecode compiler: AST in, `Function` descriptors out.
///
/// Single evaluation stack discipline: every expression nets exactly one
/// pushed value. Assignments compile as value-then-store with copy-on-write
/// write-back chains for nested `a[i].f = v` targets. Loops keep
/// break/continue patch lists; gotos resolve in a fixup pass at function
/// finalization. TRY regions nest; break/continue emit the EndTry ops needed
/// to leave regions entered inside the loop.
use crate::ast::{DimSpec, Expr, FuncDecl, Item, Stmt, SwitchItem, UnaryKind, VarScope};
use crate::bytecode::{Function, Op};
use crate::core::complex::Complex;
use crate::core::rational::Rational;
use crate::core::value::{BinOp, UnOp, Value};
use crate::engine::Engine;
use crate::errors::{ParseError, Span};
use crate::intrinsics;
use std::collections::HashMap;
use std::rc::Rc;

const MAX_LOCALS: usize = u16::MAX as usize;

/// Compile a parsed chunk: register `define`d functions, then build the
/// top-level driver function. `interactive` echoes top-level expression
/// values.
pub fn compile_items(
    engine: &mut Engine,
    items: &[Item],
    interactive: bool,
) -> Result<Rc<Function>, ParseError> {
    for item in items {
        if let Item::Func(decl) = item {
            if decl.name == "list" || intrinsics::builtin_id(&decl.name).is_some() {
                return Err(ParseError::Redefinition {
                    name: decl.name.clone(),
                    span: decl.span,
                });
            }
            let func = compile_function(engine, decl)?;
            engine.funcs.insert(decl.name.clone(), Rc::new(func));
        }
    }
    let mut c = Compiler::new(engine, "*main*", "", interactive);
    for item in items {
        if let Item::Stmt(stmt) = item {
            c.compile_stmt(stmt)?;
        }
    }
    Ok(Rc::new(c.finalize()?))
}

pub fn compile_function(engine: &mut Engine, decl: &FuncDecl) -> Result<Function, ParseError> {
    let mut c = Compiler::new(engine, &decl.name, &decl.name, false);
    c.func.span = decl.span;
    for p in &decl.params {
        c.declare_local(p, decl.span)?;
    }
    c.func.params = decl.params.clone();
    for stmt in &decl.body {
        c.compile_stmt(stmt)?;
    }
    c.finalize()
}

struct Compiler<'e> {
    engine: &'e mut Engine,
    func: Function,
    /// Qualifier for static slot keys ("" at top level).
    scope_name: String,
    interactive: bool,
    locals: Vec<(String, u16)>,
    statics: HashMap<String, u32>,
    declared_globals: Vec<String>,
    break_patches: Vec<Vec<usize>>,
    continue_patches: Vec<Vec<usize>>,
    /// TRY nesting depth at each enclosing loop entry.
    loop_try_depths: Vec<usize>,
    try_depth: usize,
    labels: HashMap<String, (usize, usize)>, // name -> (position, try_depth)
    gotos: Vec<(String, usize, usize, Span)>, // name, jump idx, try_depth, span
}

impl<'e> Compiler<'e> {
    fn new(engine: &'e mut Engine, func_name: &str, scope: &str, interactive: bool) -> Self {
        Compiler {
            engine,
            func: Function::new(func_name),
            scope_name: scope.to_string(),
            interactive,
            locals: Vec::new(),
            statics: HashMap::new(),
            declared_globals: Vec::new(),
            break_patches: Vec::new(),
            continue_patches: Vec::new(),
            loop_try_depths: Vec::new(),
            try_depth: 0,
            labels: HashMap::new(),
            gotos: Vec::new(),
        }
    }

    fn finalize(mut self) -> Result<Function, ParseError> {
        // Resolve gotos.
        for (name, idx, depth, span) in std::mem::take(&mut self.gotos) {
            match self.labels.get(&name) {
                Some(&(pos, label_depth)) => {
                    if label_depth != depth {
                        return Err(ParseError::InvalidSyntax {
                            context: format!("goto '{}' crosses a try boundary", name),
                            span,
                        });
                    }
                    let offset = pos as i32 - idx as i32 - 1;
                    self.func.set_jump(idx, offset);
                }
                None => return Err(ParseError::UndefinedLabel { name, span }),
            }
        }
        if !matches!(self.func.code.last(), Some(Op::Return)) {
            self.func.emit(Op::PushNull);
            self.func.emit(Op::Return);
        }
        self.func.local_count = self
            .func
            .local_count
            .max(self.locals.iter().map(|&(_, s)| s as usize + 1).max().unwrap_or(0));
        Ok(self.func)
    }

    // -----------------------------------------------------------------------
    // Name resolution
    // -----------------------------------------------------------------------

    fn declare_local(&mut self, name: &str, span: Span) -> Result<u16, ParseError> {
        if self.func.local_count >= MAX_LOCALS {
            return Err(ParseError::LimitExceeded {
                what: "locals",
                limit: MAX_LOCALS,
                span,
            });
        }
        let slot = self.func.local_count as u16;
        self.func.local_count += 1;
        self.locals.push((name.to_string(), slot));
        Ok(slot)
    }

    fn local_slot(&self, name: &str) -> Option<u16> {
        self.locals
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|&(_, s)| s)
    }

    fn static_slot(&self, name: &str) -> Option<u32> {
        if let Some(&s) = self.statics.get(name) {
            return Some(s);
        }
        if !self.scope_name.is_empty() {
            if let Some(s) = self.engine.lookup_static(&format!("{}::{}", self.scope_name, name)) {
                return Some(s);
            }
        }
        self.engine.lookup_static(name)
    }

    fn emit_load_ident(&mut self, name: &str) {
        if !self.declared_globals.iter().any(|g| g == name) {
            if let Some(slot) = self.local_slot(name) {
                self.func.emit(Op::LoadLocal(slot));
                return;
            }
            if let Some(slot) = self.static_slot(name) {
                self.func.emit(Op::LoadStatic(slot));
                return;
            }
        }
        let idx = self.func.add_name(name);
        self.func.emit(Op::LoadGlobal(idx));
    }

    fn emit_store_ident(&mut self, name: &str) {
        if !self.declared_globals.iter().any(|g| g == name) {
            if let Some(slot) = self.local_slot(name) {
                self.func.emit(Op::StoreLocal(slot));
                return;
            }
            if let Some(slot) = self.static_slot(name) {
                self.func.emit(Op::StoreStatic(slot));
                return;
            }
        }
        let idx = self.func.add_name(name);
        self.func.emit(Op::StoreGlobal(idx));
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn compile_expr(&mut self, e: &Expr) -> Result<(), ParseError> {
        match e {
            Expr::Number(q, _) => {
                let idx = self.func.add_const(Value::from_rational(q.clone()));
                self.func.emit(Op::PushConst(idx));
            }
            Expr::Imaginary(q, _) => {
                let c = Complex::new(Rational::zero(), q.clone());
                let idx = self.func.add_const(Value::from_complex(c));
                self.func.emit(Op::PushConst(idx));
            }
            Expr::Str(bytes, _) => {
                let idx = self.func.add_const(Value::from_str_bytes(bytes));
                self.func.emit(Op::PushConst(idx));
            }
            Expr::Ident(name, _) => self.emit_load_ident(name),
            Expr::Unary { op, operand, .. } => {
                self.compile_expr(operand)?;
                match op {
                    UnaryKind::Plus => {} // identity
                    UnaryKind::Neg => {
                        self.func.emit(Op::Unary(UnOp::Neg));
                    }
                    UnaryKind::Not => {
                        self.func.emit(Op::Unary(UnOp::Not));
                    }
                    UnaryKind::Comp => {
                        self.func.emit(Op::Unary(UnOp::Comp));
                    }
                }
            }
            Expr::Binary { op, left, right, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.func.emit(Op::Binary(*op));
            }
            Expr::And { left, right } => {
                self.compile_expr(left)?;
                self.func.emit(Op::Dup);
                let jump = self.func.emit_jump(Op::BranchIfNot(0));
                self.func.emit(Op::Pop);
                self.compile_expr(right)?;
                self.func.patch_jump(jump);
            }
            Expr::Or { left, right } => {
                self.compile_expr(left)?;
                self.func.emit(Op::Dup);
                let jump = self.func.emit_jump(Op::BranchIf(0));
                self.func.emit(Op::Pop);
                self.compile_expr(right)?;
                self.func.patch_jump(jump);
            }
            Expr::Ternary { cond, then, els } => {
                self.compile_expr(cond)?;
                let to_else = self.func.emit_jump(Op::BranchIfNot(0));
                self.compile_expr(then)?;
                let to_end = self.func.emit_jump(Op::Branch(0));
                self.func.patch_jump(to_else);
                self.compile_expr(els)?;
                self.func.patch_jump(to_end);
            }
            Expr::Assign { target, op, value, .. } => {
                match op {
                    None => self.compile_expr(value)?,
                    Some(op) => {
                        self.compile_expr(target)?;
                        self.compile_expr(value)?;
                        self.func.emit(Op::Binary(*op));
                    }
                }
                self.func.emit(Op::Dup);
                self.compile_store(target)?;
            }
            Expr::IncDec { target, increment, prefix, .. } => {
                let op = if *increment { BinOp::Add } else { BinOp::Sub };
                self.compile_expr(target)?;
                if !prefix {
                    // Old value is the expression result.
                    self.func.emit(Op::Dup);
                }
                let one = self.func.add_const(Value::from_i64(1));
                self.func.emit(Op::PushConst(one));
                self.func.emit(Op::Binary(op));
                if *prefix {
                    self.func.emit(Op::Dup);
                }
                self.compile_store(target)?;
            }
            Expr::Call { name, args, span } => {
                if name.as_str() == "list" {
                    // List construction has its own opcode.
                    if args.len() > u16::MAX as usize {
                        return Err(ParseError::LimitExceeded {
                            what: "list elements",
                            limit: u16::MAX as usize,
                            span: *span,
                        });
                    }
                    for a in args {
                        self.compile_expr(a)?;
                    }
                    self.func.emit(Op::MakeList(args.len() as u16));
                } else if let Some(id) = intrinsics::builtin_id(name) {
                    let (min, max) = intrinsics::builtin_arity(id);
                    if args.len() < min as usize || args.len() > max as usize {
                        return Err(ParseError::InvalidSyntax {
                            context: format!(
                                "{}() takes {} to {} arguments, got {}",
                                name, min, max, args.len()
                            ),
                            span: *span,
                        });
                    }
                    for a in args {
                        self.compile_expr(a)?;
                    }
                    self.func.emit(Op::CallBuiltin(id, args.len() as u8));
                } else {
                    for a in args {
                        self.compile_expr(a)?;
                    }
                    let idx = self.func.add_name(name);
                    self.func.emit(Op::Call(idx, args.len() as u8));
                }
            }
            Expr::Index { base, indices, .. } => {
                for ix in indices {
                    self.compile_expr(ix)?;
                }
                self.compile_expr(base)?;
                self.func.emit(Op::Index(indices.len() as u8));
            }
            Expr::Field { base, name, .. } => {
                self.compile_expr(base)?;
                let idx = self.func.add_name(name);
                self.func.emit(Op::GetField(idx));
            }
        }
        Ok(())
    }

    /// Store the value on top of the stack into the target. Nested targets
    /// write the updated container back up the chain (copy-on-write value
    /// semantics).
    fn compile_store(&mut self, target: &Expr) -> Result<(), ParseError> {
        match target {
            Expr::Ident(name, _) => {
                self.emit_store_ident(name);
                Ok(())
            }
            Expr::Index { base, indices, .. } => {
                for ix in indices {
                    self.compile_expr(ix)?;
                }
                self.compile_expr(base)?;
                self.func.emit(Op::StoreIndex(indices.len() as u8));
                self.compile_store(base)
            }
            Expr::Field { base, name, .. } => {
                self.compile_expr(base)?;
                let idx = self.func.add_name(name);
                self.func.emit(Op::SetField(idx));
                self.compile_store(base)
            }
            other => Err(ParseError::InvalidSyntax {
                context: "assignment target is not assignable".into(),
                span: other.span(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), ParseError> {
        match stmt {
            Stmt::Empty => {}
            Stmt::Expr(e) => {
                self.compile_expr(e)?;
                let silent = matches!(e, Expr::Assign { .. } | Expr::IncDec { .. });
                if self.interactive && !silent {
                    self.func.emit(Op::PrintPop);
                } else {
                    self.func.emit(Op::Pop);
                }
            }
            Stmt::Block(body) => {
                let saved = self.locals.len();
                for s in body {
                    self.compile_stmt(s)?;
                }
                self.locals.truncate(saved);
            }
            Stmt::If { cond, then, els } => {
                self.compile_expr(cond)?;
                let to_else = self.func.emit_jump(Op::BranchIfNot(0));
                self.compile_stmt(then)?;
                match els {
                    Some(els) => {
                        let to_end = self.func.emit_jump(Op::Branch(0));
                        self.func.patch_jump(to_else);
                        self.compile_stmt(els)?;
                        self.func.patch_jump(to_end);
                    }
                    None => self.func.patch_jump(to_else),
                }
            }
            Stmt::While { cond, body } => {
                let loop_start = self.func.code.len();
                self.compile_expr(cond)?;
                let exit = self.func.emit_jump(Op::BranchIfNot(0));
                self.enter_loop();
                self.compile_stmt(body)?;
                // continue re-tests the condition.
                self.patch_continues_to(loop_start);
                let off = self.func.back_jump(loop_start);
                self.func.emit(Op::Branch(off));
                self.func.patch_jump(exit);
                self.leave_loop();
            }
            Stmt::DoWhile { body, cond } => {
                let loop_start = self.func.code.len();
                self.enter_loop();
                self.compile_stmt(body)?;
                let cond_pos = self.func.code.len();
                self.patch_continues_to(cond_pos);
                self.compile_expr(cond)?;
                let off = self.func.back_jump(loop_start);
                self.func.emit(Op::BranchIf(off));
                self.leave_loop();
            }
            Stmt::For { init, cond, step, body } => {
                if let Some(init) = init {
                    self.compile_expr(init)?;
                    self.func.emit(Op::Pop);
                }
                let loop_start = self.func.code.len();
                let exit = match cond {
                    Some(cond) => {
                        self.compile_expr(cond)?;
                        Some(self.func.emit_jump(Op::BranchIfNot(0)))
                    }
                    None => None,
                };
                self.enter_loop();
                self.compile_stmt(body)?;
                let step_pos = self.func.code.len();
                self.patch_continues_to(step_pos);
                if let Some(step) = step {
                    self.compile_expr(step)?;
                    self.func.emit(Op::Pop);
                }
                let off = self.func.back_jump(loop_start);
                self.func.emit(Op::Branch(off));
                if let Some(exit) = exit {
                    self.func.patch_jump(exit);
                }
                self.leave_loop();
            }
            Stmt::Switch { scrutinee, items } => self.compile_switch(scrutinee, items)?,
            Stmt::Break(span) => {
                if self.break_patches.is_empty() {
                    return Err(ParseError::LoopControlOutsideLoop {
                        context: "break".into(),
                        span: *span,
                    });
                }
                self.emit_try_exits();
                let j = self.func.emit_jump(Op::Branch(0));
                self.break_patches.last_mut().expect("checked above").push(j);
            }
            Stmt::Continue(span) => {
                if self.continue_patches.is_empty() {
                    return Err(ParseError::LoopControlOutsideLoop {
                        context: "continue".into(),
                        span: *span,
                    });
                }
                self.emit_try_exits();
                let j = self.func.emit_jump(Op::Branch(0));
                self.continue_patches.last_mut().expect("checked above").push(j);
            }
            Stmt::Goto(name, span) => {
                let j = self.func.emit_jump(Op::Branch(0));
                self.gotos.push((name.clone(), j, self.try_depth, *span));
            }
            Stmt::Label(name, span) => {
                if self
                    .labels
                    .insert(name.clone(), (self.func.code.len(), self.try_depth))
                    .is_some()
                {
                    return Err(ParseError::Redefinition {
                        name: name.clone(),
                        span: *span,
                    });
                }
            }
            Stmt::Return(value) => {
                match value {
                    Some(e) => self.compile_expr(e)?,
                    None => {
                        self.func.emit(Op::PushNull);
                    }
                }
                self.func.emit(Op::Return);
            }
            Stmt::Print(args) => {
                for a in args {
                    self.compile_expr(a)?;
                }
                let id = intrinsics::builtin_id("print").expect("print is a builtin");
                self.func.emit(Op::CallBuiltin(id, args.len() as u8));
                self.func.emit(Op::Pop);
            }
            Stmt::Try { body, name, handler } => {
                let try_op = self.func.emit_jump(Op::Try(0));
                self.try_depth += 1;
                self.compile_stmt(body)?;
                self.try_depth -= 1;
                self.func.emit(Op::EndTry);
                let to_end = self.func.emit_jump(Op::Branch(0));
                // Handler entry: the error value is on the stack.
                self.func.patch_jump(try_op);
                let saved = self.locals.len();
                let slot = self.declare_local(name, Span::default())?;
                self.func.emit(Op::StoreLocal(slot));
                self.compile_stmt(handler)?;
                self.locals.truncate(saved);
                self.func.patch_jump(to_end);
            }
            Stmt::VarDecl { scope, vars } => self.compile_var_decl(*scope, vars)?,
            Stmt::MatDecl { name, dims, init, span } => {
                self.compile_mat_decl(name, dims, init.as_deref(), *span)?;
            }
            Stmt::ObjDecl { name, fields, span } => {
                self.engine
                    .define_obj_type(name, fields.clone())
                    .map_err(|_| ParseError::Redefinition {
                        name: name.clone(),
                        span: *span,
                    })?;
            }
            Stmt::ObjInstance { type_name, var, span } => {
                if self.engine.obj_type_id(type_name).is_none() {
                    return Err(ParseError::InvalidSyntax {
                        context: format!("unknown object type '{}'", type_name),
                        span: *span,
                    });
                }
                let idx = self.func.add_name(type_name);
                self.func.emit(Op::NewObj(idx));
                self.emit_store_ident(var);
            }
        }
        Ok(())
    }

    fn compile_var_decl(
        &mut self,
        scope: VarScope,
        vars: &[(String, Option<Expr>)],
    ) -> Result<(), ParseError> {
        for (name, init) in vars {
            match scope {
                VarScope::Global => {
                    if !self.declared_globals.iter().any(|g| g == name) {
                        self.declared_globals.push(name.clone());
                    }
                    if let Some(init) = init {
                        self.compile_expr(init)?;
                        let idx = self.func.add_name(name);
                        self.func.emit(Op::StoreGlobal(idx));
                    }
                }
                VarScope::Static => {
                    let key = if self.scope_name.is_empty() {
                        name.clone()
                    } else {
                        format!("{}::{}", self.scope_name, name)
                    };
                    let slot = self.engine.alloc_static(&key);
                    self.statics.insert(name.clone(), slot);
                    if let Some(init) = init {
                        // Run the initializer only on first entry.
                        let guard = self.func.emit(Op::InitStaticJump(slot, 0));
                        self.compile_expr(init)?;
                        self.func.emit(Op::StoreStatic(slot));
                        self.func.patch_jump(guard);
                    }
                }
                VarScope::Local => {
                    let slot = self.declare_local(name, Span::default())?;
                    match init {
                        Some(init) => self.compile_expr(init)?,
                        None => {
                            self.func.emit(Op::PushNull);
                        }
                    }
                    self.func.emit(Op::StoreLocal(slot));
                }
            }
        }
        Ok(())
    }

    fn compile_mat_decl(
        &mut self,
        name: &str,
        dims: &[DimSpec],
        init: Option<&[Expr]>,
        span: Span,
    ) -> Result<(), ParseError> {
        if dims.is_empty() || dims.len() > crate::core::matrix::MAX_DIMS {
            return Err(ParseError::InvalidSyntax {
                context: "matrix needs 1 to 4 dimensions".into(),
                span,
            });
        }
        for d in dims {
            match d {
                DimSpec::Extent(e) => {
                    // [n] means bounds 0 .. n-1.
                    let zero = self.func.add_const(Value::from_i64(0));
                    self.func.emit(Op::PushConst(zero));
                    self.compile_expr(e)?;
                    let one = self.func.add_const(Value::from_i64(1));
                    self.func.emit(Op::PushConst(one));
                    self.func.emit(Op::Binary(BinOp::Sub));
                }
                DimSpec::Range(lo, hi) => {
                    self.compile_expr(lo)?;
                    self.compile_expr(hi)?;
                }
            }
        }
        let inits = init.unwrap_or(&[]);
        for e in inits {
            self.compile_expr(e)?;
        }
        self.func.emit(Op::MakeMatrix {
            dims: dims.len() as u8,
            inits: inits.len() as u16,
        });
        self.emit_store_ident(name);
        Ok(())
    }

    fn compile_switch(&mut self, scrutinee: &Expr, items: &[SwitchItem]) -> Result<(), ParseError> {
        // Scrutinee parks in an anonymous local for the compare chain.
        let slot = self.declare_local("*switch*", Span::default())?;
        self.compile_expr(scrutinee)?;
        self.func.emit(Op::StoreLocal(slot));

        // Pass 1: the linear (const, jump) chain.
        let mut case_jumps = Vec::new();
        let mut default_jump = None;
        for item in items {
            match item {
                SwitchItem::Case(e) => {
                    self.func.emit(Op::LoadLocal(slot));
                    self.compile_expr(e)?;
                    self.func.emit(Op::Binary(BinOp::Eq));
                    case_jumps.push(Some(self.func.emit_jump(Op::BranchIf(0))));
                }
                SwitchItem::Default => {
                    case_jumps.push(None);
                }
                SwitchItem::Stmt(_) => {}
            }
        }
        let miss = self.func.emit_jump(Op::Branch(0));

        // Pass 2: the body stream with fallthrough; patch labels as reached.
        self.enter_loop_breaks_only();
        let mut label_iter = case_jumps.into_iter();
        for item in items {
            match item {
                SwitchItem::Case(_) => {
                    let j = label_iter.next().flatten().expect("case jump recorded");
                    self.func.patch_jump(j);
                }
                SwitchItem::Default => {
                    label_iter.next();
                    default_jump = Some(self.func.code.len());
                }
                SwitchItem::Stmt(s) => self.compile_stmt(s)?,
            }
        }
        match default_jump {
            Some(pos) => {
                let off = pos as i32 - miss as i32 - 1;
                self.func.set_jump(miss, off);
            }
            None => self.func.patch_jump(miss),
        }
        self.leave_loop_breaks_only();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Loop bookkeeping
    // -----------------------------------------------------------------------

    fn enter_loop(&mut self) {
        self.break_patches.push(Vec::new());
        self.continue_patches.push(Vec::new());
        self.loop_try_depths.push(self.try_depth);
    }

    fn leave_loop(&mut self) {
        for j in self.break_patches.pop().expect("loop entered") {
            self.func.patch_jump(j);
        }
        self.continue_patches.pop();
        self.loop_try_depths.pop();
    }

    /// switch: break works, continue belongs to the enclosing loop.
    fn enter_loop_breaks_only(&mut self) {
        self.break_patches.push(Vec::new());
        self.loop_try_depths.push(self.try_depth);
    }

    fn leave_loop_breaks_only(&mut self) {
        for j in self.break_patches.pop().expect("switch entered") {
            self.func.patch_jump(j);
        }
        self.loop_try_depths.pop();
    }

    fn patch_continues_to(&mut self, target: usize) {
        if let Some(list) = self.continue_patches.last_mut() {
            for j in std::mem::take(list) {
                let off = target as i32 - j as i32 - 1;
                self.func.set_jump(j, off);
            }
        }
    }

    /// Leaving TRY regions entered inside the current loop.
    fn emit_try_exits(&mut self) {
        let base = self.loop_try_depths.last().copied().unwrap_or(0);
        for _ in base..self.try_depth {
            self.func.emit(Op::EndTry);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn compile(src: &str) -> Rc<Function> {
        let mut engine = Engine::new();
        let items = Parser::new(src).unwrap().parse().unwrap();
        compile_items(&mut engine, &items, false).unwrap()
    }

    fn compile_err(src: &str) -> ParseError {
        let mut engine = Engine::new();
        let items = Parser::new(src).unwrap().parse().unwrap();
        compile_items(&mut engine, &items, false).unwrap_err()
    }

    #[test]
    fn expression_statement_nets_zero() {
        let f = compile("1 + 2;");
        // PushConst, PushConst, Binary, Pop, PushNull, Return
        assert!(matches!(f.code[2], Op::Binary(BinOp::Add)));
        assert!(matches!(f.code[3], Op::Pop));
        assert!(matches!(f.code.last(), Some(Op::Return)));
    }

    #[test]
    fn functions_are_registered() {
        let mut engine = Engine::new();
        let items = Parser::new("define double(x) { return x * 2; }")
            .unwrap()
            .parse()
            .unwrap();
        compile_items(&mut engine, &items, false).unwrap();
        let f = engine.funcs.get("double").unwrap();
        assert_eq!(f.params, vec!["x"]);
        assert!(f.local_count >= 1);
    }

    #[test]
    fn builtin_name_collision_rejected() {
        assert!(matches!(
            compile_err("define sqrt(x) { return x; }"),
            ParseError::Redefinition { .. }
        ));
    }

    #[test]
    fn builtin_arity_checked_at_compile_time() {
        assert!(matches!(
            compile_err("gcd();"),
            ParseError::InvalidSyntax { .. }
        ));
    }

    #[test]
    fn goto_to_missing_label_fails() {
        assert!(matches!(
            compile_err("goto nowhere;"),
            ParseError::UndefinedLabel { .. }
        ));
    }

    #[test]
    fn break_outside_loop_fails() {
        assert!(matches!(
            compile_err("break;"),
            ParseError::LoopControlOutsideLoop { .. }
        ));
    }

    #[test]
    fn loops_produce_backward_branches() {
        let f = compile("local i = 0; while (i < 3) i += 1;");
        assert!(f
            .code
            .iter()
            .any(|op| matches!(op, Op::Branch(o) if *o < 0)));
    }

    #[test]
    fn try_compiles_with_handler_region() {
        let f = compile("try { 1; } catch e { 2; }");
        assert!(f.code.iter().any(|op| matches!(op, Op::Try(_))));
        assert!(f.code.iter().any(|op| matches!(op, Op::EndTry)));
    }

    #[test]
    fn switch_emits_compare_chain() {
        let f = compile("local x = 2; switch (x) { case 1: break; case 2: break; default: x; }");
        let eqs = f
            .code
            .iter()
            .filter(|op| matches!(op, Op::Binary(BinOp::Eq)))
            .count();
        assert_eq!(eqs, 2);
    }
}
