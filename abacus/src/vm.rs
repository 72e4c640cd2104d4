/// Stack-based interpreter.
///
/// One evaluation stack of values plus a frame stack. Arithmetic failures
/// follow the configured policy: while `stoponerror` is zero they become
/// `Value::Error` pushes that flow through expressions; while positive the
/// next failure aborts the statement (fault) and decrements the counter.
/// Faults unwind through active TRY regions; user interrupts bypass TRY and
/// unwind everything. Most opcodes pass Error operands through untouched.
use crate::bytecode::{Function, Op};
use crate::conf::{DEBUG_CALLS, DEBUG_OPCODES};
use crate::core::value::{self, index_get, index_set, BinOp, UnOp, Value};
use crate::engine::Engine;
use crate::errors::{
    ErrorVal, E_ARITY, E_DIMS, E_INTERRUPT, E_NONINT, E_NOOP, E_STACKDEPTH, E_TYPE, E_UNDEFFIELD,
    E_UNDEFFUNC, E_UNDEFVAR,
};
use crate::intrinsics;
use std::rc::Rc;

const MAX_FRAMES: usize = 512;

struct TryCtx {
    handler_pc: usize,
    stack_depth: usize,
}

struct Frame {
    func: Rc<Function>,
    pc: usize,
    locals: Vec<Value>,
    trys: Vec<TryCtx>,
    stack_floor: usize,
}

#[derive(Default)]
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<Frame>,
}

impl Vm {
    pub fn new() -> Self {
        Vm::default()
    }

    pub fn run(&mut self, engine: &mut Engine, func: Rc<Function>) -> Result<Value, ErrorVal> {
        self.run_with_args(engine, func, Vec::new())
    }

    pub fn run_with_args(
        &mut self,
        engine: &mut Engine,
        func: Rc<Function>,
        args: Vec<Value>,
    ) -> Result<Value, ErrorVal> {
        self.push_call(engine, func, args)?;
        self.dispatch(engine)
    }

    // -----------------------------------------------------------------------
    // Frame management
    // -----------------------------------------------------------------------

    fn push_call(
        &mut self,
        engine: &mut Engine,
        func: Rc<Function>,
        args: Vec<Value>,
    ) -> Result<(), ErrorVal> {
        if self.frames.len() >= MAX_FRAMES {
            return self.fault(ErrorVal::new(E_STACKDEPTH));
        }
        if args.len() > func.params.len() {
            return self.fault(ErrorVal::with_msg(
                E_ARITY,
                format!(
                    "{}() takes {} arguments, got {}",
                    func.name,
                    func.params.len(),
                    args.len()
                ),
            ));
        }
        if engine.conf.calc_debug & DEBUG_CALLS != 0 {
            eprintln!("[call] {} ({} args)", func.name, args.len());
        }
        let mut locals = args;
        locals.resize(func.local_count.max(func.params.len()), Value::Null);
        self.frames.push(Frame {
            func,
            pc: 0,
            locals,
            trys: Vec::new(),
            stack_floor: self.stack.len(),
        });
        Ok(())
    }

    /// Deliver a fault: unwind to the innermost TRY region, pushing the
    /// error value at its handler. Interrupts ignore TRY regions entirely.
    fn fault(&mut self, e: ErrorVal) -> Result<(), ErrorVal> {
        if e.code != E_INTERRUPT {
            while let Some(frame) = self.frames.last_mut() {
                if let Some(ctx) = frame.trys.pop() {
                    frame.pc = ctx.handler_pc;
                    self.stack.truncate(ctx.stack_depth);
                    self.stack.push(Value::Error(e));
                    return Ok(());
                }
                self.frames.pop();
            }
        } else {
            self.frames.clear();
        }
        self.stack.clear();
        Err(e)
    }

    /// Arithmetic-failure policy: error value on the stack, or a fault while
    /// the stoponerror counter is burning down.
    fn err_result(&mut self, engine: &mut Engine, e: ErrorVal) -> Result<(), ErrorVal> {
        if engine.conf.stoponerror > 0 {
            engine.conf.stoponerror -= 1;
            self.fault(e)
        } else {
            self.stack.push(Value::Error(e));
            Ok(())
        }
    }

    fn poll_interrupt(&mut self, engine: &Engine) -> Result<(), ErrorVal> {
        if engine.take_interrupt() {
            return self.fault(ErrorVal::with_msg(E_INTERRUPT, "user abort"));
        }
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack discipline broken by compiler")
    }

    // -----------------------------------------------------------------------
    // Main dispatch loop
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, engine: &mut Engine) -> Result<Value, ErrorVal> {
        loop {
            let (op, func) = {
                let frame = match self.frames.last_mut() {
                    Some(f) => f,
                    None => return Ok(self.stack.pop().unwrap_or(Value::Null)),
                };
                if frame.pc >= frame.func.code.len() {
                    // Fell off the end: implicit null return.
                    let floor = frame.stack_floor;
                    self.frames.pop();
                    self.stack.truncate(floor);
                    if self.frames.is_empty() {
                        return Ok(Value::Null);
                    }
                    self.stack.push(Value::Null);
                    continue;
                }
                let op = frame.func.code[frame.pc].clone();
                frame.pc += 1;
                (op, frame.func.clone())
            };
            if engine.conf.calc_debug & DEBUG_OPCODES != 0 {
                eprintln!(
                    "[op] {}:{} {:?} (stack {})",
                    func.name,
                    self.frames.last().map(|f| f.pc - 1).unwrap_or(0),
                    op,
                    self.stack.len()
                );
            }
            match op {
                Op::PushConst(i) => self.stack.push(func.consts[i as usize].clone()),
                Op::PushNull => self.stack.push(Value::Null),
                Op::Dup => {
                    let top = self.stack.last().expect("dup on empty stack").clone();
                    self.stack.push(top);
                }
                Op::Pop => {
                    self.pop();
                }

                Op::LoadLocal(i) => {
                    let v = self.frames.last().expect("frame").locals[i as usize].clone();
                    self.stack.push(v);
                }
                Op::StoreLocal(i) => {
                    let v = self.pop();
                    self.frames.last_mut().expect("frame").locals[i as usize] = v;
                }
                Op::LoadGlobal(i) => {
                    let name = &func.names[i as usize];
                    match engine.globals.get(name) {
                        Some(v) => self.stack.push(v.clone()),
                        None => self.fault(ErrorVal::with_msg(
                            E_UNDEFVAR,
                            format!("undefined variable '{}'", name),
                        ))?,
                    }
                }
                Op::StoreGlobal(i) => {
                    let v = self.pop();
                    engine.globals.insert(func.names[i as usize].clone(), v);
                }
                Op::LoadStatic(slot) => {
                    self.stack.push(engine.statics[slot as usize].clone());
                }
                Op::StoreStatic(slot) => {
                    let v = self.pop();
                    engine.statics[slot as usize] = v;
                    engine.static_inited[slot as usize] = true;
                }
                Op::InitStaticJump(slot, off) => {
                    if engine.static_inited[slot as usize] {
                        self.jump(off);
                    }
                }

                Op::Call(name_idx, argc) => {
                    self.poll_interrupt(engine)?;
                    let name = &func.names[name_idx as usize];
                    let callee = match engine.funcs.get(name) {
                        Some(f) => f.clone(),
                        None => {
                            // Arguments are consumed either way.
                            self.drop_args(argc as usize);
                            self.fault(ErrorVal::with_msg(
                                E_UNDEFFUNC,
                                format!("undefined function '{}'", name),
                            ))?;
                            continue;
                        }
                    };
                    let args = self.pop_args(argc as usize);
                    self.push_call(engine, callee, args)?;
                }
                Op::CallBuiltin(id, argc) => {
                    self.poll_interrupt(engine)?;
                    let args = self.pop_args(argc as usize);
                    if !intrinsics::accepts_errors(id) {
                        if let Some(err) = args.iter().find_map(|a| match a {
                            Value::Error(e) => Some(e.clone()),
                            _ => None,
                        }) {
                            self.stack.push(Value::Error(err));
                            continue;
                        }
                    }
                    match intrinsics::call(engine, id, args) {
                        Ok(v) => self.stack.push(v),
                        Err(e) => self.err_result(engine, e)?,
                    }
                }

                Op::Index(n) => {
                    let container = self.pop();
                    let keys = self.pop_args(n as usize);
                    if let Value::Error(e) = container {
                        self.stack.push(Value::Error(e));
                        continue;
                    }
                    if let Some(e) = first_error(&keys) {
                        self.stack.push(Value::Error(e));
                        continue;
                    }
                    match index_get(&container, &keys) {
                        Ok(v) => self.stack.push(v),
                        Err(e) => self.err_result(engine, e)?,
                    }
                }
                Op::StoreIndex(n) => {
                    let mut container = self.pop();
                    let keys = self.pop_args(n as usize);
                    let v = self.pop();
                    match index_set(&mut container, &keys, v) {
                        Ok(()) => self.stack.push(container),
                        Err(e) => self.fault(e)?,
                    }
                }
                Op::GetField(i) => {
                    let name = &func.names[i as usize];
                    let v = self.pop();
                    match &v {
                        Value::Error(e) => {
                            let e = e.clone();
                            self.stack.push(Value::Error(e));
                        }
                        Value::Object(o) => {
                            let ty = &engine.obj_types[o.type_id];
                            match ty.field_index(name) {
                                Some(k) => self.stack.push(o.fields[k].clone()),
                                None => self.fault(ErrorVal::with_msg(
                                    E_UNDEFFIELD,
                                    format!("no field '{}' on {}", name, ty.name),
                                ))?,
                            }
                        }
                        _ => self.err_result(
                            engine,
                            ErrorVal::with_msg(
                                E_TYPE,
                                format!("{} has no fields", v.type_name()),
                            ),
                        )?,
                    }
                }
                Op::SetField(i) => {
                    let name = func.names[i as usize].clone();
                    let obj = self.pop();
                    let v = self.pop();
                    match obj {
                        Value::Object(mut o) => {
                            let ty = &engine.obj_types[o.type_id];
                            match ty.field_index(&name) {
                                Some(k) => {
                                    Rc::make_mut(&mut o).fields[k] = v;
                                    self.stack.push(Value::Object(o));
                                }
                                None => {
                                    let tname = ty.name.clone();
                                    self.fault(ErrorVal::with_msg(
                                        E_UNDEFFIELD,
                                        format!("no field '{}' on {}", name, tname),
                                    ))?
                                }
                            }
                        }
                        other => self.fault(ErrorVal::with_msg(
                            E_TYPE,
                            format!("cannot assign a field of {}", other.type_name()),
                        ))?,
                    }
                }

                Op::Binary(bop) => {
                    let b = self.pop();
                    let a = self.pop();
                    // Error operands pass through untouched.
                    if let Value::Error(e) = a {
                        self.stack.push(Value::Error(e));
                        continue;
                    }
                    if let Value::Error(e) = b {
                        self.stack.push(Value::Error(e));
                        continue;
                    }
                    self.apply_binary(engine, bop, a, b)?;
                }
                Op::Unary(uop) => {
                    let a = self.pop();
                    if let Value::Error(e) = a {
                        self.stack.push(Value::Error(e));
                        continue;
                    }
                    self.apply_unary(engine, uop, a)?;
                }

                Op::Branch(off) => {
                    if off < 0 {
                        self.poll_interrupt(engine)?;
                    }
                    self.jump(off);
                }
                Op::BranchIf(off) => {
                    let v = self.pop();
                    if let Value::Error(e) = v {
                        self.fault(e)?;
                        continue;
                    }
                    if v.is_truthy() {
                        if off < 0 {
                            self.poll_interrupt(engine)?;
                        }
                        self.jump(off);
                    }
                }
                Op::BranchIfNot(off) => {
                    let v = self.pop();
                    if let Value::Error(e) = v {
                        self.fault(e)?;
                        continue;
                    }
                    if !v.is_truthy() {
                        if off < 0 {
                            self.poll_interrupt(engine)?;
                        }
                        self.jump(off);
                    }
                }

                Op::Return => {
                    let ret = self.pop();
                    let frame = self.frames.pop().expect("return without frame");
                    if engine.conf.calc_debug & DEBUG_CALLS != 0 {
                        eprintln!("[ret ] {}", frame.func.name);
                    }
                    self.stack.truncate(frame.stack_floor);
                    if self.frames.is_empty() {
                        return Ok(ret);
                    }
                    self.stack.push(ret);
                }

                Op::MakeList(n) => {
                    let items = self.pop_args(n as usize);
                    self.stack.push(Value::List(Rc::new(
                        crate::core::list::List::from_vec(items),
                    )));
                }
                Op::MakeMatrix { dims, inits } => {
                    let init_vals = self.pop_args(inits as usize);
                    let mut bounds = Vec::with_capacity(dims as usize);
                    let mut ok = true;
                    for _ in 0..dims {
                        let hi = self.pop();
                        let lo = self.pop();
                        match (lo.as_i64(), hi.as_i64()) {
                            (Some(lo), Some(hi)) => bounds.push((lo, hi)),
                            _ => ok = false,
                        }
                    }
                    if !ok {
                        self.err_result(
                            engine,
                            ErrorVal::with_msg(E_NONINT, "matrix bounds must be integers"),
                        )?;
                        continue;
                    }
                    bounds.reverse();
                    match crate::core::matrix::Matrix::new(bounds) {
                        Ok(mut m) => {
                            if init_vals.len() > m.size() {
                                self.err_result(
                                    engine,
                                    ErrorVal::with_msg(E_DIMS, "too many matrix initializers"),
                                )?;
                                continue;
                            }
                            for (slot, v) in m.data_mut().iter_mut().zip(init_vals) {
                                *slot = v;
                            }
                            self.stack.push(Value::Matrix(Rc::new(m)));
                        }
                        Err(e) => self.err_result(engine, e)?,
                    }
                }
                Op::NewObj(i) => {
                    let name = &func.names[i as usize];
                    match engine.obj_type_id(name) {
                        Some(id) => {
                            let nfields = engine.obj_types[id].fields.len();
                            self.stack.push(Value::Object(Rc::new(
                                crate::core::object::Object::new(id, nfields),
                            )));
                        }
                        None => self.fault(ErrorVal::with_msg(
                            E_UNDEFVAR,
                            format!("undefined object type '{}'", name),
                        ))?,
                    }
                }

                Op::Try(off) => {
                    let frame = self.frames.last_mut().expect("frame");
                    let handler_pc = (frame.pc as i64 + off as i64) as usize;
                    frame.trys.push(TryCtx {
                        handler_pc,
                        stack_depth: self.stack.len(),
                    });
                }
                Op::EndTry => {
                    self.frames.last_mut().expect("frame").trys.pop();
                }

                Op::PrintPop => {
                    let v = self.pop();
                    if !v.is_null() {
                        self.print_value(engine, &v)?;
                    }
                }
            }
        }
    }

    fn jump(&mut self, off: i32) {
        let frame = self.frames.last_mut().expect("frame");
        frame.pc = (frame.pc as i64 + off as i64) as usize;
    }

    fn pop_args(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    fn drop_args(&mut self, n: usize) {
        let at = self.stack.len() - n;
        self.stack.truncate(at);
    }

    // -----------------------------------------------------------------------
    // Operator application with object override dispatch
    // -----------------------------------------------------------------------

    fn override_for(&self, engine: &Engine, v: &Value, op_name: &str) -> Option<Rc<Function>> {
        if let Value::Object(o) = v {
            let fname = engine.obj_types[o.type_id].op_function(op_name);
            return engine.funcs.get(&fname).cloned();
        }
        None
    }

    fn apply_binary(
        &mut self,
        engine: &mut Engine,
        op: BinOp,
        a: Value,
        b: Value,
    ) -> Result<(), ErrorVal> {
        if matches!(a, Value::Object(_)) || matches!(b, Value::Object(_)) {
            // Left operand's override first; the right's is the fallback and
            // gets the operands swapped so the override always sees its own
            // type first. A third parameter, when declared, receives the
            // sign flag: 0 for source order, 1 for swapped.
            if let Some(f) = self.override_for(engine, &a, op.name()) {
                let args = override_args(&f, a, b, false);
                return self.push_call(engine, f, args);
            }
            if let Some(f) = self.override_for(engine, &b, op.name()) {
                let args = override_args(&f, b, a, true);
                return self.push_call(engine, f, args);
            }
            return self.err_result(
                engine,
                ErrorVal::with_msg(E_NOOP, format!("no {} override for object operand", op.name())),
            );
        }
        match value::binary(op, &a, &b, &engine.conf) {
            Ok(v) => {
                self.stack.push(v);
                Ok(())
            }
            Err(e) => self.err_result(engine, e),
        }
    }

    fn apply_unary(&mut self, engine: &mut Engine, op: UnOp, a: Value) -> Result<(), ErrorVal> {
        if matches!(a, Value::Object(_)) {
            if let Some(f) = self.override_for(engine, &a, op.name()) {
                return self.push_call(engine, f, vec![a]);
            }
            return self.err_result(
                engine,
                ErrorVal::with_msg(E_NOOP, format!("no {} override for object operand", op.name())),
            );
        }
        match value::unary(op, &a, &engine.conf) {
            Ok(v) => {
                self.stack.push(v);
                Ok(())
            }
            Err(e) => self.err_result(engine, e),
        }
    }

    /// Auto-printing honors a user `<type>_print` override.
    fn print_value(&mut self, engine: &mut Engine, v: &Value) -> Result<(), ErrorVal> {
        if let Value::Object(o) = v {
            let fname = engine.obj_types[o.type_id].op_function("print");
            if engine.funcs.contains_key(&fname) {
                engine.invoke(&fname, vec![v.clone()])?;
                println!();
                return Ok(());
            }
        }
        println!("{}", engine.display_value(v));
        Ok(())
    }
}

fn first_error(values: &[Value]) -> Option<ErrorVal> {
    values.iter().find_map(|v| match v {
        Value::Error(e) => Some(e.clone()),
        _ => None,
    })
}

/// Argument list for a binary override call: the owning object first, then
/// the other operand, then the sign flag when the function has a slot for
/// it.
fn override_args(f: &Function, own: Value, other: Value, swapped: bool) -> Vec<Value> {
    let mut args = vec![own, other];
    if f.params.len() >= 3 {
        args.push(Value::from_i64(swapped as i64));
    }
    args
}

// ---------------------------------------------------------------------------
// Tests (hand-assembled functions; source-level tests live in tests/)
// ---------------------------------------------------------------------------
