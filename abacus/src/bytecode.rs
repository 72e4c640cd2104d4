/// Stack-machine opcode set and the compiled function descriptor.
///
/// Jumps are relative to the instruction after the branch; forward targets
/// are emitted as placeholders and patched once the target address is known.
/// Constants and referenced names live in per-function pools.
use crate::core::value::{deep_eq, BinOp, UnOp, Value};
use crate::errors::Span;
use std::fmt;

#[derive(Debug, Clone)]
pub enum Op {
    /// Push consts[i].
    PushConst(u16),
    PushNull,
    Dup,
    Pop,
    LoadLocal(u16),
    StoreLocal(u16),
    /// Globals are late-bound by name (names[i]).
    LoadGlobal(u16),
    StoreGlobal(u16),
    LoadStatic(u32),
    StoreStatic(u32),
    /// Skip the static initializer when the slot was already initialized.
    InitStaticJump(u32, i32),
    /// Call the function names[i] with n stacked arguments.
    Call(u16, u8),
    /// Call builtin table entry i with n stacked arguments.
    CallBuiltin(u16, u8),
    /// Pop container and n keys, push the element.
    Index(u8),
    /// Pop container, n keys and a value; push the updated container.
    StoreIndex(u8),
    /// Pop object, push field names[i].
    GetField(u16),
    /// Pop object and value, push the updated object.
    SetField(u16),
    Binary(BinOp),
    Unary(UnOp),
    Branch(i32),
    BranchIf(i32),
    BranchIfNot(i32),
    Return,
    /// Pop n values into a fresh list.
    MakeList(u16),
    /// Pop `inits` values, then `dims` (lo, hi) bound pairs.
    MakeMatrix { dims: u8, inits: u16 },
    /// Instantiate the object type names[i] with zeroed fields.
    NewObj(u16),
    /// Open a TRY region whose handler sits at the relative offset.
    Try(i32),
    EndTry,
    /// Top-level expression statement: print non-null values, then pop.
    PrintPop,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Immutable after compilation; registered in the Engine by name.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub local_count: usize,
    pub code: Vec<Op>,
    pub consts: Vec<Value>,
    pub names: Vec<String>,
    pub span: Span,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Function {
            name: name.into(),
            params: Vec::new(),
            local_count: 0,
            code: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            span: Span::default(),
        }
    }

    pub fn emit(&mut self, op: Op) -> usize {
        self.code.push(op);
        self.code.len() - 1
    }

    /// Emit a branch with a placeholder offset; patch later.
    pub fn emit_jump(&mut self, op: Op) -> usize {
        debug_assert!(matches!(
            op,
            Op::Branch(_) | Op::BranchIf(_) | Op::BranchIfNot(_) | Op::Try(_)
        ));
        self.emit(op)
    }

    /// Point the placeholder at `idx` to the next instruction to be emitted.
    pub fn patch_jump(&mut self, idx: usize) {
        let target = self.code.len() as i32 - idx as i32 - 1;
        self.set_jump(idx, target);
    }

    pub fn set_jump(&mut self, idx: usize, offset: i32) {
        match &mut self.code[idx] {
            Op::Branch(o) | Op::BranchIf(o) | Op::BranchIfNot(o) | Op::Try(o) => *o = offset,
            Op::InitStaticJump(_, o) => *o = offset,
            other => unreachable!("patching a non-jump opcode {:?}", other),
        }
    }

    /// Offset that jumps back to absolute position `target` when emitted as
    /// the next instruction.
    pub fn back_jump(&self, target: usize) -> i32 {
        target as i32 - self.code.len() as i32 - 1
    }

    pub fn add_const(&mut self, v: Value) -> u16 {
        if let Some(i) = self.consts.iter().position(|c| deep_eq(c, &v)) {
            return i as u16;
        }
        self.consts.push(v);
        (self.consts.len() - 1) as u16
    }

    pub fn add_name(&mut self, name: &str) -> u16 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i as u16;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u16
    }

    /// Disassembly for the calc_debug opcode trace.
    pub fn disassemble(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== {} ({} params, {} locals) ===",
            self.name,
            self.params.len(),
            self.local_count
        );
        for (i, op) in self.code.iter().enumerate() {
            let _ = writeln!(out, "  {:4}  {}", i, op);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_patching() {
        let mut f = Function::new("t");
        let j = f.emit_jump(Op::BranchIfNot(0));
        f.emit(Op::PushNull);
        f.emit(Op::Pop);
        f.patch_jump(j);
        f.emit(Op::Return);
        // Branch at 0 must skip two instructions.
        assert!(matches!(f.code[0], Op::BranchIfNot(2)));
        // Backward jump to position 1 emitted at position 4 is -4.
        assert_eq!(f.back_jump(1), -4);
    }

    #[test]
    fn pools_dedup() {
        let mut f = Function::new("t");
        let a = f.add_const(Value::from_i64(42));
        let b = f.add_const(Value::from_i64(42));
        assert_eq!(a, b);
        let n1 = f.add_name("foo");
        let n2 = f.add_name("foo");
        let n3 = f.add_name("bar");
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);
    }
}
