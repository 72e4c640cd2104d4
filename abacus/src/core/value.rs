/// The runtime value: a tagged union over every type the language knows.
///
/// Containers sit behind `Rc`; the strong count is the reference count and
/// mutation goes through `Rc::make_mut`, so sharing is copy-on-write and the
/// observable semantics stay value-like. Files are the one reference-style
/// value: the underlying handle closes when the last `Rc` drops.
///
/// `binary`/`unary` realize the (tag, tag) dispatch table as Rust pattern
/// matching. Object operands never reach them — the VM resolves user
/// operator overrides first and only falls through here to fail with the
/// no-operator error.
use crate::conf::Config;
use crate::core::assoc::Assoc;
use crate::core::complex::Complex;
use crate::core::list::List;
use crate::core::matrix::Matrix;
use crate::core::object::{ObjType, Object};
use crate::core::random::RandState;
use crate::core::rational::Rational;
use crate::errors::{ErrorVal, MathError, E_BOUNDS, E_NOOP, E_TYPE};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Auxiliary payload types
// ---------------------------------------------------------------------------

/// Length-prefixed byte string; NUL-safe, compared bytewise.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Str {
    bytes: Vec<u8>,
}

impl Str {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Str { bytes }
    }

    pub fn from_str(s: &str) -> Self {
        Str { bytes: s.as_bytes().to_vec() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_display(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    pub fn quoted(&self) -> String {
        let mut out = String::with_capacity(self.bytes.len() + 2);
        out.push('"');
        for &b in &self.bytes {
            match b {
                b'"' => out.push_str("\\\""),
                b'\\' => out.push_str("\\\\"),
                b'\n' => out.push_str("\\n"),
                b'\t' => out.push_str("\\t"),
                b'\r' => out.push_str("\\r"),
                0 => out.push_str("\\0"),
                0x20..=0x7e => out.push(b as char),
                _ => out.push_str(&format!("\\x{:02x}", b)),
            }
        }
        out.push('"');
        out
    }

    pub fn concat(&self, other: &Str) -> Str {
        let mut bytes = self.bytes.clone();
        bytes.extend_from_slice(&other.bytes);
        Str { bytes }
    }
}

/// Raw byte buffer value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub bytes: Vec<u8>,
}

/// Open file resource. Reference-like: dropping the last handle closes it.
#[derive(Debug)]
pub struct FileRes {
    pub id: u64,
    pub path: String,
    pub writable: bool,
    pub handle: RefCell<Option<std::fs::File>>,
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Number(Rc<Rational>),
    Complex(Rc<Complex>),
    Str(Rc<Str>),
    List(Rc<List>),
    Matrix(Rc<Matrix>),
    Assoc(Rc<Assoc>),
    Object(Rc<Object>),
    File(Rc<FileRes>),
    Block(Rc<Block>),
    Rand(Rc<RandState>),
    Error(ErrorVal),
}

impl Value {
    pub fn from_i64(n: i64) -> Value {
        Value::Number(Rc::new(Rational::from_i64(n)))
    }

    pub fn from_rational(q: Rational) -> Value {
        Value::Number(Rc::new(q))
    }

    /// Complex results demote to plain numbers when the imaginary part is
    /// zero — a runtime Complex always has im ≠ 0.
    pub fn from_complex(c: Complex) -> Value {
        if c.is_real() {
            let (re, _) = c.into_parts();
            Value::Number(Rc::new(re))
        } else {
            Value::Complex(Rc::new(c))
        }
    }

    pub fn from_str_bytes(bytes: &[u8]) -> Value {
        Value::Str(Rc::new(Str::from_bytes(bytes.to_vec())))
    }

    pub fn from_string(s: String) -> Value {
        Value::Str(Rc::new(Str::from_bytes(s.into_bytes())))
    }

    pub fn bool_val(b: bool) -> Value {
        Value::from_i64(if b { 1 } else { 0 })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Number(_) => "number",
            Value::Complex(_) => "complex",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Matrix(_) => "matrix",
            Value::Assoc(_) => "assoc",
            Value::Object(_) => "object",
            Value::File(_) => "file",
            Value::Block(_) => "block",
            Value::Rand(_) => "randstate",
            Value::Error(_) => "error",
        }
    }

    pub fn as_number(&self) -> Option<&Rational> {
        match self {
            Value::Number(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_number().and_then(|q| q.to_i64())
    }

    pub fn as_str(&self) -> Option<&Str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(q) => !q.is_zero(),
            Value::Complex(_) => true, // im != 0 by construction
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Matrix(m) => m.data().iter().any(|v| v.is_truthy()),
            Value::Assoc(a) => !a.is_empty(),
            Value::Object(_) => true,
            Value::File(_) => true,
            Value::Block(b) => !b.bytes.is_empty(),
            Value::Rand(_) => true,
            Value::Error(_) => true,
        }
    }

    /// Container protocol: element count (atoms count as one, null as zero).
    pub fn size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Str(s) => s.len(),
            Value::List(l) => l.len(),
            Value::Matrix(m) => m.size(),
            Value::Assoc(a) => a.len(),
            Value::Block(b) => b.bytes.len(),
            Value::Object(o) => o.fields.len(),
            _ => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Equality / ordering / hashing
// ---------------------------------------------------------------------------

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        deep_eq(self, other)
    }
}

pub fn deep_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Complex(x), Value::Complex(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(u, v)| deep_eq(u, v))
        }
        (Value::Matrix(x), Value::Matrix(y)) => {
            x.bounds() == y.bounds()
                && x.data().iter().zip(y.data()).all(|(u, v)| deep_eq(u, v))
        }
        (Value::Assoc(x), Value::Assoc(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| deep_eq(v, w)))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.type_id == y.type_id
                && x.fields.iter().zip(&y.fields).all(|(u, v)| deep_eq(u, v))
        }
        (Value::Block(x), Value::Block(y)) => x == y,
        (Value::File(x), Value::File(y)) => Rc::ptr_eq(x, y),
        (Value::Rand(x), Value::Rand(y)) => Rc::ptr_eq(x, y),
        (Value::Error(x), Value::Error(y)) => x.code == y.code,
        _ => false,
    }
}

/// Deterministic within a run; mixes a per-tag seed with content.
pub fn value_hash(v: &Value) -> u64 {
    const FNV: u64 = 0x1000_0000_01b3;
    let fold = |seed: u64, it: &mut dyn Iterator<Item = u64>| -> u64 {
        let mut h = seed;
        for x in it {
            h ^= x;
            h = h.wrapping_mul(FNV);
        }
        h
    };
    match v {
        Value::Null => 0x6e75_6c6c,
        Value::Number(q) => 0x0100_0000 ^ q.stable_hash(),
        Value::Complex(c) => fold(
            0x0200_0000,
            &mut [c.re().stable_hash(), c.im().stable_hash()].into_iter(),
        ),
        Value::Str(s) => fold(0x0300_0000, &mut s.as_bytes().iter().map(|&b| b as u64)),
        Value::List(l) => fold(0x0400_0000, &mut l.iter().map(value_hash)),
        Value::Matrix(m) => {
            let b = fold(
                0x0500_0000,
                &mut m.bounds().iter().map(|&(lo, hi)| (lo as u64) ^ (hi as u64).rotate_left(32)),
            );
            fold(b, &mut m.data().iter().map(value_hash))
        }
        Value::Assoc(a) => {
            // Order-independent: XOR of per-entry hashes.
            let mut h = 0x0600_0000u64;
            for (k, val) in a.iter() {
                let kh = fold(0x9e37_79b9, &mut k.iter().map(value_hash));
                h ^= kh.wrapping_mul(FNV) ^ value_hash(val);
            }
            h
        }
        Value::Object(o) => {
            let seed = 0x0700_0000 ^ (o.type_id as u64);
            fold(seed, &mut o.fields.iter().map(value_hash))
        }
        Value::File(f) => 0x0800_0000 ^ f.id,
        Value::Block(b) => fold(0x0900_0000, &mut b.bytes.iter().map(|&x| x as u64)),
        Value::Rand(_) => 0x0a00_0000,
        Value::Error(e) => 0x0b00_0000 ^ e.code as u64,
    }
}

/// Ordering is defined for numbers and strings only.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, ErrorVal> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(x.cmp_rat(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.as_bytes().cmp(y.as_bytes())),
        _ => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("cannot order {} and {}", a.type_name(), b.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Operator dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Quo,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    /// Suffix used both in diagnostics and for object override lookup
    /// (`point_add`, `point_mul`, ...).
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Quo => "quo",
            BinOp::Mod => "mod",
            BinOp::Pow => "pow",
            BinOp::Eq => "eq",
            BinOp::Ne => "ne",
            BinOp::Lt => "lt",
            BinOp::Le => "le",
            BinOp::Gt => "gt",
            BinOp::Ge => "ge",
            BinOp::BitAnd => "and",
            BinOp::BitOr => "or",
            BinOp::BitXor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    /// Bitwise complement: ~x = −x − 1 on integers.
    Comp,
}

impl UnOp {
    pub fn name(self) -> &'static str {
        match self {
            UnOp::Neg => "neg",
            UnOp::Not => "not",
            UnOp::Comp => "comp",
        }
    }
}

fn type_err(op: BinOp, a: &Value, b: &Value) -> ErrorVal {
    ErrorVal::with_msg(
        E_TYPE,
        format!("{} undefined for {} and {}", op.name(), a.type_name(), b.type_name()),
    )
}

fn no_op_err(name: &str) -> ErrorVal {
    ErrorVal::with_msg(E_NOOP, format!("no {} override for object operand", name))
}

pub fn binary(op: BinOp, a: &Value, b: &Value, conf: &Config) -> Result<Value, ErrorVal> {
    // Objects only arrive here after override lookup failed in the VM.
    if matches!(a, Value::Object(_)) || matches!(b, Value::Object(_)) {
        return Err(no_op_err(op.name()));
    }
    match op {
        BinOp::Eq => return Ok(Value::bool_val(deep_eq(a, b))),
        BinOp::Ne => return Ok(Value::bool_val(!deep_eq(a, b))),
        BinOp::Lt => return Ok(Value::bool_val(compare(a, b)? == Ordering::Less)),
        BinOp::Le => return Ok(Value::bool_val(compare(a, b)? != Ordering::Greater)),
        BinOp::Gt => return Ok(Value::bool_val(compare(a, b)? == Ordering::Greater)),
        BinOp::Ge => return Ok(Value::bool_val(compare(a, b)? != Ordering::Less)),
        _ => {}
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => num_binary(op, x, y, conf),
        (Value::Complex(_), Value::Number(_))
        | (Value::Number(_), Value::Complex(_))
        | (Value::Complex(_), Value::Complex(_)) => complex_binary(op, a, b),
        (Value::Str(x), Value::Str(y)) => match op {
            BinOp::Add => Ok(Value::Str(Rc::new(x.concat(y)))),
            _ => Err(type_err(op, a, b)),
        },
        (Value::Matrix(x), Value::Matrix(y)) => match op {
            BinOp::Add | BinOp::Sub => Ok(Value::Matrix(Rc::new(x.elementwise(y, op, conf)?))),
            BinOp::Mul => Ok(Value::Matrix(Rc::new(x.matmul(y, conf)?))),
            _ => Err(type_err(op, a, b)),
        },
        (Value::Matrix(x), Value::Number(_) | Value::Complex(_)) => match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                Ok(Value::Matrix(Rc::new(x.broadcast(b, op, false, conf)?)))
            }
            _ => Err(type_err(op, a, b)),
        },
        (Value::Number(_) | Value::Complex(_), Value::Matrix(y)) => match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                Ok(Value::Matrix(Rc::new(y.broadcast(a, op, true, conf)?)))
            }
            _ => Err(type_err(op, a, b)),
        },
        _ => Err(type_err(op, a, b)),
    }
}

fn num_binary(op: BinOp, x: &Rational, y: &Rational, conf: &Config) -> Result<Value, ErrorVal> {
    let q = match op {
        BinOp::Add => x.add(y),
        BinOp::Sub => x.sub(y),
        BinOp::Mul => x.mul(y),
        BinOp::Div => x.div(y).map_err(ErrorVal::from)?,
        BinOp::Quo => Rational::divide(x, y, conf.quo).map_err(ErrorVal::from)?.0,
        BinOp::Mod => Rational::divide(x, y, conf.modulo).map_err(ErrorVal::from)?.1,
        BinOp::Pow => x.pow(y).map_err(ErrorVal::from)?,
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => return bitwise(op, x, y),
        BinOp::Shl | BinOp::Shr => return shift(op, x, y),
        _ => unreachable!("comparisons handled above"),
    };
    Ok(Value::from_rational(q))
}

fn complex_binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, ErrorVal> {
    let to_c = |v: &Value| -> Complex {
        match v {
            Value::Complex(c) => (**c).clone(),
            Value::Number(q) => Complex::from_real((**q).clone()),
            _ => unreachable!("caller matched numeric tags"),
        }
    };
    let x = to_c(a);
    let c = match op {
        BinOp::Add => x.add(&to_c(b)),
        BinOp::Sub => x.sub(&to_c(b)),
        BinOp::Mul => x.mul(&to_c(b)),
        BinOp::Div => x.div(&to_c(b)).map_err(ErrorVal::from)?,
        BinOp::Pow => {
            // Only rational integer exponents are defined here.
            match b {
                Value::Number(e) => x.pow_int(e).map_err(ErrorVal::from)?,
                _ => return Err(type_err(op, a, b)),
            }
        }
        _ => return Err(type_err(op, a, b)),
    };
    Ok(Value::from_complex(c))
}

fn bitwise(op: BinOp, x: &Rational, y: &Rational) -> Result<Value, ErrorVal> {
    if !x.is_integer() || !y.is_integer() {
        return Err(MathError::NonInteger.into());
    }
    if x.is_negative() || y.is_negative() {
        return Err(MathError::InvalidArg("bitwise operation on a negative integer").into());
    }
    let m = match op {
        BinOp::BitAnd => x.num_mag().bit_and(y.num_mag()),
        BinOp::BitOr => x.num_mag().bit_or(y.num_mag()),
        BinOp::BitXor => x.num_mag().bit_xor(y.num_mag()),
        _ => unreachable!(),
    };
    Ok(Value::from_rational(Rational::from_mag(m, false)))
}

fn shift(op: BinOp, x: &Rational, y: &Rational) -> Result<Value, ErrorVal> {
    if !x.is_integer() || !y.is_integer() {
        return Err(MathError::NonInteger.into());
    }
    let count = y
        .to_i64()
        .filter(|c| c.abs() <= 1 << 20)
        .ok_or(MathError::InvalidArg("shift count out of range"))?;
    let left = matches!(op, BinOp::Shl) == (count >= 0);
    let n = count.unsigned_abs() as usize;
    let mag = if left {
        x.num_mag().shl(n)
    } else {
        x.num_mag().shr(n)
    };
    Ok(Value::from_rational(Rational::from_mag(mag, x.is_negative())))
}

pub fn unary(op: UnOp, a: &Value, conf: &Config) -> Result<Value, ErrorVal> {
    if matches!(a, Value::Object(_)) {
        return Err(no_op_err(op.name()));
    }
    match (op, a) {
        (UnOp::Not, v) => Ok(Value::bool_val(!v.is_truthy())),
        (UnOp::Neg, Value::Number(q)) => Ok(Value::from_rational(q.neg())),
        (UnOp::Neg, Value::Complex(c)) => Ok(Value::from_complex(c.neg())),
        (UnOp::Neg, Value::Matrix(m)) => {
            let mut out = (**m).clone();
            for slot in out.data_mut() {
                *slot = unary(UnOp::Neg, slot, conf)?;
            }
            Ok(Value::Matrix(Rc::new(out)))
        }
        (UnOp::Comp, Value::Number(q)) => {
            if !q.is_integer() {
                return Err(MathError::NonInteger.into());
            }
            Ok(Value::from_rational(q.neg().sub(&Rational::one())))
        }
        _ => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("{} undefined for {}", op.name(), a.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Container protocol: index get/set, append, delete
// ---------------------------------------------------------------------------

fn key_ints(keys: &[Value]) -> Result<Vec<i64>, ErrorVal> {
    keys.iter()
        .map(|k| {
            k.as_i64().ok_or_else(|| {
                ErrorVal::with_msg(E_TYPE, format!("index must be an integer, got {}", k.type_name()))
            })
        })
        .collect()
}

pub fn index_get(container: &Value, keys: &[Value]) -> Result<Value, ErrorVal> {
    match container {
        Value::List(l) => {
            let ix = single_index(keys)?;
            l.get(ix)
                .cloned()
                .ok_or_else(|| ErrorVal::with_msg(E_BOUNDS, format!("list index {} out of range", ix)))
        }
        Value::Matrix(m) => Ok(m.get(&key_ints(keys)?)?.clone()),
        Value::Assoc(a) => Ok(a.get(keys).cloned().unwrap_or(Value::Null)),
        Value::Str(s) => {
            let ix = single_index(keys)?;
            s.as_bytes()
                .get(ix)
                .map(|&b| Value::from_str_bytes(&[b]))
                .ok_or_else(|| ErrorVal::with_msg(E_BOUNDS, format!("string index {} out of range", ix)))
        }
        Value::Block(b) => {
            let ix = single_index(keys)?;
            b.bytes
                .get(ix)
                .map(|&x| Value::from_i64(x as i64))
                .ok_or_else(|| ErrorVal::with_msg(E_BOUNDS, format!("block index {} out of range", ix)))
        }
        _ => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("{} is not indexable", container.type_name()),
        )),
    }
}

pub fn index_set(container: &mut Value, keys: &[Value], v: Value) -> Result<(), ErrorVal> {
    match container {
        Value::List(l) => {
            let ix = single_index(keys)?;
            if !Rc::make_mut(l).set(ix, v) {
                return Err(ErrorVal::with_msg(E_BOUNDS, format!("list index {} out of range", ix)));
            }
            Ok(())
        }
        Value::Matrix(m) => Rc::make_mut(m).set(&key_ints(keys)?, v),
        Value::Assoc(a) => {
            Rc::make_mut(a).set(keys.to_vec(), v);
            Ok(())
        }
        Value::Block(b) => {
            let ix = single_index(keys)?;
            let byte = v
                .as_i64()
                .filter(|&x| (0..256).contains(&x))
                .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "block element must be a byte value"))?;
            let blk = Rc::make_mut(b);
            match blk.bytes.get_mut(ix) {
                Some(slot) => {
                    *slot = byte as u8;
                    Ok(())
                }
                None => Err(ErrorVal::with_msg(E_BOUNDS, format!("block index {} out of range", ix))),
            }
        }
        _ => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("cannot assign into {}", container.type_name()),
        )),
    }
}

fn single_index(keys: &[Value]) -> Result<usize, ErrorVal> {
    let ints = key_ints(keys)?;
    match ints.as_slice() {
        [one] if *one >= 0 => Ok(*one as usize),
        [one] => Err(ErrorVal::with_msg(E_BOUNDS, format!("index {} out of range", one))),
        _ => Err(ErrorVal::with_msg(E_TYPE, "expected a single index")),
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStyle {
    Normal,
    Repr,
    Debug,
}

/// Render for output. `types` resolves object type names; the Engine passes
/// its registry through.
pub fn display(v: &Value, conf: &Config, style: PrintStyle, types: &[ObjType]) -> String {
    match v {
        Value::Null => match style {
            PrintStyle::Normal => String::new(),
            _ => "null".into(),
        },
        Value::Number(q) => q.format(conf),
        Value::Complex(c) => format_complex(c, conf),
        Value::Str(s) => match style {
            PrintStyle::Normal => s.to_display(),
            _ => s.quoted(),
        },
        Value::List(l) => {
            let mut parts = Vec::new();
            for (i, item) in l.iter().enumerate() {
                if i >= conf.maxprint {
                    parts.push("...".into());
                    break;
                }
                parts.push(display(item, conf, PrintStyle::Repr, types));
            }
            format!("[{}]", parts.join(", "))
        }
        Value::Matrix(m) => format_matrix(m, conf, types),
        Value::Assoc(a) => {
            let mut parts = Vec::new();
            for (i, (keys, value)) in a.iter().enumerate() {
                if i >= conf.maxprint {
                    parts.push("...".into());
                    break;
                }
                let ks: Vec<String> = keys
                    .iter()
                    .map(|k| display(k, conf, PrintStyle::Repr, types))
                    .collect();
                parts.push(format!(
                    "[{}] = {}",
                    ks.join(", "),
                    display(value, conf, PrintStyle::Repr, types)
                ));
            }
            format!("{{{}}}", parts.join(", "))
        }
        Value::Object(o) => {
            let (name, fields) = match types.get(o.type_id) {
                Some(t) => (t.name.as_str(), t.fields.as_slice()),
                None => ("?", &[] as &[String]),
            };
            let body: Vec<String> = o
                .fields
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let fname = fields.get(i).map(String::as_str).unwrap_or("?");
                    format!("{} = {}", fname, display(f, conf, PrintStyle::Repr, types))
                })
                .collect();
            format!("obj {} {{{}}}", name, body.join(", "))
        }
        Value::File(f) => format!("file(\"{}\", id {})", f.path, f.id),
        Value::Block(b) => format!("blk({})", b.bytes.len()),
        Value::Rand(_) => "randstate()".into(),
        Value::Error(e) => e.describe(),
    }
}

fn format_complex(c: &Complex, conf: &Config) -> String {
    let im = c.im();
    let im_body = format!("{}i", im.abs().format(conf));
    if c.re().is_zero() {
        return if im.is_negative() {
            format!("-{}", im_body)
        } else {
            im_body
        };
    }
    let sign = if im.is_negative() { "-" } else { "+" };
    format!("{}{}{}", c.re().format(conf), sign, im_body)
}

fn format_matrix(m: &Matrix, conf: &Config, types: &[ObjType]) -> String {
    let bounds: Vec<String> = m
        .bounds()
        .iter()
        .map(|&(lo, hi)| format!("{}:{}", lo, hi))
        .collect();
    let header = format!("mat[{}]", bounds.join(", "));
    let indent = " ".repeat(conf.tab as usize);
    if m.dim_count() == 2 {
        let (rlo, rhi) = m.bounds()[0];
        let (clo, chi) = m.bounds()[1];
        let mut out = header;
        let mut shown = 0usize;
        'rows: for r in rlo..=rhi {
            let mut row = Vec::new();
            for c in clo..=chi {
                if shown >= conf.maxprint {
                    row.push("...".into());
                    out.push_str(&format!("\n{}[{}]", indent, row.join(", ")));
                    break 'rows;
                }
                let v = m.get(&[r, c]).expect("in-bounds iteration");
                row.push(display(v, conf, PrintStyle::Repr, types));
                shown += 1;
            }
            out.push_str(&format!("\n{}[{}]", indent, row.join(", ")));
        }
        out
    } else {
        let mut parts = Vec::new();
        for (i, v) in m.data().iter().enumerate() {
            if i >= conf.maxprint {
                parts.push("...".into());
                break;
            }
            parts.push(display(v, conf, PrintStyle::Repr, types));
        }
        format!("{} {{{}}}", header, parts.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
