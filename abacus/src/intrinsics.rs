/// Builtin function registry: the targets of the CallBuiltin opcode.
///
/// Each entry fixes an arity range checked at compile time; handlers take
/// the Engine so they can reach the configuration, caches, registries and
/// files. Handlers that inspect Error values opt in via `accepts_errors`;
/// for everyone else the VM propagates Error arguments without calling.
use crate::conf::{Mode, Round};
use crate::core::complex::Complex;
use crate::core::list::List;
use crate::core::mag::Mag;
use crate::core::random::RandState;
use crate::core::rational::Rational;
use crate::core::transc;
use crate::core::value::{compare, display, Block, FileRes, PrintStyle, Str, Value};
use crate::engine::Engine;
use crate::errors::{
    strerror, CalcError, ErrorVal, MathError, E_DIMS, E_FILE, E_INVARG, E_PERM, E_TYPE,
};
use once_cell::sync::Lazy;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::rc::Rc;

type BuiltinFn = fn(&mut Engine, Vec<Value>) -> Result<Value, ErrorVal>;

pub struct Builtin {
    pub name: &'static str,
    pub min: u8,
    pub max: u8,
    pub accepts_errors: bool,
    func: BuiltinFn,
}

macro_rules! b {
    ($name:expr, $min:expr, $max:expr, $func:expr) => {
        Builtin {
            name: $name,
            min: $min,
            max: $max,
            accepts_errors: false,
            func: $func,
        }
    };
    ($name:expr, $min:expr, $max:expr, $func:expr, errors) => {
        Builtin {
            name: $name,
            min: $min,
            max: $max,
            accepts_errors: true,
            func: $func,
        }
    };
}

pub static BUILTINS: &[Builtin] = &[
    // ── Numeric ──────────────────────────────────────────────────────────────
    b!("abs", 1, 2, bi_abs),
    b!("ceil", 1, 1, bi_ceil),
    b!("floor", 1, 1, bi_floor),
    b!("int", 1, 1, bi_int),
    b!("frac", 1, 1, bi_frac),
    b!("num", 1, 1, bi_num),
    b!("den", 1, 1, bi_den),
    b!("sgn", 1, 1, bi_sgn),
    b!("min", 1, 16, bi_min),
    b!("max", 1, 16, bi_max),
    b!("gcd", 1, 16, bi_gcd),
    b!("lcm", 1, 16, bi_lcm),
    b!("fact", 1, 1, bi_fact),
    b!("isqrt", 1, 1, bi_isqrt),
    b!("sqrt", 1, 2, bi_sqrt),
    b!("root", 2, 3, bi_root),
    b!("exp", 1, 2, bi_exp),
    b!("ln", 1, 2, bi_ln),
    b!("sin", 1, 2, bi_sin),
    b!("cos", 1, 2, bi_cos),
    b!("tan", 1, 2, bi_tan),
    b!("atan", 1, 2, bi_atan),
    b!("pi", 0, 1, bi_pi),
    b!("power", 2, 3, bi_power),
    b!("appr", 1, 2, bi_appr),
    b!("round", 1, 2, bi_round),
    b!("quomod", 2, 2, bi_quomod),
    b!("scale", 2, 2, bi_scale),
    b!("highbit", 1, 1, bi_highbit),
    b!("popcnt", 1, 1, bi_popcnt),
    b!("digits", 1, 1, bi_digits),
    b!("isint", 1, 1, bi_isint),
    b!("iseven", 1, 1, bi_iseven),
    b!("isodd", 1, 1, bi_isodd),
    b!("isreal", 1, 1, bi_isreal),
    b!("iscomplex", 1, 1, bi_iscomplex),
    b!("cmp", 2, 2, bi_cmp),
    b!("re", 1, 1, bi_re),
    b!("im", 1, 1, bi_im),
    b!("conj", 1, 1, bi_conj),
    b!("norm", 1, 1, bi_norm),
    // ── Number theory ────────────────────────────────────────────────────────
    b!("pmod", 3, 3, bi_pmod),
    b!("jacobi", 2, 2, bi_jacobi),
    b!("ptest", 1, 3, bi_ptest),
    b!("nextcand", 1, 3, bi_nextcand),
    b!("prevcand", 1, 3, bi_prevcand),
    b!("factor", 1, 1, bi_factor),
    b!("bernoulli", 1, 1, bi_bernoulli),
    b!("euler", 1, 1, bi_euler),
    // ── Random ───────────────────────────────────────────────────────────────
    b!("srand", 1, 1, bi_srand),
    b!("rand", 1, 2, bi_rand),
    b!("randbit", 1, 1, bi_randbit),
    // ── Containers ───────────────────────────────────────────────────────────
    b!("size", 1, 1, bi_size),
    b!("assoc", 0, 0, bi_assoc),
    b!("append", 2, 16, bi_append),
    b!("push", 2, 16, bi_push),
    b!("pop", 1, 1, bi_pop),
    b!("delete", 2, 5, bi_delete),
    b!("reverse", 1, 1, bi_reverse),
    b!("matdim", 1, 1, bi_matdim),
    b!("mattrans", 1, 1, bi_mattrans),
    b!("det", 1, 1, bi_det),
    b!("inverse", 1, 1, bi_inverse),
    b!("matfill", 2, 2, bi_matfill),
    // ── Strings ──────────────────────────────────────────────────────────────
    b!("strlen", 1, 1, bi_strlen),
    b!("strcat", 1, 16, bi_strcat),
    b!("substr", 3, 3, bi_substr),
    b!("ord", 1, 1, bi_ord),
    b!("char", 1, 1, bi_char),
    b!("str", 1, 1, bi_str, errors),
    // ── Errors ───────────────────────────────────────────────────────────────
    b!("error", 1, 2, bi_error),
    b!("iserror", 1, 1, bi_iserror, errors),
    b!("errno", 1, 1, bi_errno, errors),
    b!("strerror", 1, 1, bi_strerror, errors),
    // ── Output / config ──────────────────────────────────────────────────────
    b!("print", 0, 16, bi_print, errors),
    b!("config", 1, 2, bi_config),
    b!("display", 0, 1, bi_display),
    b!("epsilon", 0, 1, bi_epsilon),
    // ── Files, blocks, evaluation ────────────────────────────────────────────
    b!("fopen", 2, 2, bi_fopen),
    b!("fclose", 1, 1, bi_fclose),
    b!("fgets", 1, 1, bi_fgets),
    b!("fputs", 2, 16, bi_fputs),
    b!("fflush", 1, 1, bi_fflush),
    b!("blk", 1, 1, bi_blk),
    b!("eval", 1, 1, bi_eval),
    b!("read", 1, 1, bi_read),
];

static INDEX: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    BUILTINS
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name, i as u16))
        .collect()
});

pub fn builtin_id(name: &str) -> Option<u16> {
    INDEX.get(name).copied()
}

pub fn builtin_arity(id: u16) -> (u8, u8) {
    let b = &BUILTINS[id as usize];
    (b.min, b.max)
}

pub fn accepts_errors(id: u16) -> bool {
    BUILTINS[id as usize].accepts_errors
}

pub fn call(engine: &mut Engine, id: u16, args: Vec<Value>) -> Result<Value, ErrorVal> {
    (BUILTINS[id as usize].func)(engine, args)
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn want_num<'a>(args: &'a [Value], i: usize) -> Result<&'a Rational, ErrorVal> {
    args[i].as_number().ok_or_else(|| {
        ErrorVal::with_msg(
            E_TYPE,
            format!("expected a number, got {}", args[i].type_name()),
        )
    })
}

fn want_int(args: &[Value], i: usize) -> Result<&Rational, ErrorVal> {
    let q = want_num(args, i)?;
    if !q.is_integer() {
        return Err(MathError::NonInteger.into());
    }
    Ok(q)
}

fn want_nonneg_mag(args: &[Value], i: usize) -> Result<Mag, ErrorVal> {
    let q = want_int(args, i)?;
    if q.is_negative() {
        return Err(ErrorVal::with_msg(E_INVARG, "argument must be nonnegative"));
    }
    Ok(q.num_mag().clone())
}

fn want_str<'a>(args: &'a [Value], i: usize) -> Result<&'a Str, ErrorVal> {
    args[i].as_str().ok_or_else(|| {
        ErrorVal::with_msg(
            E_TYPE,
            format!("expected a string, got {}", args[i].type_name()),
        )
    })
}

/// Optional trailing eps argument, defaulting to the configured epsilon.
fn eps_arg(engine: &Engine, args: &[Value], i: usize) -> Result<Rational, ErrorVal> {
    match args.get(i) {
        Some(v) => {
            let q = v.as_number().ok_or_else(|| {
                ErrorVal::with_msg(E_TYPE, "epsilon must be a positive number")
            })?;
            if q.sign() <= 0 {
                return Err(MathError::InvalidArg("epsilon must be positive").into());
            }
            Ok((*q).clone())
        }
        None => Ok(engine.conf.epsilon.clone()),
    }
}

fn qres(r: Result<Rational, MathError>) -> Result<Value, ErrorVal> {
    r.map(Value::from_rational).map_err(ErrorVal::from)
}

fn cres(r: Result<Complex, MathError>) -> Result<Value, ErrorVal> {
    r.map(Value::from_complex).map_err(ErrorVal::from)
}

// ---------------------------------------------------------------------------
// Numeric builtins
// ---------------------------------------------------------------------------

fn bi_abs(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Number(q) => Ok(Value::from_rational(q.abs())),
        Value::Complex(c) => {
            let eps = eps_arg(engine, &args, 1)?;
            qres(c.abs(&eps))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("abs undefined for {}", other.type_name()),
        )),
    }
}

fn bi_ceil(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.ceil()))
}

fn bi_floor(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.floor()))
}

fn bi_int(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.trunc()))
}

fn bi_frac(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.frac()))
}

fn bi_num(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.numerator()))
}

fn bi_den(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_rational(want_num(&args, 0)?.denominator()))
}

fn bi_sgn(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_i64(want_num(&args, 0)?.sign() as i64))
}

fn fold_nums(
    args: &[Value],
    pick: fn(&Rational, &Rational) -> bool,
) -> Result<Value, ErrorVal> {
    let mut best = want_num(args, 0)?.clone();
    for i in 1..args.len() {
        let q = want_num(args, i)?;
        if pick(q, &best) {
            best = q.clone();
        }
    }
    Ok(Value::from_rational(best))
}

fn bi_min(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    fold_nums(&args, |q, best| q.cmp_rat(best) == Ordering::Less)
}

fn bi_max(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    fold_nums(&args, |q, best| q.cmp_rat(best) == Ordering::Greater)
}

fn bi_gcd(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut g = want_int(&args, 0)?.num_mag().clone();
    for i in 1..args.len() {
        g = g.gcd(want_int(&args, i)?.num_mag());
    }
    Ok(Value::from_rational(Rational::from_mag(g, false)))
}

fn bi_lcm(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut l = want_int(&args, 0)?.num_mag().clone();
    for i in 1..args.len() {
        let b = want_int(&args, i)?.num_mag().clone();
        if l.is_zero() || b.is_zero() {
            l = Mag::zero();
            continue;
        }
        let g = l.gcd(&b);
        l = l.divrem(&g).0.mul(&b);
    }
    Ok(Value::from_rational(Rational::from_mag(l, false)))
}

fn bi_fact(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = want_int(&args, 0)?;
    if n.is_negative() {
        return Err(ErrorVal::with_msg(E_INVARG, "factorial of a negative integer"));
    }
    let n = n
        .to_i64()
        .filter(|&n| n <= 1_000_000)
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "factorial argument too large"))?;
    let mut acc = Mag::one();
    for k in 2..=n as u64 {
        acc = acc.mul(&Mag::from_u64(k));
    }
    Ok(Value::from_rational(Rational::from_mag(acc, false)))
}

fn bi_isqrt(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let q = want_num(&args, 0)?;
    if q.is_negative() {
        return Err(MathError::Domain("isqrt of a negative value").into());
    }
    let m = q.floor().num_mag().isqrt();
    Ok(Value::from_rational(Rational::from_mag(m, false)))
}

fn bi_sqrt(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 1)?;
    match &args[0] {
        Value::Number(q) => {
            if q.is_negative() {
                // Real negative: purely imaginary principal root.
                let r = transc::qsqrt(&q.neg(), &eps, engine.conf.sqrt).map_err(ErrorVal::from)?;
                Ok(Value::from_complex(Complex::new(Rational::zero(), r)))
            } else {
                qres(transc::qsqrt(q, &eps, engine.conf.sqrt))
            }
        }
        Value::Complex(c) => cres(c.sqrt(&eps)),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("sqrt undefined for {}", other.type_name()),
        )),
    }
}

fn bi_root(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let x = want_num(&args, 0)?;
    let n = want_num(&args, 1)?;
    let eps = eps_arg(engine, &args, 2)?;
    qres(transc::qroot(x, n, &eps))
}

fn bi_exp(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 1)?;
    match &args[0] {
        Value::Number(q) => qres(transc::qexp(q, &eps)),
        Value::Complex(c) => {
            let c = (**c).clone();
            cres(c.exp(&mut engine.transc, &eps))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("exp undefined for {}", other.type_name()),
        )),
    }
}

fn bi_ln(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 1)?;
    match &args[0] {
        Value::Number(q) => {
            if q.sign() > 0 {
                qres(transc::qln(q, &eps))
            } else if q.is_zero() {
                Err(MathError::Domain("ln of zero").into())
            } else {
                // ln(-x) = ln|x| + iπ
                let re = transc::qln(&q.abs(), &eps.scale2(-1)).map_err(ErrorVal::from)?;
                let pi = transc::qpi(&mut engine.transc, &eps.scale2(-1)).map_err(ErrorVal::from)?;
                Ok(Value::from_complex(Complex::new(re, pi)))
            }
        }
        Value::Complex(c) => {
            let c = (**c).clone();
            cres(c.ln(&mut engine.transc, &eps))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("ln undefined for {}", other.type_name()),
        )),
    }
}

fn bi_sin(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 1)?;
    match &args[0] {
        Value::Number(q) => qres(transc::qsin(&mut engine.transc, q, &eps)),
        Value::Complex(c) => {
            let c = (**c).clone();
            cres(c.sin(&mut engine.transc, &eps))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("sin undefined for {}", other.type_name()),
        )),
    }
}

fn bi_cos(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 1)?;
    match &args[0] {
        Value::Number(q) => qres(transc::qcos(&mut engine.transc, q, &eps)),
        Value::Complex(c) => {
            let c = (**c).clone();
            cres(c.cos(&mut engine.transc, &eps))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("cos undefined for {}", other.type_name()),
        )),
    }
}

fn bi_tan(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let q = want_num(&args, 0)?;
    let eps = eps_arg(engine, &args, 1)?;
    qres(transc::qtan(&mut engine.transc, q, &eps))
}

fn bi_atan(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let q = want_num(&args, 0)?;
    let eps = eps_arg(engine, &args, 1)?;
    qres(transc::qatan(&mut engine.transc, q, &eps))
}

fn bi_pi(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 0)?;
    qres(transc::qpi(&mut engine.transc, &eps))
}

fn bi_power(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let eps = eps_arg(engine, &args, 2)?;
    let y = want_num(&args, 1)?;
    match &args[0] {
        Value::Number(x) => {
            if y.is_integer() {
                return qres(x.pow(y));
            }
            if x.sign() > 0 {
                // x^y = exp(y·ln x)
                let guard = y.abs().trunc().to_i64().unwrap_or(1).max(1);
                let inner = eps.scale2(-4).div(&Rational::from_i64(guard)).map_err(ErrorVal::from)?;
                let l = transc::qln(x, &inner).map_err(ErrorVal::from)?;
                return qres(transc::qexp(&y.mul(&l), &eps.scale2(-1)));
            }
            if x.is_zero() {
                return if y.is_negative() {
                    Err(MathError::ZeroPowNeg.into())
                } else {
                    Ok(Value::from_i64(0))
                };
            }
            // Negative base, fractional exponent: principal complex branch.
            let z = Complex::from_real((**x).clone());
            complex_power(engine, &z, y, &eps)
        }
        Value::Complex(c) => {
            if y.is_integer() {
                let c = (**c).clone();
                return cres(c.pow_int(y));
            }
            let c = (**c).clone();
            complex_power(engine, &c, y, &eps)
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("power undefined for {}", other.type_name()),
        )),
    }
}

fn complex_power(
    engine: &mut Engine,
    z: &Complex,
    y: &Rational,
    eps: &Rational,
) -> Result<Value, ErrorVal> {
    let inner = eps.scale2(-6);
    let l = z.ln(&mut engine.transc, &inner).map_err(ErrorVal::from)?;
    let scaled = Complex::new(l.re().mul(y), l.im().mul(y));
    cres(scaled.exp(&mut engine.transc, &eps.scale2(-1)))
}

fn bi_appr(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let x = want_num(&args, 0)?;
    let e = match args.get(1) {
        Some(v) => v
            .as_number()
            .map(|q| (*q).clone())
            .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "appr grid must be a number"))?,
        None => engine.conf.epsilon.clone(),
    };
    qres(x.appr(&e, engine.conf.appr))
}

fn bi_round(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let x = want_num(&args, 0)?;
    let places = match args.get(1) {
        Some(v) => v
            .as_i64()
            .filter(|p| (-10_000..=10_000).contains(p))
            .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "round places out of range"))?,
        None => 0,
    };
    qres(x.appr(&Rational::pow10(-places as i32), engine.conf.appr))
}

fn bi_quomod(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let a = want_num(&args, 0)?;
    let b = want_num(&args, 1)?;
    let (q, r) = Rational::divide(a, b, engine.conf.quomod).map_err(ErrorVal::from)?;
    Ok(Value::List(Rc::new(List::from_vec(vec![
        Value::from_rational(q),
        Value::from_rational(r),
    ]))))
}

fn bi_scale(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let x = want_num(&args, 0)?;
    let n = want_int(&args, 1)?
        .to_i64()
        .filter(|n| n.abs() <= 1 << 20)
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "scale count out of range"))?;
    Ok(Value::from_rational(x.scale2(n as i32)))
}

fn bi_highbit(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let m = want_nonneg_mag(&args, 0)?;
    match m.highbit() {
        Some(b) => Ok(Value::from_i64(b as i64)),
        None => Ok(Value::from_i64(-1)),
    }
}

fn bi_popcnt(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_i64(want_nonneg_mag(&args, 0)?.popcount() as i64))
}

fn bi_digits(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let q = want_num(&args, 0)?;
    let s = q.trunc().abs().num_mag().to_str_radix(10);
    Ok(Value::from_i64(s.len() as i64))
}

fn bi_isint(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(matches!(&args[0], Value::Number(q) if q.is_integer())))
}

fn bi_iseven(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(matches!(&args[0], Value::Number(q) if q.is_even())))
}

fn bi_isodd(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(matches!(&args[0], Value::Number(q) if q.is_odd())))
}

fn bi_isreal(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(matches!(&args[0], Value::Number(_))))
}

fn bi_iscomplex(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(matches!(&args[0], Value::Complex(_))))
}

fn bi_cmp(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let ord = compare(&args[0], &args[1])?;
    Ok(Value::from_i64(match ord {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

fn bi_re(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Number(q) => Ok(Value::from_rational((**q).clone())),
        Value::Complex(c) => Ok(Value::from_rational(c.re().clone())),
        other => Err(ErrorVal::with_msg(E_TYPE, format!("re undefined for {}", other.type_name()))),
    }
}

fn bi_im(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Number(_) => Ok(Value::from_i64(0)),
        Value::Complex(c) => Ok(Value::from_rational(c.im().clone())),
        other => Err(ErrorVal::with_msg(E_TYPE, format!("im undefined for {}", other.type_name()))),
    }
}

fn bi_conj(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Number(q) => Ok(Value::from_rational((**q).clone())),
        Value::Complex(c) => Ok(Value::from_complex(c.conj())),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("conj undefined for {}", other.type_name()),
        )),
    }
}

fn bi_norm(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Number(q) => Ok(Value::from_rational(q.square())),
        Value::Complex(c) => Ok(Value::from_rational(c.norm_sq())),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("norm undefined for {}", other.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Number theory
// ---------------------------------------------------------------------------

fn bi_pmod(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let a = want_nonneg_mag(&args, 0)?;
    let e = want_nonneg_mag(&args, 1)?;
    let m = want_nonneg_mag(&args, 2)?;
    if m.is_zero() {
        return Err(MathError::DivByZero.into());
    }
    Ok(Value::from_rational(Rational::from_mag(a.powmod(&e, &m), false)))
}

fn bi_jacobi(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let a = want_nonneg_mag(&args, 0)?;
    let n = want_nonneg_mag(&args, 1)?;
    if n.is_even() {
        return Err(ErrorVal::with_msg(E_INVARG, "jacobi needs an odd denominator"));
    }
    Ok(Value::from_i64(a.jacobi(&n) as i64))
}

fn ptest_args(args: &[Value]) -> Result<(Mag, u32, u64), ErrorVal> {
    let n = want_nonneg_mag(args, 0)?;
    let count = match args.get(1) {
        Some(v) => v
            .as_i64()
            .filter(|&c| (0..=1000).contains(&c))
            .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "witness count out of range"))? as u32,
        None => 20,
    };
    let skip = match args.get(2) {
        Some(v) => v
            .as_i64()
            .filter(|&s| s >= 0)
            .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "witness skip must be nonnegative"))?
            as u64,
        None => 0,
    };
    Ok((n, count, skip))
}

fn bi_ptest(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let (n, count, skip) = ptest_args(&args)?;
    Ok(Value::bool_val(n.ptest(count, skip)))
}

fn bi_nextcand(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let (n, count, skip) = ptest_args(&args)?;
    Ok(Value::from_rational(Rational::from_mag(
        n.nextcand(count, skip),
        false,
    )))
}

fn bi_prevcand(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let (n, count, skip) = ptest_args(&args)?;
    Ok(Value::from_rational(Rational::from_mag(
        n.prevcand(count, skip),
        false,
    )))
}

fn bi_factor(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = want_nonneg_mag(&args, 0)?;
    Ok(Value::from_rational(Rational::from_mag(
        n.smallest_factor(),
        false,
    )))
}

fn bi_bernoulli(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = want_int(&args, 0)?
        .to_i64()
        .filter(|&n| (0..=2048).contains(&n))
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "bernoulli index out of range"))?;
    Ok(Value::from_rational(transc::bernoulli(
        &mut engine.transc,
        n as usize,
    )))
}

fn bi_euler(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = want_int(&args, 0)?
        .to_i64()
        .filter(|&n| (0..=2048).contains(&n))
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "euler index out of range"))?;
    Ok(Value::from_rational(transc::euler(
        &mut engine.transc,
        n as usize,
    )))
}

// ---------------------------------------------------------------------------
// Random
// ---------------------------------------------------------------------------

/// Reseed from an integer, or restore a previously captured state; either
/// way the prior state comes back as a first-class Randstate value.
fn bi_srand(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let next = match &args[0] {
        Value::Rand(state) => (**state).clone(),
        _ => {
            let seed = want_nonneg_mag(&args, 0)?;
            let seed64 = seed.to_u64().unwrap_or_else(|| {
                // Fold larger seeds down.
                seed.limbs()
                    .iter()
                    .fold(0u64, |acc, &l| acc.rotate_left(13) ^ l as u64)
            });
            RandState::new(seed64)
        }
    };
    let prev = std::mem::replace(&mut engine.rand, next);
    Ok(Value::Rand(Rc::new(prev)))
}

fn bi_rand(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let (lo, hi) = if args.len() == 1 {
        (Rational::zero(), want_int(&args, 0)?.clone())
    } else {
        (want_int(&args, 0)?.clone(), want_int(&args, 1)?.clone())
    };
    if hi.cmp_rat(&lo) != Ordering::Greater {
        return Err(ErrorVal::with_msg(E_INVARG, "rand needs an ascending range"));
    }
    let span = hi.sub(&lo);
    let r = engine.rand.below(span.num_mag());
    Ok(Value::from_rational(lo.add(&Rational::from_mag(r, false))))
}

fn bi_randbit(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = want_int(&args, 0)?
        .to_i64()
        .filter(|&n| (0..=1 << 20).contains(&n))
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "bit count out of range"))?;
    let m = engine.rand.bits(n as usize);
    Ok(Value::from_rational(Rational::from_mag(m, false)))
}

// ---------------------------------------------------------------------------
// Containers
// ---------------------------------------------------------------------------

fn bi_size(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_i64(args[0].size() as i64))
}

fn bi_assoc(_: &mut Engine, _args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::Assoc(Rc::new(crate::core::assoc::Assoc::new())))
}

fn want_list(args: &[Value], i: usize) -> Result<List, ErrorVal> {
    match &args[i] {
        Value::List(l) => Ok((**l).clone()),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("expected a list, got {}", other.type_name()),
        )),
    }
}

fn bi_append(_: &mut Engine, mut args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut l = want_list(&args, 0)?;
    for v in args.drain(1..) {
        l.push_back(v);
    }
    Ok(Value::List(Rc::new(l)))
}

fn bi_push(_: &mut Engine, mut args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut l = want_list(&args, 0)?;
    for v in args.drain(1..) {
        l.push_front(v);
    }
    Ok(Value::List(Rc::new(l)))
}

/// Retrieve-and-remove from the front. Value semantics means the caller
/// needs the shrunken list back as well, so the result is the pair
/// [element, remainder] (null element when the list was empty), the same
/// tuple convention quomod uses.
fn bi_pop(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut l = want_list(&args, 0)?;
    let popped = l.pop_front().unwrap_or(Value::Null);
    Ok(Value::List(Rc::new(List::from_vec(vec![
        popped,
        Value::List(Rc::new(l)),
    ]))))
}

fn bi_delete(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::List(l) => {
            let i = args[1]
                .as_i64()
                .filter(|&i| i >= 0)
                .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "list index must be an integer"))?;
            let mut l = (**l).clone();
            if l.remove(i as usize).is_none() {
                return Err(ErrorVal::with_msg(
                    crate::errors::E_BOUNDS,
                    format!("list index {} out of range", i),
                ));
            }
            Ok(Value::List(Rc::new(l)))
        }
        Value::Assoc(a) => {
            let mut a = (**a).clone();
            a.remove(&args[1..]);
            Ok(Value::Assoc(Rc::new(a)))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("delete undefined for {}", other.type_name()),
        )),
    }
}

fn bi_reverse(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut l = want_list(&args, 0)?;
    l.reverse();
    Ok(Value::List(Rc::new(l)))
}

fn want_matrix(args: &[Value], i: usize) -> Result<&crate::core::matrix::Matrix, ErrorVal> {
    match &args[i] {
        Value::Matrix(m) => Ok(m),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("expected a matrix, got {}", other.type_name()),
        )),
    }
}

fn bi_matdim(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_i64(want_matrix(&args, 0)?.dim_count() as i64))
}

fn bi_mattrans(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::Matrix(Rc::new(want_matrix(&args, 0)?.transpose()?)))
}

fn bi_det(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    want_matrix(&args, 0)?.det(&engine.conf)
}

fn bi_inverse(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Matrix(m) => Ok(Value::Matrix(Rc::new(m.inverse(&engine.conf)?))),
        Value::Number(q) => qres(q.inv()),
        Value::Complex(c) => {
            cres(Complex::from_real(Rational::one()).div(c))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("inverse undefined for {}", other.type_name()),
        )),
    }
}

fn bi_matfill(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut m = want_matrix(&args, 0)?.clone();
    m.fill(args[1].clone());
    Ok(Value::Matrix(Rc::new(m)))
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

fn bi_strlen(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_i64(want_str(&args, 0)?.len() as i64))
}

fn bi_strcat(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let mut bytes = Vec::new();
    for i in 0..args.len() {
        bytes.extend_from_slice(want_str(&args, i)?.as_bytes());
    }
    Ok(Value::from_str_bytes(&bytes))
}

fn bi_substr(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let s = want_str(&args, 0)?;
    let start = args[1]
        .as_i64()
        .filter(|&v| v >= 0)
        .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "substr start must be a nonnegative integer"))?
        as usize;
    let len = args[2]
        .as_i64()
        .filter(|&v| v >= 0)
        .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "substr length must be a nonnegative integer"))?
        as usize;
    let bytes = s.as_bytes();
    let start = start.min(bytes.len());
    let end = start.saturating_add(len).min(bytes.len());
    Ok(Value::from_str_bytes(&bytes[start..end]))
}

fn bi_ord(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let s = want_str(&args, 0)?;
    match s.as_bytes().first() {
        Some(&b) => Ok(Value::from_i64(b as i64)),
        None => Ok(Value::from_i64(0)),
    }
}

fn bi_char(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = args[0]
        .as_i64()
        .filter(|&n| (0..256).contains(&n))
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "char needs a byte value"))?;
    Ok(Value::from_str_bytes(&[n as u8]))
}

fn bi_str(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::from_string(engine.display_value(&args[0])))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

fn bi_error(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let code = args[0]
        .as_i64()
        .filter(|&c| (0..=u32::MAX as i64).contains(&c))
        .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "error code must be a nonnegative integer"))?
        as u32;
    let e = match args.get(1) {
        Some(v) => {
            let msg = v
                .as_str()
                .map(|s| s.to_display())
                .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "error message must be a string"))?;
            ErrorVal::with_msg(code, msg)
        }
        None => ErrorVal::new(code),
    };
    Ok(Value::Error(e))
}

fn bi_iserror(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    Ok(Value::bool_val(args[0].is_error()))
}

fn bi_errno(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Error(e) => Ok(Value::from_i64(e.code as i64)),
        _ => Ok(Value::from_i64(0)),
    }
}

fn bi_strerror(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    match &args[0] {
        Value::Error(e) => Ok(Value::from_string(e.describe())),
        Value::Number(q) => {
            let code = q
                .to_i64()
                .filter(|&c| (0..=u32::MAX as i64).contains(&c))
                .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "bad error code"))?;
            Ok(Value::from_string(strerror(code as u32).to_string()))
        }
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("strerror undefined for {}", other.type_name()),
        )),
    }
}

// ---------------------------------------------------------------------------
// Output / configuration
// ---------------------------------------------------------------------------

fn bi_print(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let parts: Vec<String> = args.iter().map(|v| engine.display_value(v)).collect();
    println!("{}", parts.join(" "));
    Ok(Value::Null)
}

fn round_slot<'a>(conf: &'a mut crate::conf::Config, name: &str) -> Option<&'a mut Round> {
    Some(match name {
        "quo" => &mut conf.quo,
        "mod" => &mut conf.modulo,
        "quomod" => &mut conf.quomod,
        "sqrt" => &mut conf.sqrt,
        "appr" => &mut conf.appr,
        "cfappr" => &mut conf.cfappr,
        "outround" => &mut conf.outround,
        _ => return None,
    })
}

fn flag_slot<'a>(conf: &'a mut crate::conf::Config, name: &str) -> Option<&'a mut bool> {
    Some(match name {
        "tilde" => &mut conf.tilde,
        "leadzero" => &mut conf.leadzero,
        "fullzero" => &mut conf.fullzero,
        _ => return None,
    })
}

fn mask_slot<'a>(conf: &'a mut crate::conf::Config, name: &str) -> Option<&'a mut u32> {
    Some(match name {
        "calc_debug" => &mut conf.calc_debug,
        "lib_debug" => &mut conf.lib_debug,
        "resource_debug" => &mut conf.resource_debug,
        "user_debug" => &mut conf.user_debug,
        _ => return None,
    })
}

fn bi_config(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let name = want_str(&args, 0)?.to_display();
    if crate::conf::prop_def(&name).is_none() {
        return Err(ErrorVal::with_msg(
            E_INVARG,
            format!("unknown configuration property '{}'", name),
        ));
    }
    let new = args.get(1).cloned();
    let conf = &mut engine.conf;

    // Rounding-policy slots share one setter.
    if let Some(slot) = round_slot(conf, &name) {
        let old = Value::from_string(slot.name().to_string());
        if let Some(v) = new {
            let mode = v
                .as_str()
                .and_then(|s| Round::from_name(&s.to_display()))
                .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "bad rounding mode name"))?;
            *slot = mode;
        }
        return Ok(old);
    }
    if let Some(slot) = flag_slot(conf, &name) {
        let old = Value::bool_val(*slot);
        if let Some(v) = new {
            *slot = v.is_truthy();
        }
        return Ok(old);
    }
    if let Some(slot) = mask_slot(conf, &name) {
        let old = Value::from_i64(*slot as i64);
        if let Some(v) = new {
            *slot = v
                .as_i64()
                .filter(|&m| (0..=u32::MAX as i64).contains(&m))
                .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "debug mask must be an integer"))?
                as u32;
        }
        return Ok(old);
    }
    match name.as_str() {
        "mode" => {
            let old = Value::from_string(conf.mode.name().to_string());
            if let Some(v) = new {
                let mode = v
                    .as_str()
                    .and_then(|s| Mode::from_name(&s.to_display()))
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "bad output mode name"))?;
                conf.mode = mode;
            }
            Ok(old)
        }
        "display" => {
            let old = Value::from_i64(conf.display as i64);
            if let Some(v) = new {
                conf.display = v
                    .as_i64()
                    .filter(|&d| (0..=100_000).contains(&d))
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "display digits out of range"))?
                    as u32;
            }
            Ok(old)
        }
        "epsilon" => {
            let old = Value::from_rational(conf.epsilon.clone());
            if let Some(v) = new {
                let e = v
                    .as_number()
                    .filter(|q| q.sign() > 0)
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "epsilon must be positive"))?;
                conf.epsilon = (*e).clone();
            }
            Ok(old)
        }
        "tab" => {
            let old = Value::from_i64(conf.tab as i64);
            if let Some(v) = new {
                conf.tab = v
                    .as_i64()
                    .filter(|&t| (0..=64).contains(&t))
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "tab width out of range"))?
                    as u32;
            }
            Ok(old)
        }
        "maxprint" => {
            let old = Value::from_i64(conf.maxprint as i64);
            if let Some(v) = new {
                conf.maxprint = v
                    .as_i64()
                    .filter(|&m| (1..=1 << 20).contains(&m))
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "maxprint out of range"))?
                    as usize;
            }
            Ok(old)
        }
        "stoponerror" => {
            let old = Value::from_i64(conf.stoponerror as i64);
            if let Some(v) = new {
                conf.stoponerror = v
                    .as_i64()
                    .filter(|&s| (0..=i32::MAX as i64).contains(&s))
                    .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "stoponerror must be nonnegative"))?
                    as i32;
            }
            Ok(old)
        }
        "prompt" | "more" => {
            let slot = if name == "prompt" {
                &mut conf.prompt
            } else {
                &mut conf.more
            };
            let old = Value::from_string(slot.clone());
            if let Some(v) = new {
                *slot = v
                    .as_str()
                    .map(|s| s.to_display())
                    .ok_or_else(|| ErrorVal::with_msg(E_TYPE, "prompt must be a string"))?;
            }
            Ok(old)
        }
        _ => unreachable!("prop_def covered every recognized property"),
    }
}

fn bi_display(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let old = Value::from_i64(engine.conf.display as i64);
    if let Some(v) = args.first() {
        engine.conf.display = v
            .as_i64()
            .filter(|&d| (0..=100_000).contains(&d))
            .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "display digits out of range"))? as u32;
    }
    Ok(old)
}

fn bi_epsilon(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let old = Value::from_rational(engine.conf.epsilon.clone());
    if let Some(v) = args.first() {
        let e = v
            .as_number()
            .filter(|q| q.sign() > 0)
            .ok_or_else(|| ErrorVal::with_msg(E_INVARG, "epsilon must be positive"))?;
        engine.conf.epsilon = (*e).clone();
    }
    Ok(old)
}

// ---------------------------------------------------------------------------
// Files, blocks, evaluation
// ---------------------------------------------------------------------------

const PERM_READ: u32 = 1;
const PERM_WRITE: u32 = 2;
const PERM_EXEC: u32 = 4;

fn check_perm(engine: &Engine, bit: u32, what: &str) -> Result<(), ErrorVal> {
    if engine.file_perm & bit == 0 {
        return Err(ErrorVal::with_msg(
            E_PERM,
            format!("{} denied by permission mode", what),
        ));
    }
    Ok(())
}

fn bi_fopen(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let path = want_str(&args, 0)?.to_display();
    let mode = want_str(&args, 1)?.to_display();
    let (writable, file) = match mode.as_str() {
        "r" => {
            check_perm(engine, PERM_READ, "file read")?;
            (false, std::fs::File::open(&path))
        }
        "w" => {
            check_perm(engine, PERM_WRITE, "file write")?;
            (true, std::fs::File::create(&path))
        }
        "a" => {
            check_perm(engine, PERM_WRITE, "file write")?;
            (
                true,
                std::fs::OpenOptions::new().append(true).create(true).open(&path),
            )
        }
        _ => return Err(ErrorVal::with_msg(E_INVARG, "fopen mode must be r, w or a")),
    };
    match file {
        Ok(f) => {
            let id = engine.next_file_id();
            Ok(Value::File(Rc::new(FileRes {
                id,
                path,
                writable,
                handle: RefCell::new(Some(f)),
            })))
        }
        Err(e) => Err(ErrorVal::with_msg(E_FILE, format!("cannot open '{}': {}", path, e))),
    }
}

fn want_file(args: &[Value], i: usize) -> Result<&Rc<FileRes>, ErrorVal> {
    match &args[i] {
        Value::File(f) => Ok(f),
        other => Err(ErrorVal::with_msg(
            E_TYPE,
            format!("expected a file, got {}", other.type_name()),
        )),
    }
}

fn bi_fclose(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let f = want_file(&args, 0)?;
    f.handle.borrow_mut().take();
    Ok(Value::Null)
}

fn bi_fgets(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let f = want_file(&args, 0)?;
    let mut guard = f.handle.borrow_mut();
    let file = guard
        .as_mut()
        .ok_or_else(|| ErrorVal::with_msg(E_FILE, "file is closed"))?;
    // Byte-at-a-time keeps the handle stateless across calls.
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match file.read(&mut byte) {
            Ok(0) => break,
            Ok(_) => {
                line.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            Err(e) => return Err(ErrorVal::with_msg(E_FILE, format!("read failed: {}", e))),
        }
    }
    if line.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::from_str_bytes(&line))
    }
}

fn bi_fputs(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let f = want_file(&args, 0)?;
    if !f.writable {
        return Err(ErrorVal::with_msg(E_FILE, "file is not open for writing"));
    }
    let mut guard = f.handle.borrow_mut();
    let file = guard
        .as_mut()
        .ok_or_else(|| ErrorVal::with_msg(E_FILE, "file is closed"))?;
    for v in &args[1..] {
        let text = match v {
            Value::Str(s) => s.as_bytes().to_vec(),
            other => display(other, &engine.conf, PrintStyle::Normal, &engine.obj_types).into_bytes(),
        };
        file.write_all(&text)
            .map_err(|e| ErrorVal::with_msg(E_FILE, format!("write failed: {}", e)))?;
    }
    Ok(Value::Null)
}

fn bi_fflush(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let f = want_file(&args, 0)?;
    if let Some(file) = f.handle.borrow_mut().as_mut() {
        file.flush()
            .map_err(|e| ErrorVal::with_msg(E_FILE, format!("flush failed: {}", e)))?;
    }
    Ok(Value::Null)
}

fn bi_blk(_: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    let n = args[0]
        .as_i64()
        .filter(|&n| (0..=1 << 24).contains(&n))
        .ok_or_else(|| ErrorVal::with_msg(E_DIMS, "block size out of range"))?;
    Ok(Value::Block(Rc::new(Block {
        bytes: vec![0; n as usize],
    })))
}

fn bi_eval(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    // eval takes a single expression; wrap it so its value comes back.
    let src = want_str(&args, 0)?.to_display();
    let wrapped = format!("return ({});", src);
    match engine.run_source(&wrapped, false) {
        Ok(v) => Ok(v),
        Err(CalcError::Uncaught(e)) => Err(e),
        Err(e) => Err(ErrorVal::with_msg(E_INVARG, format!("eval: {}", e))),
    }
}

fn bi_read(engine: &mut Engine, args: Vec<Value>) -> Result<Value, ErrorVal> {
    check_perm(engine, PERM_EXEC, "script execution")?;
    check_perm(engine, PERM_READ, "file read")?;
    let path = want_str(&args, 0)?.to_display();
    let src = std::fs::read_to_string(&path)
        .map_err(|e| ErrorVal::with_msg(E_FILE, format!("cannot read '{}': {}", path, e)))?;
    match engine.run_source(&src, false) {
        Ok(v) => Ok(v),
        Err(CalcError::Uncaught(e)) => Err(e),
        Err(e) => Err(ErrorVal::with_msg(E_INVARG, format!("{}: {}", path, e))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::deep_eq;

    fn call_by_name(engine: &mut Engine, name: &str, args: Vec<Value>) -> Result<Value, ErrorVal> {
        call(engine, builtin_id(name).unwrap(), args)
    }

    #[test]
    fn registry_is_consistent() {
        for (i, b) in BUILTINS.iter().enumerate() {
            assert_eq!(builtin_id(b.name), Some(i as u16), "duplicate name {}", b.name);
            assert!(b.min <= b.max);
        }
    }

    #[test]
    fn numeric_helpers() {
        let mut e = Engine::new();
        let r = call_by_name(&mut e, "gcd", vec![Value::from_i64(12), Value::from_i64(18)]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(6)));
        let r = call_by_name(&mut e, "lcm", vec![Value::from_i64(4), Value::from_i64(6)]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(12)));
        let r = call_by_name(&mut e, "fact", vec![Value::from_i64(6)]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(720)));
        let r = call_by_name(&mut e, "isqrt", vec![Value::from_i64(99)]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(9)));
    }

    #[test]
    fn error_builtins_accept_errors() {
        let mut e = Engine::new();
        let err = Value::Error(ErrorVal::new(7));
        let r = call_by_name(&mut e, "iserror", vec![err.clone()]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(1)));
        let r = call_by_name(&mut e, "errno", vec![err]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(7)));
        let r = call_by_name(&mut e, "errno", vec![Value::from_i64(3)]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(0)));
    }

    #[test]
    fn config_roundtrip() {
        let mut e = Engine::new();
        let old = call_by_name(
            &mut e,
            "config",
            vec![Value::from_str_bytes(b"mode"), Value::from_str_bytes(b"frac")],
        )
        .unwrap();
        assert_eq!(old.as_str().unwrap().as_bytes(), b"real");
        assert_eq!(e.conf.mode, Mode::Frac);
        assert!(call_by_name(&mut e, "config", vec![Value::from_str_bytes(b"nope")]).is_err());
        call_by_name(
            &mut e,
            "config",
            vec![Value::from_str_bytes(b"stoponerror"), Value::from_i64(2)],
        )
        .unwrap();
        assert_eq!(e.conf.stoponerror, 2);
    }

    #[test]
    fn srand_makes_rand_deterministic() {
        let mut e = Engine::new();
        call_by_name(&mut e, "srand", vec![Value::from_i64(42)]).unwrap();
        let a = call_by_name(&mut e, "rand", vec![Value::from_i64(1000)]).unwrap();
        call_by_name(&mut e, "srand", vec![Value::from_i64(42)]).unwrap();
        let b = call_by_name(&mut e, "rand", vec![Value::from_i64(1000)]).unwrap();
        assert!(deep_eq(&a, &b));
    }

    #[test]
    fn string_builtins() {
        let mut e = Engine::new();
        let r = call_by_name(
            &mut e,
            "substr",
            vec![
                Value::from_str_bytes(b"hello"),
                Value::from_i64(1),
                Value::from_i64(3),
            ],
        )
        .unwrap();
        assert_eq!(r.as_str().unwrap().as_bytes(), b"ell");
        let r = call_by_name(&mut e, "char", vec![Value::from_i64(65)]).unwrap();
        assert_eq!(r.as_str().unwrap().as_bytes(), b"A");
        let r = call_by_name(&mut e, "ord", vec![Value::from_str_bytes(b"A")]).unwrap();
        assert!(deep_eq(&r, &Value::from_i64(65)));
    }
}
