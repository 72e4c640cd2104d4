/// Signed exact rationals in lowest terms over the magnitude kernel.
///
/// Invariants: `den > 0`, `gcd(num, den) == 1`, and zero is canonically
/// `+0/1`. Addition pulls the gcd of the denominators out before cross
/// multiplying so intermediates stay small; multiplication cancels
/// cross-gcds the same way. The seven-mode rounding dispatcher `divide`
/// serves `//`, `%`, quomod, appr and display rounding alike.
use crate::conf::{Config, Mode, Round};
use crate::core::mag::Mag;
use crate::errors::MathError;
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Rational {
    neg: bool,
    num: Mag,
    den: Mag,
}

impl Rational {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    pub fn zero() -> Self {
        Rational { neg: false, num: Mag::zero(), den: Mag::one() }
    }

    pub fn one() -> Self {
        Rational { neg: false, num: Mag::one(), den: Mag::one() }
    }

    pub fn from_i64(n: i64) -> Self {
        Rational {
            neg: n < 0,
            num: Mag::from_u64(n.unsigned_abs()),
            den: Mag::one(),
        }
    }

    pub fn from_u64(n: u64) -> Self {
        Rational { neg: false, num: Mag::from_u64(n), den: Mag::one() }
    }

    pub fn from_mag(num: Mag, neg: bool) -> Self {
        let neg = neg && !num.is_zero();
        Rational { neg, num, den: Mag::one() }
    }

    /// Normalized `±num/den`; den must be nonzero.
    pub fn from_ratio(num: Mag, den: Mag, neg: bool) -> Self {
        assert!(!den.is_zero(), "rational with zero denominator");
        if num.is_zero() {
            return Rational::zero();
        }
        let g = num.gcd(&den);
        let (num, den) = if g.is_one() {
            (num, den)
        } else {
            (num.divrem(&g).0, den.divrem(&g).0)
        };
        Rational { neg, num, den }
    }

    pub fn ratio_i64(n: i64, d: i64) -> Self {
        assert!(d != 0);
        Rational::from_ratio(
            Mag::from_u64(n.unsigned_abs()),
            Mag::from_u64(d.unsigned_abs()),
            (n < 0) != (d < 0),
        )
    }

    /// `10^exp` as an exact rational (negative exponents give 1/10^k).
    pub fn pow10(exp: i32) -> Self {
        let p = Mag::from_u64(10).pow(exp.unsigned_abs() as u64);
        if exp >= 0 {
            Rational { neg: false, num: p, den: Mag::one() }
        } else {
            Rational { neg: false, num: Mag::one(), den: p }
        }
    }

    /// `self * 2^k` — exact binary scaling.
    pub fn scale2(&self, k: i32) -> Self {
        if self.is_zero() || k == 0 {
            return self.clone();
        }
        if k > 0 {
            Rational::from_ratio(self.num.shl(k as usize), self.den.clone(), self.neg)
        } else {
            Rational::from_ratio(self.num.clone(), self.den.shl((-k) as usize), self.neg)
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    #[inline]
    pub fn is_negative(&self) -> bool {
        self.neg
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        self.den.is_one()
    }

    pub fn is_one(&self) -> bool {
        !self.neg && self.num.is_one() && self.den.is_one()
    }

    pub fn is_even(&self) -> bool {
        self.is_integer() && self.num.is_even()
    }

    pub fn is_odd(&self) -> bool {
        self.is_integer() && self.num.is_odd()
    }

    pub fn sign(&self) -> i32 {
        if self.is_zero() {
            0
        } else if self.neg {
            -1
        } else {
            1
        }
    }

    pub fn num_mag(&self) -> &Mag {
        &self.num
    }

    pub fn den_mag(&self) -> &Mag {
        &self.den
    }

    /// Numerator as a signed rational.
    pub fn numerator(&self) -> Rational {
        Rational::from_mag(self.num.clone(), self.neg)
    }

    pub fn denominator(&self) -> Rational {
        Rational::from_mag(self.den.clone(), false)
    }

    pub fn to_i64(&self) -> Option<i64> {
        if !self.is_integer() {
            return None;
        }
        let v = self.num.to_u64()?;
        if self.neg {
            if v <= 1 << 63 {
                Some((v as i64).wrapping_neg())
            } else {
                None
            }
        } else {
            i64::try_from(v).ok()
        }
    }

    pub fn to_u32(&self) -> Option<u32> {
        if self.neg || !self.is_integer() {
            return None;
        }
        u32::try_from(self.num.to_u64()?).ok()
    }

    // -----------------------------------------------------------------------
    // Arithmetic
    // -----------------------------------------------------------------------

    pub fn neg(&self) -> Rational {
        if self.is_zero() {
            return Rational::zero();
        }
        Rational { neg: !self.neg, num: self.num.clone(), den: self.den.clone() }
    }

    pub fn abs(&self) -> Rational {
        Rational { neg: false, num: self.num.clone(), den: self.den.clone() }
    }

    pub fn inv(&self) -> Result<Rational, MathError> {
        if self.is_zero() {
            return Err(MathError::DivByZero);
        }
        Ok(Rational { neg: self.neg, num: self.den.clone(), den: self.num.clone() })
    }

    /// `a/b + c/d` with the shared denominator gcd pulled out first:
    /// g = gcd(b, d); t = a·(d/g) ± c·(b/g); any common factor of t and the
    /// lcm divides g, so one more small gcd finishes the reduction.
    pub fn add(&self, other: &Rational) -> Rational {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        let g = self.den.gcd(&other.den);
        let (db, dd) = if g.is_one() {
            (self.den.clone(), other.den.clone())
        } else {
            (self.den.divrem(&g).0, other.den.divrem(&g).0)
        };
        // t = a·(d/g) ± c·(b/g), signed
        let left = self.num.mul(&dd);
        let right = other.num.mul(&db);
        let (tneg, tmag) = signed_add((self.neg, left), (other.neg, right));
        if tmag.is_zero() {
            return Rational::zero();
        }
        let lcm_den = self.den.mul(&dd);
        if g.is_one() {
            return Rational::from_ratio(tmag, lcm_den, tneg);
        }
        let g2 = tmag.gcd(&g);
        if g2.is_one() {
            Rational { neg: tneg, num: tmag, den: lcm_den }
        } else {
            Rational {
                neg: tneg,
                num: tmag.divrem(&g2).0,
                den: lcm_den.divrem(&g2).0,
            }
        }
    }

    pub fn sub(&self, other: &Rational) -> Rational {
        self.add(&other.neg())
    }

    /// Cross-gcd cancellation before the multiplies keeps intermediates in
    /// lowest terms throughout.
    pub fn mul(&self, other: &Rational) -> Rational {
        if self.is_zero() || other.is_zero() {
            return Rational::zero();
        }
        let g1 = self.num.gcd(&other.den);
        let g2 = other.num.gcd(&self.den);
        let n1 = if g1.is_one() { self.num.clone() } else { self.num.divrem(&g1).0 };
        let d2 = if g1.is_one() { other.den.clone() } else { other.den.divrem(&g1).0 };
        let n2 = if g2.is_one() { other.num.clone() } else { other.num.divrem(&g2).0 };
        let d1 = if g2.is_one() { self.den.clone() } else { self.den.divrem(&g2).0 };
        Rational {
            neg: self.neg != other.neg,
            num: n1.mul(&n2),
            den: d1.mul(&d2),
        }
    }

    pub fn div(&self, other: &Rational) -> Result<Rational, MathError> {
        if other.is_zero() {
            return Err(MathError::DivByZero);
        }
        Ok(self.mul(&other.inv()?))
    }

    pub fn mul_i64(&self, n: i64) -> Rational {
        self.mul(&Rational::from_i64(n))
    }

    pub fn square(&self) -> Rational {
        Rational {
            neg: false,
            num: self.num.square(),
            den: self.den.square(),
        }
    }

    // -----------------------------------------------------------------------
    // Comparison
    // -----------------------------------------------------------------------

    /// Sign first, then cross multiplication.
    pub fn cmp_rat(&self, other: &Rational) -> Ordering {
        match self.sign().cmp(&other.sign()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        if self.is_zero() {
            return Ordering::Equal;
        }
        let lhs = self.num.mul(&other.den);
        let rhs = other.num.mul(&self.den);
        let mag_ord = lhs.cmp_mag(&rhs);
        if self.neg {
            mag_ord.reverse()
        } else {
            mag_ord
        }
    }

    pub fn cmp_abs(&self, other: &Rational) -> Ordering {
        self.num.mul(&other.den).cmp_mag(&other.num.mul(&self.den))
    }

    // -----------------------------------------------------------------------
    // Integer parts and rounding
    // -----------------------------------------------------------------------

    /// Truncate toward zero.
    pub fn trunc(&self) -> Rational {
        if self.is_integer() {
            return self.clone();
        }
        Rational::from_mag(self.num.divrem(&self.den).0, self.neg)
    }

    /// Fractional part: `self - trunc(self)` (keeps the sign of self).
    pub fn frac(&self) -> Rational {
        self.sub(&self.trunc())
    }

    pub fn floor(&self) -> Rational {
        let t = self.trunc();
        if self.neg && t.cmp_rat(self) != Ordering::Equal {
            t.sub(&Rational::one())
        } else {
            t
        }
    }

    pub fn ceil(&self) -> Rational {
        let t = self.trunc();
        if !self.neg && t.cmp_rat(self) != Ordering::Equal {
            t.add(&Rational::one())
        } else {
            t
        }
    }

    /// Round to the nearest integer under `mode`. This is the single
    /// dispatcher every rounding-policy consumer goes through.
    pub fn round_to_int(&self, mode: Round) -> Rational {
        if self.is_integer() {
            return self.clone();
        }
        match mode {
            Round::Zero | Round::Trunc => self.trunc(),
            Round::Floor => self.floor(),
            Round::Ceil => self.ceil(),
            Round::Away => {
                let t = self.trunc();
                if self.neg {
                    t.sub(&Rational::one())
                } else {
                    t.add(&Rational::one())
                }
            }
            Round::NearEven | Round::HalfUp => {
                let fl = self.floor();
                let frac = self.sub(&fl); // in [0, 1)
                let half = Rational::ratio_i64(1, 2);
                match frac.cmp_rat(&half) {
                    Ordering::Less => fl,
                    Ordering::Greater => fl.add(&Rational::one()),
                    Ordering::Equal => match mode {
                        Round::NearEven => {
                            if fl.is_even() {
                                fl
                            } else {
                                fl.add(&Rational::one())
                            }
                        }
                        // Half away from zero.
                        _ => {
                            if self.neg {
                                fl
                            } else {
                                fl.add(&Rational::one())
                            }
                        }
                    },
                }
            }
        }
    }

    /// `(quot, rem)` with `quot` an integer rounded per `mode` and
    /// `quot·b + rem == a` exactly.
    pub fn divide(a: &Rational, b: &Rational, mode: Round) -> Result<(Rational, Rational), MathError> {
        let exact = a.div(b)?;
        let q = exact.round_to_int(mode);
        let r = a.sub(&q.mul(b));
        Ok((q, r))
    }

    /// Round to the nearest multiple of `e` under `mode` (the appr
    /// operation; also display and sqrt rounding).
    pub fn appr(&self, e: &Rational, mode: Round) -> Result<Rational, MathError> {
        if e.is_zero() {
            return Ok(self.clone());
        }
        let q = self.div(e)?.round_to_int(mode);
        Ok(q.mul(e))
    }

    /// Nearest dyadic rational with denominator 2^m (ties to even). The
    /// workhorse that keeps transcendental intermediates bounded.
    pub fn approx_dyadic(&self, m: usize) -> Rational {
        if self.is_integer() {
            return self.clone();
        }
        let scaled = Rational {
            neg: self.neg,
            num: self.num.shl(m),
            den: self.den.clone(),
        };
        let q = scaled.round_to_int(Round::NearEven);
        Rational::from_ratio(q.num, Mag::one().shl(m), q.neg)
    }

    // -----------------------------------------------------------------------
    // Powers
    // -----------------------------------------------------------------------

    /// Integer exponent only; `0^0 == 1`, `0^negative` is its own error.
    pub fn pow(&self, exp: &Rational) -> Result<Rational, MathError> {
        if !exp.is_integer() {
            return Err(MathError::NonInteger);
        }
        if self.is_zero() {
            if exp.is_zero() {
                return Ok(Rational::one());
            }
            if exp.is_negative() {
                return Err(MathError::ZeroPowNeg);
            }
            return Ok(Rational::zero());
        }
        let e = exp
            .num_mag()
            .to_u64()
            .filter(|&e| e <= u32::MAX as u64)
            .ok_or(MathError::InvalidArg("exponent too large"))?;
        let num = self.num.pow(e);
        let den = self.den.pow(e);
        let neg = self.neg && e & 1 == 1;
        let r = Rational { neg, num, den };
        if exp.is_negative() {
            r.inv()
        } else {
            Ok(r)
        }
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Parse an unsigned numeric literal: base-prefixed integers or a
    /// decimal form with optional fraction and exponent.
    pub fn parse(text: &str) -> Option<Rational> {
        let t = text.trim();
        if t.is_empty() {
            return None;
        }
        if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
            return Mag::from_str_radix(hex, 16).map(|m| Rational::from_mag(m, false));
        }
        if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
            return Mag::from_str_radix(bin, 2).map(|m| Rational::from_mag(m, false));
        }
        if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
            return Mag::from_str_radix(oct, 8).map(|m| Rational::from_mag(m, false));
        }
        // [int][.frac][e[+-]exp]
        let (mantissa, exp) = match t.find(['e', 'E']) {
            Some(i) => {
                let e: i32 = t[i + 1..].parse().ok()?;
                (&t[..i], e)
            }
            None => (t, 0),
        };
        let (int_part, frac_part) = match mantissa.find('.') {
            Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
            None => (mantissa, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        let n = Mag::from_str_radix(if digits.is_empty() { "0" } else { &digits }, 10)?;
        let shift = exp.checked_sub(frac_part.len() as i32)?;
        Some(Rational::from_mag(n, false).mul(&Rational::pow10(shift)))
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    /// Render per the configuration's output mode.
    pub fn format(&self, conf: &Config) -> String {
        self.format_mode(conf, conf.mode)
    }

    pub fn format_mode(&self, conf: &Config, mode: Mode) -> String {
        match mode {
            Mode::Frac => self.format_frac(10, ""),
            Mode::Hex => self.format_frac(16, "0x"),
            Mode::Oct => self.format_frac(8, "0o"),
            Mode::Bin => self.format_frac(2, "0b"),
            Mode::Int => {
                let t = self.trunc();
                let body = t.format_frac(10, "");
                if self.is_integer() {
                    body
                } else if conf.tilde {
                    format!("~{}", body)
                } else {
                    body
                }
            }
            Mode::Real => self.format_real(conf),
            Mode::Exp => self.format_exp(conf),
            Mode::Str => {
                // Integer bytes, most significant first.
                let t = self.trunc().abs();
                let mut bytes = Vec::new();
                let mut n = t.num.clone();
                while !n.is_zero() {
                    let (q, r) = n.divrem_u32(256);
                    bytes.push(r as u8);
                    n = q;
                }
                bytes.reverse();
                String::from_utf8_lossy(&bytes).into_owned()
            }
        }
    }

    fn format_frac(&self, radix: u32, prefix: &str) -> String {
        let sign = if self.neg { "-" } else { "" };
        if self.is_integer() {
            format!("{}{}{}", sign, prefix, self.num.to_str_radix(radix))
        } else {
            format!(
                "{}{}{}/{}{}",
                sign,
                prefix,
                self.num.to_str_radix(radix),
                prefix,
                self.den.to_str_radix(radix)
            )
        }
    }

    fn format_real(&self, conf: &Config) -> String {
        if self.is_integer() {
            return self.format_frac(10, "");
        }
        let digits = conf.display;
        // q = round(self · 10^digits) under outround; inexact iff the
        // scaled value was not an integer.
        let scaled = self.mul(&Rational::pow10(digits as i32));
        let inexact = !scaled.is_integer();
        let q = scaled.round_to_int(conf.outround);
        let mut s = q.num.to_str_radix(10);
        if s.len() <= digits as usize {
            s.insert_str(0, &"0".repeat(digits as usize + 1 - s.len()));
        }
        let point = s.len() - digits as usize;
        let (int_str, frac_str) = s.split_at(point);
        let mut frac_str = frac_str.to_string();
        if !conf.fullzero {
            while frac_str.ends_with('0') {
                frac_str.pop();
            }
        }
        let mut out = String::new();
        if self.neg && !(q.is_zero() && frac_str.is_empty()) {
            out.push('-');
        }
        if conf.tilde && inexact {
            out.insert(0, '~');
        }
        let int_str = int_str.trim_start_matches('0');
        if int_str.is_empty() {
            if conf.leadzero {
                out.push('0');
            }
        } else {
            out.push_str(int_str);
        }
        if frac_str.is_empty() {
            if int_str.is_empty() && !conf.leadzero {
                out.push('0');
            }
        } else {
            out.push('.');
            out.push_str(&frac_str);
        }
        out
    }

    fn format_exp(&self, conf: &Config) -> String {
        if self.is_zero() {
            return "0e0".into();
        }
        // Decimal exponent from digit counts, corrected by comparison.
        let nd = self.num.to_str_radix(10).len() as i32;
        let dd = self.den.to_str_radix(10).len() as i32;
        let mut k = nd - dd;
        let abs = self.abs();
        while abs.cmp_rat(&Rational::pow10(k)) == Ordering::Less {
            k -= 1;
        }
        while abs.cmp_rat(&Rational::pow10(k + 1)) != Ordering::Less {
            k += 1;
        }
        let mantissa = self.mul(&Rational::pow10(-k));
        let mut body = mantissa.format_real(conf);
        if body.starts_with('~') {
            body.remove(0);
            body = format!("~{}e{}", body, k);
        } else {
            body = format!("{}e{}", body, k);
        }
        body
    }

    /// Stable content hash (within-run determinism only).
    pub fn stable_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mut mix = |x: u64| {
            h ^= x;
            h = h.wrapping_mul(0x1000_0000_01b3);
        };
        mix(self.neg as u64);
        for &l in self.num.limbs() {
            mix(l as u64);
        }
        mix(0xdead_beef);
        for &l in self.den.limbs() {
            mix(l as u64);
        }
        h
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rational {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_rat(other)
    }
}

impl fmt::Debug for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rational({})", self.format_frac(10, ""))
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_frac(10, ""))
    }
}

/// Signed magnitude addition: (sign, mag) + (sign, mag).
fn signed_add(a: (bool, Mag), b: (bool, Mag)) -> (bool, Mag) {
    if a.0 == b.0 {
        (a.0, a.1.add(&b.1))
    } else {
        match a.1.cmp_mag(&b.1) {
            Ordering::Less => (b.0, b.1.sub(&a.1)),
            Ordering::Equal => (false, Mag::zero()),
            Ordering::Greater => (a.0, a.1.sub(&b.1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::ratio_i64(n, d)
    }

    // ── Canonical form ───────────────────────────────────────────────────────

    #[test]
    fn lowest_terms_invariant() {
        let r = q(6, 4);
        assert_eq!(r, q(3, 2));
        assert_eq!(q(-10, -4), q(5, 2));
        assert_eq!(q(0, 5), Rational::zero());
        assert!(!q(0, -7).is_negative());
        // Reducing an already reduced rational is a no-op.
        let r = q(355, 113);
        assert_eq!(Rational::from_ratio(r.num_mag().clone(), r.den_mag().clone(), false), r);
    }

    // ── Arithmetic ───────────────────────────────────────────────────────────

    #[test]
    fn add_sub_mul_div() {
        assert_eq!(q(1, 2).add(&q(1, 3)), q(5, 6));
        assert_eq!(q(1, 6).add(&q(1, 10)), q(4, 15)); // gcd pre-extraction path
        assert_eq!(q(1, 2).sub(&q(1, 2)), Rational::zero());
        assert_eq!(q(2, 3).mul(&q(9, 4)), q(3, 2));
        assert_eq!(q(7, 3).div(&q(7, 3)).unwrap(), Rational::one());
        assert!(q(1, 2).div(&Rational::zero()).is_err());
        assert_eq!(q(-1, 2).add(&q(1, 2)), Rational::zero());
        assert_eq!(q(-1, 3).mul(&q(-3, 5)), q(1, 5));
    }

    #[test]
    fn comparison_orders_by_sign_then_cross() {
        assert!(q(-1, 2) < q(1, 3));
        assert!(q(1, 3) < q(1, 2));
        assert!(q(-1, 2) < q(-1, 3));
        assert_eq!(q(2, 4).cmp_rat(&q(1, 2)), Ordering::Equal);
    }

    // ── Rounding dispatcher ──────────────────────────────────────────────────

    #[test]
    fn round_modes() {
        let x = q(7, 2); // 3.5
        assert_eq!(x.round_to_int(Round::Zero), q(3, 1));
        assert_eq!(x.round_to_int(Round::Away), q(4, 1));
        assert_eq!(x.round_to_int(Round::Floor), q(3, 1));
        assert_eq!(x.round_to_int(Round::Ceil), q(4, 1));
        assert_eq!(x.round_to_int(Round::NearEven), q(4, 1));
        assert_eq!(q(5, 2).round_to_int(Round::NearEven), q(2, 1));
        assert_eq!(x.round_to_int(Round::HalfUp), q(4, 1));
        let y = q(-7, 2);
        assert_eq!(y.round_to_int(Round::Zero), q(-3, 1));
        assert_eq!(y.round_to_int(Round::Away), q(-4, 1));
        assert_eq!(y.round_to_int(Round::Floor), q(-4, 1));
        assert_eq!(y.round_to_int(Round::Ceil), q(-3, 1));
        assert_eq!(y.round_to_int(Round::HalfUp), q(-4, 1));
    }

    #[test]
    fn divide_identity_all_modes() {
        let modes = [
            Round::Zero,
            Round::Away,
            Round::Floor,
            Round::Ceil,
            Round::NearEven,
            Round::HalfUp,
            Round::Trunc,
        ];
        let cases = [
            (q(17, 3), q(5, 2)),
            (q(-22, 7), q(3, 4)),
            (q(9, 1), q(-4, 1)),
            (q(355, 113), q(-2, 9)),
        ];
        for mode in modes {
            for (a, b) in &cases {
                let (quot, rem) = Rational::divide(a, b, mode).unwrap();
                assert!(quot.is_integer());
                assert_eq!(quot.mul(b).add(&rem), *a, "mode {:?}", mode);
            }
        }
    }

    #[test]
    fn appr_multiples() {
        let e = q(1, 100);
        let x = q(355, 113); // 3.14159...
        let a = x.appr(&e, Round::Floor).unwrap();
        assert_eq!(a, q(314, 100));
        assert_eq!(q(1, 3).appr(&e, Round::NearEven).unwrap(), q(33, 100).appr(&e, Round::NearEven).unwrap());
    }

    #[test]
    fn dyadic_approximation() {
        let x = q(1, 3);
        let d = x.approx_dyadic(20);
        assert!(d.den_mag().cmp_mag(&Mag::one().shl(20)) != Ordering::Greater);
        let err = x.sub(&d).abs();
        assert!(err.cmp_rat(&Rational::from_ratio(Mag::one(), Mag::one().shl(21), false)) != Ordering::Greater);
    }

    // ── Powers ───────────────────────────────────────────────────────────────

    #[test]
    fn integer_powers() {
        assert_eq!(q(2, 3).pow(&q(3, 1)).unwrap(), q(8, 27));
        assert_eq!(q(2, 1).pow(&q(-2, 1)).unwrap(), q(1, 4));
        assert_eq!(q(-2, 1).pow(&q(3, 1)).unwrap(), q(-8, 1));
        assert_eq!(Rational::zero().pow(&Rational::zero()).unwrap(), Rational::one());
        assert_eq!(
            Rational::zero().pow(&q(-1, 1)),
            Err(MathError::ZeroPowNeg)
        );
        assert_eq!(q(1, 2).pow(&q(1, 2)), Err(MathError::NonInteger));
    }

    // ── Parsing ──────────────────────────────────────────────────────────────

    #[test]
    fn parse_forms() {
        assert_eq!(Rational::parse("42").unwrap(), q(42, 1));
        assert_eq!(Rational::parse("0x10").unwrap(), q(16, 1));
        assert_eq!(Rational::parse("0b101").unwrap(), q(5, 1));
        assert_eq!(Rational::parse("0o17").unwrap(), q(15, 1));
        assert_eq!(Rational::parse("2.5").unwrap(), q(5, 2));
        assert_eq!(Rational::parse(".25").unwrap(), q(1, 4));
        assert_eq!(Rational::parse("1e3").unwrap(), q(1000, 1));
        assert_eq!(Rational::parse("2.5e-2").unwrap(), q(1, 40));
        assert!(Rational::parse("").is_none());
        assert!(Rational::parse(".").is_none());
    }

    // ── Display ──────────────────────────────────────────────────────────────

    #[test]
    fn display_real_mode() {
        let conf = Config::default();
        assert_eq!(q(1, 2).format_mode(&conf, Mode::Real), ".5");
        assert_eq!(q(-1, 2).format_mode(&conf, Mode::Real), "-.5");
        assert_eq!(q(3, 1).format_mode(&conf, Mode::Real), "3");
        assert_eq!(q(5, 4).format_mode(&conf, Mode::Real), "1.25");
        // 1/3 cannot be displayed exactly: tilde appears.
        let s = q(1, 3).format_mode(&conf, Mode::Real);
        assert!(s.starts_with('~'), "got {}", s);
        assert!(s.contains(".333333333333333333"), "got {}", s);
    }

    #[test]
    fn display_leadzero_and_fullzero() {
        let mut conf = Config::default();
        conf.leadzero = true;
        assert_eq!(q(1, 2).format_mode(&conf, Mode::Real), "0.5");
        conf.fullzero = true;
        conf.display = 4;
        assert_eq!(q(1, 2).format_mode(&conf, Mode::Real), "0.5000");
    }

    #[test]
    fn display_other_modes() {
        let conf = Config::default();
        assert_eq!(q(255, 1).format_mode(&conf, Mode::Hex), "0xff");
        assert_eq!(q(8, 1).format_mode(&conf, Mode::Oct), "0o10");
        assert_eq!(q(5, 1).format_mode(&conf, Mode::Bin), "0b101");
        assert_eq!(q(5, 3).format_mode(&conf, Mode::Frac), "5/3");
        assert_eq!(q(-1, 3).format_mode(&conf, Mode::Hex), "-0x1/0x3");
        assert_eq!(q(7, 2).format_mode(&conf, Mode::Int), "~3");
        let e = q(1, 8).format_mode(&conf, Mode::Exp);
        assert_eq!(e, "1.25e-1");
    }

    #[test]
    fn display_rounding_uses_outround() {
        let mut conf = Config::default();
        conf.display = 2;
        // 0.125 at two digits: even rounding gives .12
        assert_eq!(q(1, 8).format_mode(&conf, Mode::Real), "~.12");
        conf.outround = Round::Ceil;
        assert_eq!(q(1, 8).format_mode(&conf, Mode::Real), "~.13");
    }
}
