/// Transcendental functions over exact rationals.
///
/// Contract: every entry point takes a positive `eps` and returns a rational
/// within `0.75·eps` of the true value. Arguments are first snapped to a
/// dyadic rational (denominator a power of two) so Taylor summation stays
/// exact and bounded; partial sums are re-snapped every term, which caps
/// denominator growth at the working precision. Guard bits cover the
/// input-rounding, series-tail and range-reduction contributions.
///
/// Range reduction:
///   exp  — halve the argument until |t| ≤ 1/2, square back afterwards
///   ln   — split off the binary exponent, then repeated square roots
///   sin/cos — subtract the nearest multiple of 2π (π from the cache)
///   atan — halve via t / (1 + sqrt(1+t²)); invert arguments above 1
///   pi   — Machin: 16·atan(1/5) − 4·atan(1/239)
///   sqrt/root — eps-scaled integer roots
use crate::conf::Round;
use crate::core::mag::Mag;
use crate::core::rational::Rational;
use crate::errors::MathError;
use std::cmp::Ordering;

/// Engine-owned caches: best pi so far plus the Bernoulli/Euler tables.
#[derive(Default)]
pub struct TranscCache {
    pi: Option<(Rational, Rational)>, // (eps it satisfies, value)
    bernoulli: Vec<Rational>,
    euler: Vec<Rational>,
}

impl TranscCache {
    pub fn new() -> Self {
        TranscCache::default()
    }
}

fn check_eps(eps: &Rational) -> Result<(), MathError> {
    if eps.sign() <= 0 {
        return Err(MathError::InvalidArg("epsilon must be positive"));
    }
    Ok(())
}

/// Bits m with 2^-m ≤ eps.
fn prec_bits(eps: &Rational) -> usize {
    (eps.den_mag().bit_len() + 1)
        .saturating_sub(eps.num_mag().bit_len())
        .max(1)
}

fn pow2(m: usize) -> Rational {
    Rational::from_ratio(Mag::one(), Mag::one().shl(m), false)
}

fn half() -> Rational {
    Rational::ratio_i64(1, 2)
}

// ---------------------------------------------------------------------------
// exp
// ---------------------------------------------------------------------------

pub fn qexp(x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    if x.is_zero() {
        return Ok(Rational::one());
    }
    let ax = x.abs();
    if ax.cmp_rat(&Rational::from_u64(1 << 20)) == Ordering::Greater {
        return Err(MathError::InvalidArg("argument too large for exp"));
    }
    // Halve until |t| <= 1/2.
    let mut t = x.clone();
    let mut j = 0usize;
    while t.abs().cmp_rat(&half()) == Ordering::Greater {
        t = t.scale2(-1);
        j += 1;
    }
    // Guard: j squarings double the error each, and the result magnitude
    // contributes e^|x| < 2^(1.5·(⌊|x|⌋+1)).
    let xi = ax.trunc().to_i64().unwrap_or(0) as usize;
    let m = prec_bits(eps) + j + xi * 3 / 2 + 16;
    let td = t.approx_dyadic(m);

    // exp(td) by Taylor; terms shrink by at least 1/2 once n > 1.
    let cut = pow2(m + 2);
    let mut sum = Rational::one();
    let mut term = Rational::one();
    let mut n: i64 = 1;
    loop {
        term = term.mul(&td).div(&Rational::from_i64(n))?;
        term = term.approx_dyadic(m + 16);
        sum = sum.add(&term).approx_dyadic(m + 16);
        if term.abs().cmp_rat(&cut) == Ordering::Less {
            break;
        }
        n += 1;
    }
    // Square back.
    let mut r = sum;
    for _ in 0..j {
        r = r.square().approx_dyadic(m + 16);
    }
    Ok(r)
}

// ---------------------------------------------------------------------------
// ln
// ---------------------------------------------------------------------------

pub fn qln(x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    if x.sign() <= 0 {
        return Err(MathError::Domain("ln of a nonpositive value"));
    }
    if x.is_one() {
        return Ok(Rational::zero());
    }
    // x = f · 2^e2 with f in [1/2, 1).
    let mut e2 = x.num_mag().bit_len() as i64 - x.den_mag().bit_len() as i64;
    let mut f = x.scale2(-(e2 as i32));
    while f.cmp_rat(&Rational::one()) != Ordering::Less {
        f = f.scale2(-1);
        e2 += 1;
    }
    while f.cmp_rat(&half()) == Ordering::Less {
        f = f.scale2(1);
        e2 -= 1;
    }
    let m = prec_bits(eps) + 48;
    let lf = ln_fraction(&f, m)?;
    if e2 == 0 {
        return Ok(lf);
    }
    // ln x = ln f − e2·ln(1/2)
    let ln_half = ln_fraction(&half(), m)?;
    Ok(lf.sub(&ln_half.mul_i64(e2)))
}

/// ln of f in [1/2, 1]: square-root reduce toward 1, Maclaurin on the rest.
fn ln_fraction(f: &Rational, m: usize) -> Result<Rational, MathError> {
    let quarter = Rational::ratio_i64(1, 4);
    let mut y = f.clone();
    let mut k = 0usize;
    while y.sub(&Rational::one()).abs().cmp_rat(&quarter) == Ordering::Greater {
        y = dyadic_sqrt(&y, m + 8);
        k += 1;
    }
    // ln(1+u), |u| ≤ 1/4: terms shrink by ≥ 1/4 each.
    let u = y.sub(&Rational::one()).approx_dyadic(m + 8);
    let cut = pow2(m + 4);
    let mut sum = Rational::zero();
    let mut upow = Rational::one();
    let mut n: i64 = 1;
    loop {
        upow = upow.mul(&u).approx_dyadic(m + 16);
        let term = upow.div(&Rational::from_i64(n))?;
        let term = if n % 2 == 0 { term.neg() } else { term };
        sum = sum.add(&term).approx_dyadic(m + 16);
        if upow.abs().cmp_rat(&cut) == Ordering::Less {
            break;
        }
        n += 1;
    }
    Ok(sum.scale2(k as i32))
}

/// Square root rounded to the 2^-m grid; argument must be positive.
fn dyadic_sqrt(x: &Rational, m: usize) -> Rational {
    let scaled = x.scale2(2 * m as i32).trunc();
    let root = scaled.num_mag().isqrt();
    Rational::from_mag(root, false).scale2(-(m as i32))
}

// ---------------------------------------------------------------------------
// sin / cos / tan
// ---------------------------------------------------------------------------

pub fn qcos(cache: &mut TranscCache, x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    let r = reduce_mod_2pi(cache, x, eps)?;
    let m = prec_bits(eps) + 24;
    let rd = r.approx_dyadic(m);
    let r2 = rd.square().approx_dyadic(m + 16);
    // cos: 1 - r²/2! + r⁴/4! - ...
    let sum = alternating_series(&r2, Rational::one(), m, |k| (2 * k - 1) * (2 * k))?;
    sum.appr(&eps.scale2(-2), Round::NearEven)
}

pub fn qsin(cache: &mut TranscCache, x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    let r = reduce_mod_2pi(cache, x, eps)?;
    let m = prec_bits(eps) + 24;
    let rd = r.approx_dyadic(m);
    let r2 = rd.square().approx_dyadic(m + 16);
    // sin: r·(1 - r²/3! + r⁴/5! - ...)
    let sum = alternating_series(&r2, rd.clone(), m, |k| (2 * k) * (2 * k + 1))?;
    sum.appr(&eps.scale2(-2), Round::NearEven)
}

pub fn qtan(cache: &mut TranscCache, x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    // tan amplifies error by 1/cos²; refine once the magnitude is known.
    let mut inner = eps.scale2(-3);
    for _ in 0..3 {
        let c = qcos(cache, x, &inner)?;
        if c.is_zero() {
            inner = inner.scale2(-16);
            continue;
        }
        let scale = c.square();
        let needed = eps.mul(&scale).scale2(-3);
        let fine = if needed.cmp_rat(&inner) == Ordering::Less { needed } else { inner.clone() };
        let s = qsin(cache, x, &fine)?;
        let c = qcos(cache, x, &fine)?;
        if c.is_zero() {
            inner = inner.scale2(-16);
            continue;
        }
        return s.div(&c);
    }
    Err(MathError::Domain("tan: argument too close to an odd multiple of pi/2"))
}

/// Σ (-1)^k · first · r2^k / Π denom(k): the shared sin/cos loop.
fn alternating_series(
    r2: &Rational,
    first: Rational,
    m: usize,
    denom: fn(i64) -> i64,
) -> Result<Rational, MathError> {
    let cut = pow2(m + 4);
    let mut sum = first.clone();
    let mut term = first;
    let mut k: i64 = 1;
    loop {
        term = term
            .mul(r2)
            .div(&Rational::from_i64(denom(k)))?
            .approx_dyadic(m + 16);
        let signed = if k % 2 == 1 { term.neg() } else { term.clone() };
        sum = sum.add(&signed).approx_dyadic(m + 16);
        // Terms decrease once (2k)² outgrows r²; r ≤ π so k ≥ 2 suffices.
        if k >= 2 && term.abs().cmp_rat(&cut) == Ordering::Less {
            break;
        }
        k += 1;
    }
    Ok(sum)
}

/// x minus the nearest multiple of 2π, so |result| ≤ π (+ guard slack).
fn reduce_mod_2pi(
    cache: &mut TranscCache,
    x: &Rational,
    eps: &Rational,
) -> Result<Rational, MathError> {
    let six = Rational::from_i64(6);
    if x.abs().cmp_rat(&six) != Ordering::Greater {
        return Ok(x.clone());
    }
    // Multiple count n ≈ |x|/6; the π error is amplified by 2n.
    let n_bits = x.abs().trunc().num_mag().bit_len();
    let m = prec_bits(eps) + n_bits + 16;
    let pi = qpi(cache, &pow2(m))?;
    let two_pi = pi.scale2(1);
    let n = x.div(&two_pi)?.round_to_int(Round::NearEven);
    Ok(x.sub(&n.mul(&two_pi)))
}

// ---------------------------------------------------------------------------
// atan / pi
// ---------------------------------------------------------------------------

pub fn qatan(cache: &mut TranscCache, x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    if x.is_negative() {
        return Ok(qatan(cache, &x.neg(), eps)?.neg());
    }
    if x.cmp_rat(&Rational::one()) == Ordering::Greater {
        // atan(x) = π/2 − atan(1/x)
        let pi = qpi(cache, &eps.scale2(-2))?;
        let inner = qatan(cache, &x.inv()?, &eps.scale2(-2))?;
        return Ok(pi.scale2(-1).sub(&inner));
    }
    let m = prec_bits(eps) + 24;
    let quarter = Rational::ratio_i64(1, 4);
    // Halve with atan(t) = 2·atan(t / (1 + sqrt(1+t²))).
    let mut t = x.clone();
    let mut k = 0usize;
    while t.cmp_rat(&quarter) == Ordering::Greater {
        let s = dyadic_sqrt(&Rational::one().add(&t.square()), m + 8);
        t = t.div(&Rational::one().add(&s))?.approx_dyadic(m + 8);
        k += 1;
    }
    let sum = atan_series(&t, m)?;
    Ok(sum.scale2(k as i32))
}

/// Maclaurin atan for |t| ≤ 1/4.
fn atan_series(t: &Rational, m: usize) -> Result<Rational, MathError> {
    let td = t.approx_dyadic(m + 8);
    let t2 = td.square().approx_dyadic(m + 16);
    let cut = pow2(m + 4);
    let mut sum = td.clone();
    let mut tpow = td;
    let mut n: i64 = 1;
    loop {
        tpow = tpow.mul(&t2).approx_dyadic(m + 16);
        let term = tpow.div(&Rational::from_i64(2 * n + 1))?;
        let signed = if n % 2 == 1 { term.neg() } else { term };
        sum = sum.add(&signed).approx_dyadic(m + 16);
        if tpow.abs().cmp_rat(&cut) == Ordering::Less {
            break;
        }
        n += 1;
    }
    Ok(sum)
}

/// Machin's formula with the cache: π = 16·atan(1/5) − 4·atan(1/239).
pub fn qpi(cache: &mut TranscCache, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    if let Some((cached_eps, value)) = &cache.pi {
        if cached_eps.cmp_rat(eps) != Ordering::Greater {
            return Ok(value.clone());
        }
    }
    let m = prec_bits(eps) + 8;
    let a5 = atan_series(&Rational::ratio_i64(1, 5), m + 6)?;
    let a239 = atan_series(&Rational::ratio_i64(1, 239), m + 4)?;
    let pi = a5.mul_i64(16).sub(&a239.mul_i64(4));
    cache.pi = Some((eps.clone(), pi.clone()));
    Ok(pi)
}

// ---------------------------------------------------------------------------
// sqrt / root
// ---------------------------------------------------------------------------

/// Square root as an eps-grid multiple: computed on the eps/8 grid by the
/// integer square root, then rounded to the eps/2 grid under `mode`, which
/// keeps directed modes one-sided and the total error under 0.75·eps.
pub fn qsqrt(x: &Rational, eps: &Rational, mode: Round) -> Result<Rational, MathError> {
    check_eps(eps)?;
    match x.sign() {
        0 => return Ok(Rational::zero()),
        s if s < 0 => return Err(MathError::Domain("sqrt of a negative value")),
        _ => {}
    }
    let fine = eps.scale2(-3);
    let scaled = x.div(&fine.square())?.trunc();
    let root = scaled.num_mag().isqrt();
    let v = Rational::from_mag(root, false).mul(&fine);
    v.appr(&eps.scale2(-1), mode)
}

/// Floor-style n-th root on the eps grid; odd roots of negatives negate.
pub fn qroot(x: &Rational, n: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    if !n.is_integer() || n.sign() <= 0 {
        return Err(MathError::InvalidArg("root index must be a positive integer"));
    }
    let k = n
        .num_mag()
        .to_u64()
        .filter(|&k| k <= 4096)
        .ok_or(MathError::InvalidArg("root index too large"))? as u32;
    if k == 1 {
        return Ok(x.clone());
    }
    if x.is_negative() {
        if k % 2 == 0 {
            return Err(MathError::Domain("even root of a negative value"));
        }
        return Ok(qroot(&x.neg(), n, eps)?.neg());
    }
    if x.is_zero() {
        return Ok(Rational::zero());
    }
    let fine = eps.scale2(-2);
    let scaled = x.div(&fine.pow(n)?)?.trunc();
    let root = scaled.num_mag().root_floor(k);
    let v = Rational::from_mag(root, false).mul(&fine);
    v.appr(&eps.scale2(-1), Round::NearEven)
}

// ---------------------------------------------------------------------------
// Hyperbolics (complex sin/cos build on these)
// ---------------------------------------------------------------------------

pub fn qcosh(x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    let e = eps.scale2(-1);
    let a = qexp(x, &e)?;
    let b = qexp(&x.neg(), &e)?;
    Ok(a.add(&b).scale2(-1))
}

pub fn qsinh(x: &Rational, eps: &Rational) -> Result<Rational, MathError> {
    check_eps(eps)?;
    let e = eps.scale2(-1);
    let a = qexp(x, &e)?;
    let b = qexp(&x.neg(), &e)?;
    Ok(a.sub(&b).scale2(-1))
}

// ---------------------------------------------------------------------------
// Bernoulli / Euler numbers
// ---------------------------------------------------------------------------

/// Exact B_n; the cache table extends on demand.
/// B_m = −(1/(m+1)) · Σ_{k<m} C(m+1, k)·B_k.
pub fn bernoulli(cache: &mut TranscCache, n: usize) -> Rational {
    if cache.bernoulli.is_empty() {
        cache.bernoulli.push(Rational::one());
    }
    while cache.bernoulli.len() <= n {
        let m = cache.bernoulli.len();
        if m > 1 && m % 2 == 1 {
            cache.bernoulli.push(Rational::zero());
            continue;
        }
        let mut acc = Rational::zero();
        for (k, bk) in cache.bernoulli.iter().enumerate() {
            if bk.is_zero() {
                continue;
            }
            acc = acc.add(&Rational::from_mag(binomial(m as u64 + 1, k as u64), false).mul(bk));
        }
        let bm = acc
            .div(&Rational::from_i64(m as i64 + 1))
            .expect("m + 1 is nonzero")
            .neg();
        cache.bernoulli.push(bm);
    }
    cache.bernoulli[n].clone()
}

/// Exact E_n (integers; odd indices are zero).
/// E_{2m} = −Σ_{k<m} C(2m, 2k)·E_{2k}.
pub fn euler(cache: &mut TranscCache, n: usize) -> Rational {
    if cache.euler.is_empty() {
        cache.euler.push(Rational::one());
    }
    if n % 2 == 1 {
        return Rational::zero();
    }
    let want = n / 2;
    while cache.euler.len() <= want {
        let m = cache.euler.len();
        let mut acc = Rational::zero();
        for (k, ek) in cache.euler.iter().enumerate() {
            acc = acc.add(
                &Rational::from_mag(binomial(2 * m as u64, 2 * k as u64), false).mul(ek),
            );
        }
        cache.euler.push(acc.neg());
    }
    cache.euler[want].clone()
}

fn binomial(n: u64, k: u64) -> Mag {
    let k = k.min(n - k);
    let mut acc = Mag::one();
    for i in 0..k {
        acc = acc.mul(&Mag::from_u64(n - i)).divrem(&Mag::from_u64(i + 1)).0;
    }
    acc
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn eps20() -> Rational {
        Rational::pow10(-20)
    }

    fn close_to(value: &Rational, reference: &str, eps: &Rational) {
        let r = match reference.strip_prefix('-') {
            Some(rest) => Rational::parse(rest).unwrap().neg(),
            None => Rational::parse(reference).unwrap(),
        };
        let err = value.sub(&r).abs();
        let bound = eps.mul(&Rational::ratio_i64(3, 4));
        assert!(
            err.cmp_rat(&bound) != Ordering::Greater,
            "expected {} within 0.75·eps of {}, err {:?}",
            value,
            reference,
            err
        );
    }

    // ── exp / ln ─────────────────────────────────────────────────────────────

    #[test]
    fn exp_of_one() {
        let e = qexp(&Rational::one(), &eps20()).unwrap();
        close_to(&e, "2.71828182845904523536", &eps20());
    }

    #[test]
    fn exp_negative_and_reduction() {
        let v = qexp(&Rational::from_i64(-3), &eps20()).unwrap();
        close_to(&v, "0.04978706836786394297934", &eps20());
        let v = qexp(&Rational::from_i64(10), &Rational::pow10(-10)).unwrap();
        close_to(&v, "22026.4657948067165169579", &Rational::pow10(-10));
    }

    #[test]
    fn ln_basics() {
        let l2 = qln(&Rational::from_i64(2), &eps20()).unwrap();
        close_to(&l2, "0.69314718055994530942", &eps20());
        let l10 = qln(&Rational::from_i64(10), &eps20()).unwrap();
        close_to(&l10, "2.30258509299404568402", &eps20());
        // ln over the fraction branch
        let lh = qln(&Rational::ratio_i64(1, 3), &eps20()).unwrap();
        close_to(&lh, "-1.09861228866810969140", &eps20());
        assert!(qln(&Rational::zero(), &eps20()).is_err());
        assert!(qln(&Rational::from_i64(-1), &eps20()).is_err());
    }

    #[test]
    fn exp_ln_roundtrip() {
        let x = Rational::ratio_i64(7, 3);
        let e = eps20();
        let y = qln(&qexp(&x, &e.scale2(-8)).unwrap(), &e.scale2(-2)).unwrap();
        let err = y.sub(&x).abs();
        assert!(err.cmp_rat(&e) == Ordering::Less);
    }

    // ── sin / cos / tan ──────────────────────────────────────────────────────

    #[test]
    fn cos_of_one_matches_reference() {
        let mut cache = TranscCache::new();
        let c = qcos(&mut cache, &Rational::one(), &eps20()).unwrap();
        close_to(&c, "0.54030230586813971740", &eps20());
    }

    #[test]
    fn sin_of_one_matches_reference() {
        let mut cache = TranscCache::new();
        let s = qsin(&mut cache, &Rational::one(), &eps20()).unwrap();
        close_to(&s, "0.84147098480789650665", &eps20());
    }

    #[test]
    fn pythagorean_identity() {
        let mut cache = TranscCache::new();
        let e = Rational::pow10(-25);
        let x = Rational::ratio_i64(17, 5);
        let s = qsin(&mut cache, &x, &e).unwrap();
        let c = qcos(&mut cache, &x, &e).unwrap();
        let delta = s.square().add(&c.square()).sub(&Rational::one()).abs();
        assert!(delta.cmp_rat(&Rational::pow10(-22)) == Ordering::Less);
    }

    #[test]
    fn trig_range_reduction() {
        let mut cache = TranscCache::new();
        // cos(100): reduction subtracts 16 full turns.
        let c = qcos(&mut cache, &Rational::from_i64(100), &eps20()).unwrap();
        close_to(&c, "0.86231887228768393410", &eps20());
    }

    #[test]
    fn tan_of_one() {
        let mut cache = TranscCache::new();
        let t = qtan(&mut cache, &Rational::one(), &Rational::pow10(-15)).unwrap();
        close_to(&t, "1.557407724654902231", &Rational::pow10(-15));
    }

    // ── atan / pi ────────────────────────────────────────────────────────────

    #[test]
    fn atan_values() {
        let mut cache = TranscCache::new();
        let a = qatan(&mut cache, &Rational::one(), &eps20()).unwrap();
        close_to(&a, "0.78539816339744830962", &eps20());
        let b = qatan(&mut cache, &Rational::from_i64(-2), &eps20()).unwrap();
        close_to(&b, "-1.10714871779409050302", &eps20());
    }

    #[test]
    fn pi_machin() {
        let mut cache = TranscCache::new();
        let pi = qpi(&mut cache, &eps20()).unwrap();
        close_to(&pi, "3.14159265358979323846", &eps20());
        // Cache hit returns the same value for looser eps.
        let again = qpi(&mut cache, &Rational::pow10(-5)).unwrap();
        assert_eq!(pi, again);
    }

    // ── sqrt / root ──────────────────────────────────────────────────────────

    #[test]
    fn sqrt_two() {
        let r = qsqrt(&Rational::from_i64(2), &eps20(), Round::NearEven).unwrap();
        close_to(&r, "1.41421356237309504880", &eps20());
        assert!(qsqrt(&Rational::from_i64(-2), &eps20(), Round::NearEven).is_err());
        assert_eq!(
            qsqrt(&Rational::zero(), &eps20(), Round::NearEven).unwrap(),
            Rational::zero()
        );
    }

    #[test]
    fn sqrt_exact_square() {
        let r = qsqrt(&Rational::from_i64(49), &eps20(), Round::NearEven).unwrap();
        assert_eq!(r, Rational::from_i64(7));
    }

    #[test]
    fn cube_root() {
        let r = qroot(&Rational::from_i64(2), &Rational::from_i64(3), &eps20()).unwrap();
        close_to(&r, "1.25992104989487316477", &eps20());
        let neg = qroot(&Rational::from_i64(-8), &Rational::from_i64(3), &eps20()).unwrap();
        close_to(&neg, "-2", &eps20());
        assert!(qroot(&Rational::from_i64(-4), &Rational::from_i64(2), &eps20()).is_err());
    }

    // ── hyperbolics ──────────────────────────────────────────────────────────

    #[test]
    fn cosh_sinh() {
        let e = eps20();
        let c = qcosh(&Rational::one(), &e).unwrap();
        close_to(&c, "1.54308063481524377848", &e);
        let s = qsinh(&Rational::one(), &e).unwrap();
        close_to(&s, "1.17520119364380145688", &e);
    }

    // ── Bernoulli / Euler ────────────────────────────────────────────────────

    #[test]
    fn bernoulli_table() {
        let mut cache = TranscCache::new();
        assert_eq!(bernoulli(&mut cache, 0), Rational::one());
        assert_eq!(bernoulli(&mut cache, 1), Rational::ratio_i64(-1, 2));
        assert_eq!(bernoulli(&mut cache, 2), Rational::ratio_i64(1, 6));
        assert_eq!(bernoulli(&mut cache, 3), Rational::zero());
        assert_eq!(bernoulli(&mut cache, 4), Rational::ratio_i64(-1, 30));
        assert_eq!(bernoulli(&mut cache, 12), Rational::ratio_i64(-691, 2730));
    }

    #[test]
    fn euler_table() {
        let mut cache = TranscCache::new();
        assert_eq!(euler(&mut cache, 0), Rational::one());
        assert_eq!(euler(&mut cache, 1), Rational::zero());
        assert_eq!(euler(&mut cache, 2), Rational::from_i64(-1));
        assert_eq!(euler(&mut cache, 4), Rational::from_i64(5));
        assert_eq!(euler(&mut cache, 6), Rational::from_i64(-61));
        assert_eq!(euler(&mut cache, 8), Rational::from_i64(1385));
        assert_eq!(euler(&mut cache, 10), Rational::from_i64(-50521));
    }

    #[test]
    fn binomial_helper() {
        assert_eq!(binomial(10, 3), Mag::from_u64(120));
        assert_eq!(binomial(10, 0), Mag::one());
        assert_eq!(binomial(52, 26).to_str_radix(10), "495918532948104");
    }
}
