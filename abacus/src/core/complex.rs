/// Complex numbers as pairs of exact rationals.
///
/// The value layer demotes any result with a zero imaginary part back to a
/// plain rational, so a `Complex` seen at runtime always has im ≠ 0; inside
/// this module both parts are unconstrained intermediates.
use crate::conf::Round;
use crate::core::rational::Rational;
use crate::core::transc::{self, TranscCache};
use crate::errors::MathError;
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Complex {
    re: Rational,
    im: Rational,
}

impl Complex {
    pub fn new(re: Rational, im: Rational) -> Self {
        Complex { re, im }
    }

    pub fn from_real(re: Rational) -> Self {
        Complex { re, im: Rational::zero() }
    }

    pub fn re(&self) -> &Rational {
        &self.re
    }

    pub fn im(&self) -> &Rational {
        &self.im
    }

    pub fn is_real(&self) -> bool {
        self.im.is_zero()
    }

    pub fn into_parts(self) -> (Rational, Rational) {
        (self.re, self.im)
    }

    // -----------------------------------------------------------------------
    // Arithmetic
    // -----------------------------------------------------------------------

    pub fn add(&self, other: &Complex) -> Complex {
        Complex {
            re: self.re.add(&other.re),
            im: self.im.add(&other.im),
        }
    }

    pub fn sub(&self, other: &Complex) -> Complex {
        Complex {
            re: self.re.sub(&other.re),
            im: self.im.sub(&other.im),
        }
    }

    pub fn mul(&self, other: &Complex) -> Complex {
        // (a+bi)(c+di) = (ac − bd) + (ad + bc)i
        let ac = self.re.mul(&other.re);
        let bd = self.im.mul(&other.im);
        let ad = self.re.mul(&other.im);
        let bc = self.im.mul(&other.re);
        Complex {
            re: ac.sub(&bd),
            im: ad.add(&bc),
        }
    }

    pub fn div(&self, other: &Complex) -> Result<Complex, MathError> {
        let denom = other.norm_sq();
        if denom.is_zero() {
            return Err(MathError::DivByZero);
        }
        let conj = other.conj();
        let num = self.mul(&conj);
        Ok(Complex {
            re: num.re.div(&denom)?,
            im: num.im.div(&denom)?,
        })
    }

    pub fn neg(&self) -> Complex {
        Complex { re: self.re.neg(), im: self.im.neg() }
    }

    pub fn conj(&self) -> Complex {
        Complex { re: self.re.clone(), im: self.im.neg() }
    }

    /// a² + b², always a nonnegative rational.
    pub fn norm_sq(&self) -> Rational {
        self.re.square().add(&self.im.square())
    }

    /// |z| to eps.
    pub fn abs(&self, eps: &Rational) -> Result<Rational, MathError> {
        transc::qsqrt(&self.norm_sq(), eps, Round::NearEven)
    }

    /// Integer powers by repeated squaring; 0^0 = 1, 0^neg is an error.
    pub fn pow_int(&self, exp: &Rational) -> Result<Complex, MathError> {
        if !exp.is_integer() {
            return Err(MathError::NonInteger);
        }
        if self.re.is_zero() && self.im.is_zero() {
            if exp.is_zero() {
                return Ok(Complex::from_real(Rational::one()));
            }
            if exp.is_negative() {
                return Err(MathError::ZeroPowNeg);
            }
            return Ok(Complex::from_real(Rational::zero()));
        }
        let e = exp
            .num_mag()
            .to_u64()
            .filter(|&e| e <= u32::MAX as u64)
            .ok_or(MathError::InvalidArg("exponent too large"))?;
        let mut base = self.clone();
        let mut acc = Complex::from_real(Rational::one());
        let mut e = e;
        while e > 0 {
            if e & 1 == 1 {
                acc = acc.mul(&base);
            }
            e >>= 1;
            if e > 0 {
                base = base.mul(&base);
            }
        }
        if exp.is_negative() {
            Complex::from_real(Rational::one()).div(&acc)
        } else {
            Ok(acc)
        }
    }

    // -----------------------------------------------------------------------
    // Transcendentals (derived from the real kernel)
    // -----------------------------------------------------------------------

    /// e^(a+bi) = e^a·(cos b + i·sin b).
    pub fn exp(&self, cache: &mut TranscCache, eps: &Rational) -> Result<Complex, MathError> {
        let e4 = eps.scale2(-2);
        let ea = transc::qexp(&self.re, &e4)?;
        let cb = transc::qcos(cache, &self.im, &e4)?;
        let sb = transc::qsin(cache, &self.im, &e4)?;
        Ok(Complex {
            re: ea.mul(&cb),
            im: ea.mul(&sb),
        })
    }

    /// ln z = ln|z| + i·arg z.
    pub fn ln(&self, cache: &mut TranscCache, eps: &Rational) -> Result<Complex, MathError> {
        let n = self.norm_sq();
        if n.is_zero() {
            return Err(MathError::Domain("ln of zero"));
        }
        let e4 = eps.scale2(-2);
        // ln|z| = ln(a²+b²)/2 avoids the square root entirely.
        let lr = transc::qln(&n, &e4)?.scale2(-1);
        let arg = atan2(cache, &self.im, &self.re, &e4)?;
        Ok(Complex { re: lr, im: arg })
    }

    /// cos(a+bi) = cos a·cosh b − i·sin a·sinh b.
    pub fn cos(&self, cache: &mut TranscCache, eps: &Rational) -> Result<Complex, MathError> {
        let e = component_eps(&self.im, eps);
        let ca = transc::qcos(cache, &self.re, &e)?;
        let sa = transc::qsin(cache, &self.re, &e)?;
        let chb = transc::qcosh(&self.im, &e)?;
        let shb = transc::qsinh(&self.im, &e)?;
        Ok(Complex {
            re: ca.mul(&chb),
            im: sa.mul(&shb).neg(),
        })
    }

    /// sin(a+bi) = sin a·cosh b + i·cos a·sinh b.
    pub fn sin(&self, cache: &mut TranscCache, eps: &Rational) -> Result<Complex, MathError> {
        let e = component_eps(&self.im, eps);
        let ca = transc::qcos(cache, &self.re, &e)?;
        let sa = transc::qsin(cache, &self.re, &e)?;
        let chb = transc::qcosh(&self.im, &e)?;
        let shb = transc::qsinh(&self.im, &e)?;
        Ok(Complex {
            re: sa.mul(&chb),
            im: ca.mul(&shb),
        })
    }

    /// Principal square root: sqrt((|z|+a)/2) + i·sgn(b)·sqrt((|z|−a)/2).
    pub fn sqrt(&self, eps: &Rational) -> Result<Complex, MathError> {
        let e4 = eps.scale2(-2);
        let r = transc::qsqrt(&self.norm_sq(), &e4.square(), Round::NearEven)?;
        let re = transc::qsqrt(
            &r.add(&self.re).scale2(-1).abs(),
            &e4,
            Round::NearEven,
        )?;
        let mut im = transc::qsqrt(
            &r.sub(&self.re).scale2(-1).abs(),
            &e4,
            Round::NearEven,
        )?;
        if self.im.is_negative() {
            im = im.neg();
        }
        Ok(Complex { re, im })
    }
}

/// Two-argument arctangent over exact rationals.
pub fn atan2(
    cache: &mut TranscCache,
    y: &Rational,
    x: &Rational,
    eps: &Rational,
) -> Result<Rational, MathError> {
    match (x.sign(), y.sign()) {
        (0, 0) => Err(MathError::Domain("atan2 of the origin")),
        (0, s) => {
            let p = transc::qpi(cache, &eps.scale2(-1))?.scale2(-1);
            Ok(if s > 0 { p } else { p.neg() })
        }
        (sx, _) => {
            let base = transc::qatan(cache, &y.div(x)?, &eps.scale2(-1))?;
            if sx > 0 {
                Ok(base)
            } else {
                let p = transc::qpi(cache, &eps.scale2(-1))?;
                if y.is_negative() {
                    Ok(base.sub(&p))
                } else {
                    Ok(base.add(&p))
                }
            }
        }
    }
}

/// cosh/sinh grow like e^|b|, so the component eps shrinks with |b| to keep
/// the product error inside the caller's bound.
fn component_eps(im: &Rational, eps: &Rational) -> Rational {
    let b = im.abs().trunc().to_i64().unwrap_or(1 << 20).min(1 << 20);
    eps.scale2(-(2 * b as i32 + 4))
}

impl fmt::Debug for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Complex({} + {}i)", self.re, self.im)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: i64, im: i64) -> Complex {
        Complex::new(Rational::from_i64(re), Rational::from_i64(im))
    }

    fn eps20() -> Rational {
        Rational::pow10(-20)
    }

    #[test]
    fn field_operations() {
        let a = c(1, 2);
        let b = c(3, -1);
        assert_eq!(a.add(&b), c(4, 1));
        assert_eq!(a.sub(&b), c(-2, 3));
        assert_eq!(a.mul(&b), c(5, 5));
        let q = a.mul(&b).div(&b).unwrap();
        assert_eq!(q, a);
        assert!(a.div(&c(0, 0)).is_err());
    }

    #[test]
    fn conjugate_and_norm() {
        let a = c(3, 4);
        assert_eq!(a.conj(), c(3, -4));
        assert_eq!(a.norm_sq(), Rational::from_i64(25));
        assert_eq!(a.abs(&eps20()).unwrap(), Rational::from_i64(5));
    }

    #[test]
    fn integer_powers() {
        // (1+i)^4 = -4
        let p = c(1, 1).pow_int(&Rational::from_i64(4)).unwrap();
        assert_eq!(p, c(-4, 0));
        let inv = c(0, 1).pow_int(&Rational::from_i64(-1)).unwrap();
        assert_eq!(inv, c(0, -1));
        assert_eq!(
            c(0, 0).pow_int(&Rational::zero()).unwrap(),
            c(1, 0)
        );
        assert!(c(0, 0).pow_int(&Rational::from_i64(-2)).is_err());
    }

    #[test]
    fn euler_identity() {
        // e^(iπ) ≈ −1
        let mut cache = TranscCache::new();
        let eps = eps20();
        let pi = transc::qpi(&mut cache, &eps.scale2(-4)).unwrap();
        let z = Complex::new(Rational::zero(), pi);
        let e = z.exp(&mut cache, &eps).unwrap();
        assert!(e.re.add(&Rational::one()).abs().cmp_rat(&eps) == Ordering::Less);
        assert!(e.im.abs().cmp_rat(&eps) == Ordering::Less);
    }

    #[test]
    fn ln_of_i() {
        // ln i = iπ/2
        let mut cache = TranscCache::new();
        let eps = eps20();
        let l = c(0, 1).ln(&mut cache, &eps).unwrap();
        let pi_half = transc::qpi(&mut cache, &eps.scale2(-4)).unwrap().scale2(-1);
        assert!(l.re.abs().cmp_rat(&eps) == Ordering::Less);
        assert!(l.im.sub(&pi_half).abs().cmp_rat(&eps) == Ordering::Less);
    }

    #[test]
    fn sqrt_of_minus_one() {
        let s = c(-1, 0).sqrt(&eps20()).unwrap();
        assert!(s.re.abs().cmp_rat(&eps20()) == Ordering::Less);
        assert!(s.im.sub(&Rational::one()).abs().cmp_rat(&eps20()) == Ordering::Less);
    }

    #[test]
    fn sqrt_of_2i() {
        // sqrt(2i) = 1 + i
        let s = c(0, 2).sqrt(&eps20()).unwrap();
        assert!(s.re.sub(&Rational::one()).abs().cmp_rat(&eps20()) == Ordering::Less);
        assert!(s.im.sub(&Rational::one()).abs().cmp_rat(&eps20()) == Ordering::Less);
    }

    #[test]
    fn complex_cos_reduces_to_real() {
        let mut cache = TranscCache::new();
        let z = Complex::new(Rational::one(), Rational::zero());
        let r = z.cos(&mut cache, &eps20()).unwrap();
        assert!(r.im.is_zero());
        let direct = transc::qcos(&mut cache, &Rational::one(), &eps20()).unwrap();
        assert!(r.re.sub(&direct).abs().cmp_rat(&eps20()) == Ordering::Less);
    }

    #[test]
    fn atan2_quadrants() {
        let mut cache = TranscCache::new();
        let eps = eps20();
        let pi = transc::qpi(&mut cache, &eps.scale2(-4)).unwrap();
        // atan2(1, -1) = 3π/4
        let a = atan2(&mut cache, &Rational::one(), &Rational::from_i64(-1), &eps).unwrap();
        let expect = pi.mul(&Rational::ratio_i64(3, 4));
        assert!(a.sub(&expect).abs().cmp_rat(&eps) == Ordering::Less);
        // atan2(-1, 0) = -π/2
        let b = atan2(&mut cache, &Rational::from_i64(-1), &Rational::zero(), &eps).unwrap();
        assert!(b.add(&pi.scale2(-1)).abs().cmp_rat(&eps) == Ordering::Less);
    }
}
