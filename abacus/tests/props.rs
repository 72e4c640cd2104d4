/// Property tests for the numeric kernel invariants:
/// division identities under every rounding mode, gcd divisibility,
/// integer square-root bracketing, modular exponentiation, canonical
/// rational form, and display/parse round-trips.
use abacus::conf::Round;
use abacus::core::mag::Mag;
use abacus::core::rational::Rational;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

const MODES: [Round; 7] = [
    Round::Zero,
    Round::Away,
    Round::Floor,
    Round::Ceil,
    Round::NearEven,
    Round::HalfUp,
    Round::Trunc,
];

fn rat(n: i64, d: i64) -> Rational {
    Rational::ratio_i64(n, d)
}

// ─── (a / b)·b + (a mod b) == a under every rounding mode ────────────────────

#[quickcheck]
fn division_identity(an: i64, ad: i64, bn: i64, bd: i64) -> TestResult {
    if ad == 0 || bd == 0 || bn == 0 {
        return TestResult::discard();
    }
    let a = rat(an, ad);
    let b = rat(bn, bd);
    for mode in MODES {
        let (q, r) = Rational::divide(&a, &b, mode).unwrap();
        if !q.is_integer() {
            return TestResult::failed();
        }
        if q.mul(&b).add(&r) != a {
            return TestResult::failed();
        }
        // The remainder is smaller than the divisor in magnitude (the two
        // nearest-integer modes can land on either side).
        if r.abs().cmp_rat(&b.abs()) == Ordering::Greater {
            return TestResult::failed();
        }
    }
    TestResult::passed()
}

// ─── gcd divides both and is maximal ─────────────────────────────────────────

#[quickcheck]
fn gcd_divides_and_matches_euclid(a: u64, b: u64) -> bool {
    let g = Mag::from_u64(a).gcd(&Mag::from_u64(b));
    // Euclid reference.
    let (mut x, mut y) = (a, b);
    while y != 0 {
        let t = x % y;
        x = y;
        y = t;
    }
    g == Mag::from_u64(x)
}

// ─── isqrt(a)² ≤ a < (isqrt(a)+1)² ───────────────────────────────────────────

#[quickcheck]
fn isqrt_brackets(a: u64) -> bool {
    let n = Mag::from_u64(a);
    let r = n.isqrt();
    r.square().cmp_mag(&n) != Ordering::Greater
        && r.add_u32(1).square().cmp_mag(&n) == Ordering::Greater
}

// ─── powmod(a, e, m) == a^e mod m ────────────────────────────────────────────

#[quickcheck]
fn powmod_matches_naive(a: u32, e: u8, m: u16) -> TestResult {
    if m == 0 {
        return TestResult::discard();
    }
    let got = Mag::from_u64(a as u64).powmod(&Mag::from_u64(e as u64), &Mag::from_u64(m as u64));
    // Naive reference in u128.
    let mut acc: u128 = 1;
    for _ in 0..e {
        acc = acc * a as u128 % m as u128;
    }
    if m == 1 {
        acc = 0;
    }
    TestResult::from_bool(got == Mag::from_u64(acc as u64))
}

// ─── Rationals are always in lowest terms ────────────────────────────────────

#[quickcheck]
fn canonical_form(n: i64, d: i64) -> TestResult {
    if d == 0 {
        return TestResult::discard();
    }
    let q = rat(n, d);
    let g = q.num_mag().gcd(q.den_mag());
    if n == 0 {
        return TestResult::from_bool(q.is_zero() && !q.is_negative() && q.den_mag().is_one());
    }
    TestResult::from_bool(g.is_one() && !q.den_mag().is_zero())
}

// ─── Arithmetic sanity: (a + b) − b == a, (a·b)/b == a ───────────────────────

#[quickcheck]
fn add_mul_inverses(an: i64, ad: i64, bn: i64, bd: i64) -> TestResult {
    if ad == 0 || bd == 0 {
        return TestResult::discard();
    }
    let a = rat(an, ad);
    let b = rat(bn, bd);
    if a.add(&b).sub(&b) != a {
        return TestResult::failed();
    }
    if bn != 0 && a.mul(&b).div(&b).unwrap() != a {
        return TestResult::failed();
    }
    TestResult::passed()
}

// ─── Fraction display round-trips exactly ────────────────────────────────────

#[quickcheck]
fn frac_display_roundtrip(n: i64, d: i64) -> TestResult {
    if d == 0 {
        return TestResult::discard();
    }
    let q = rat(n, d);
    let shown = format!("{}", q); // num/den form
    let (text, neg) = match shown.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (shown.as_str(), false),
    };
    let back = match text.split_once('/') {
        Some((num, den)) => {
            let num = Rational::parse(num).unwrap();
            let den = Rational::parse(den).unwrap();
            num.div(&den).unwrap()
        }
        None => Rational::parse(text).unwrap(),
    };
    let back = if neg { back.neg() } else { back };
    TestResult::from_bool(back == q)
}

// ─── Karatsuba-sized multiplication obeys ring axioms ────────────────────────

#[test]
fn large_multiplication_ring_axioms() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(0xabacab);
    for _ in 0..10 {
        let a = random_mag(&mut rng, 120);
        let b = random_mag(&mut rng, 97);
        let c = random_mag(&mut rng, 64);
        // Commutativity and distributivity.
        assert_eq!(a.mul(&b), b.mul(&a));
        assert_eq!(a.mul(&b.add(&c)), a.mul(&b).add(&a.mul(&c)));
        // Division inverts multiplication.
        let (q, r) = a.mul(&b).divrem(&b);
        assert_eq!(q, a);
        assert!(r.is_zero());
        // The dedicated squaring path agrees with division.
        let (q, r) = a.square().divrem(&a);
        assert_eq!(q, a);
        assert!(r.is_zero());
    }
}

fn random_mag(rng: &mut impl Rng, limbs: usize) -> Mag {
    let mut v: Vec<u32> = (0..limbs).map(|_| rng.gen()).collect();
    // Keep the top limb nonzero so sizes are as requested.
    if let Some(top) = v.last_mut() {
        *top |= 1;
    }
    Mag::from_limbs(v)
}

// ─── Value semantics at the engine level ─────────────────────────────────────

#[quickcheck]
fn engine_value_semantics(x: i32) -> bool {
    let mut engine = abacus::Engine::new();
    let src = format!(
        "v = list({0}, {0} + 1); w = v; w[1] = 0; return v[1] == {0} + 1 && w[1] == 0;",
        x
    );
    engine
        .run_source(&src, false)
        .map(|v| v.as_i64() == Some(1))
        .unwrap_or(false)
}

// ─── Pure functions have no environment effect ───────────────────────────────

#[test]
fn function_call_leaves_environment_untouched() {
    let mut engine = abacus::Engine::new();
    engine
        .run_source(
            "g = 42;\n\
             define pure(n) { local t = n * n; return t + 1; }",
            false,
        )
        .unwrap();
    let globals_before: Vec<String> = {
        let mut names: Vec<String> = engine.globals.keys().cloned().collect();
        names.sort();
        names
    };
    let v = engine.run_source("return pure(9);", false).unwrap();
    assert_eq!(v.as_i64(), Some(82));
    let mut globals_after: Vec<String> = engine.globals.keys().cloned().collect();
    globals_after.sort();
    assert_eq!(globals_before, globals_after);
    assert_eq!(
        engine.globals.get("g").and_then(|v| v.as_i64()),
        Some(42)
    );
}
