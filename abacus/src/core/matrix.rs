/// Dense matrices with 1–4 dimensions and caller-chosen index bounds.
///
/// Bounds are inclusive `[lo, hi]` pairs and non-zero lower bounds are
/// preserved, never normalized away. Storage is row-major. Determinants use
/// fraction-free Bareiss elimination; the inverse runs Gauss–Jordan, which
/// is exact over rational elements.
use crate::conf::Config;
use crate::core::value::{binary, unary, BinOp, UnOp, Value};
use crate::errors::{ErrorVal, MathError, E_BOUNDS, E_DIMS, E_SHAPE};

pub const MAX_DIMS: usize = 4;

#[derive(Clone, Debug)]
pub struct Matrix {
    bounds: Vec<(i64, i64)>,
    data: Vec<Value>,
}

impl Matrix {
    pub fn new(bounds: Vec<(i64, i64)>) -> Result<Self, ErrorVal> {
        if bounds.is_empty() || bounds.len() > MAX_DIMS {
            return Err(ErrorVal::with_msg(E_DIMS, "matrix needs 1 to 4 dimensions"));
        }
        let mut total: usize = 1;
        for &(lo, hi) in &bounds {
            if hi < lo {
                return Err(ErrorVal::with_msg(E_DIMS, "matrix upper bound below lower bound"));
            }
            let extent = (hi - lo + 1) as usize;
            total = total
                .checked_mul(extent)
                .filter(|&t| t <= 1 << 24)
                .ok_or_else(|| ErrorVal::with_msg(E_DIMS, "matrix too large"))?;
        }
        // Elements start at zero, matching assignment-free reads.
        Ok(Matrix {
            bounds,
            data: vec![Value::from_i64(0); total],
        })
    }

    pub fn dim_count(&self) -> usize {
        self.bounds.len()
    }

    pub fn bounds(&self) -> &[(i64, i64)] {
        &self.bounds
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Value] {
        &mut self.data
    }

    fn extent(&self, d: usize) -> usize {
        let (lo, hi) = self.bounds[d];
        (hi - lo + 1) as usize
    }

    /// Row-major linear offset; every index is checked against its bounds.
    pub fn offset(&self, indices: &[i64]) -> Result<usize, ErrorVal> {
        if indices.len() != self.bounds.len() {
            return Err(ErrorVal::with_msg(
                E_DIMS,
                format!("matrix expects {} indices, got {}", self.bounds.len(), indices.len()),
            ));
        }
        let mut off = 0usize;
        for (d, &ix) in indices.iter().enumerate() {
            let (lo, hi) = self.bounds[d];
            if ix < lo || ix > hi {
                return Err(ErrorVal::with_msg(
                    E_BOUNDS,
                    format!("index {} outside [{}, {}]", ix, lo, hi),
                ));
            }
            off = off * self.extent(d) + (ix - lo) as usize;
        }
        Ok(off)
    }

    pub fn get(&self, indices: &[i64]) -> Result<&Value, ErrorVal> {
        Ok(&self.data[self.offset(indices)?])
    }

    pub fn set(&mut self, indices: &[i64], v: Value) -> Result<(), ErrorVal> {
        let off = self.offset(indices)?;
        self.data[off] = v;
        Ok(())
    }

    pub fn fill(&mut self, v: Value) {
        for slot in &mut self.data {
            *slot = v.clone();
        }
    }

    pub fn same_shape(&self, other: &Matrix) -> bool {
        self.bounds == other.bounds
    }

    /// 2-d only: swapped bounds, permuted data.
    pub fn transpose(&self) -> Result<Matrix, ErrorVal> {
        if self.bounds.len() != 2 {
            return Err(ErrorVal::with_msg(E_DIMS, "transpose needs a 2-dimensional matrix"));
        }
        let rows = self.extent(0);
        let cols = self.extent(1);
        let mut out = Matrix {
            bounds: vec![self.bounds[1], self.bounds[0]],
            data: vec![Value::from_i64(0); self.data.len()],
        };
        for r in 0..rows {
            for c in 0..cols {
                out.data[c * rows + r] = self.data[r * cols + c].clone();
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Arithmetic
    // -----------------------------------------------------------------------

    pub fn elementwise(&self, other: &Matrix, op: BinOp, conf: &Config) -> Result<Matrix, ErrorVal> {
        if !self.same_shape(other) {
            return Err(ErrorVal::with_msg(E_SHAPE, "matrix shapes differ"));
        }
        let mut out = self.clone();
        for (slot, rhs) in out.data.iter_mut().zip(&other.data) {
            *slot = binary(op, slot, rhs, conf)?;
        }
        Ok(out)
    }

    /// Scalar broadcast; `scalar_on_left` preserves operand order for
    /// non-commutative ops.
    pub fn broadcast(
        &self,
        scalar: &Value,
        op: BinOp,
        scalar_on_left: bool,
        conf: &Config,
    ) -> Result<Matrix, ErrorVal> {
        let mut out = self.clone();
        for slot in out.data.iter_mut() {
            *slot = if scalar_on_left {
                binary(op, scalar, slot, conf)?
            } else {
                binary(op, slot, scalar, conf)?
            };
        }
        Ok(out)
    }

    /// 2-d matrix product; inner extents must agree.
    pub fn matmul(&self, other: &Matrix, conf: &Config) -> Result<Matrix, ErrorVal> {
        if self.bounds.len() != 2 || other.bounds.len() != 2 {
            return Err(ErrorVal::with_msg(E_DIMS, "matrix product needs 2-dimensional operands"));
        }
        let (n, k1) = (self.extent(0), self.extent(1));
        let (k2, m) = (other.extent(0), other.extent(1));
        if k1 != k2 {
            return Err(ErrorVal::with_msg(E_SHAPE, "inner matrix dimensions differ"));
        }
        let mut out = Matrix {
            bounds: vec![self.bounds[0], other.bounds[1]],
            data: vec![Value::from_i64(0); n * m],
        };
        for i in 0..n {
            for j in 0..m {
                let mut acc = Value::from_i64(0);
                for k in 0..k1 {
                    let p = binary(
                        BinOp::Mul,
                        &self.data[i * k1 + k],
                        &other.data[k * m + j],
                        conf,
                    )?;
                    acc = binary(BinOp::Add, &acc, &p, conf)?;
                }
                out.data[i * m + j] = acc;
            }
        }
        Ok(out)
    }

    /// Fraction-free Bareiss determinant over the element field.
    pub fn det(&self, conf: &Config) -> Result<Value, ErrorVal> {
        let n = self.square_extent()?;
        let mut a: Vec<Value> = self.data.clone();
        let mut sign_flip = false;
        let mut prev = Value::from_i64(1);
        for k in 0..n {
            // Pivot search.
            if value_is_zero(&a[k * n + k]) {
                let mut swapped = false;
                for r in k + 1..n {
                    if !value_is_zero(&a[r * n + k]) {
                        for c in 0..n {
                            a.swap(k * n + c, r * n + c);
                        }
                        sign_flip = !sign_flip;
                        swapped = true;
                        break;
                    }
                }
                if !swapped {
                    return Ok(Value::from_i64(0));
                }
            }
            for i in k + 1..n {
                for j in k + 1..n {
                    // a[i][j] = (a[i][j]·a[k][k] − a[i][k]·a[k][j]) / prev
                    let t1 = binary(BinOp::Mul, &a[i * n + j], &a[k * n + k], conf)?;
                    let t2 = binary(BinOp::Mul, &a[i * n + k], &a[k * n + j], conf)?;
                    let num = binary(BinOp::Sub, &t1, &t2, conf)?;
                    a[i * n + j] = binary(BinOp::Div, &num, &prev, conf)?;
                }
            }
            prev = a[k * n + k].clone();
        }
        let det = a[(n - 1) * n + (n - 1)].clone();
        if sign_flip {
            unary(UnOp::Neg, &det, conf)
        } else {
            Ok(det)
        }
    }

    /// Gauss–Jordan inverse (exact over rational/complex elements).
    pub fn inverse(&self, conf: &Config) -> Result<Matrix, ErrorVal> {
        let n = self.square_extent()?;
        let mut a: Vec<Value> = self.data.clone();
        let mut inv: Vec<Value> = (0..n * n)
            .map(|i| Value::from_i64(if i / n == i % n { 1 } else { 0 }))
            .collect();
        for col in 0..n {
            // Find a usable pivot row.
            let pivot_row = (col..n)
                .find(|&r| !value_is_zero(&a[r * n + col]))
                .ok_or_else(|| ErrorVal::from(MathError::Domain("matrix is singular")))?;
            if pivot_row != col {
                for c in 0..n {
                    a.swap(col * n + c, pivot_row * n + c);
                    inv.swap(col * n + c, pivot_row * n + c);
                }
            }
            let pivot = a[col * n + col].clone();
            for c in 0..n {
                a[col * n + c] = binary(BinOp::Div, &a[col * n + c], &pivot, conf)?;
                inv[col * n + c] = binary(BinOp::Div, &inv[col * n + c], &pivot, conf)?;
            }
            for r in 0..n {
                if r == col || value_is_zero(&a[r * n + col]) {
                    continue;
                }
                let factor = a[r * n + col].clone();
                for c in 0..n {
                    let t = binary(BinOp::Mul, &factor, &a[col * n + c], conf)?;
                    a[r * n + c] = binary(BinOp::Sub, &a[r * n + c], &t, conf)?;
                    let t = binary(BinOp::Mul, &factor, &inv[col * n + c], conf)?;
                    inv[r * n + c] = binary(BinOp::Sub, &inv[r * n + c], &t, conf)?;
                }
            }
        }
        Ok(Matrix {
            bounds: self.bounds.clone(),
            data: inv,
        })
    }

    fn square_extent(&self) -> Result<usize, ErrorVal> {
        if self.bounds.len() != 2 {
            return Err(ErrorVal::with_msg(E_DIMS, "need a 2-dimensional matrix"));
        }
        let n = self.extent(0);
        if n != self.extent(1) {
            return Err(ErrorVal::with_msg(E_SHAPE, "matrix is not square"));
        }
        Ok(n)
    }
}

fn value_is_zero(v: &Value) -> bool {
    match v {
        Value::Number(q) => q.is_zero(),
        Value::Null => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf() -> Config {
        Config::default()
    }

    fn mat2(vals: [[i64; 2]; 2]) -> Matrix {
        let mut m = Matrix::new(vec![(0, 1), (0, 1)]).unwrap();
        for i in 0..2 {
            for j in 0..2 {
                m.set(&[i as i64, j as i64], Value::from_i64(vals[i][j])).unwrap();
            }
        }
        m
    }

    fn mat3(vals: [[i64; 3]; 3]) -> Matrix {
        let mut m = Matrix::new(vec![(0, 2), (0, 2)]).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                m.set(&[i as i64, j as i64], Value::from_i64(vals[i][j])).unwrap();
            }
        }
        m
    }

    #[test]
    fn bounds_are_preserved() {
        let mut m = Matrix::new(vec![(1, 3), (-1, 1)]).unwrap();
        assert_eq!(m.size(), 9);
        m.set(&[1, -1], Value::from_i64(7)).unwrap();
        assert_eq!(m.get(&[1, -1]).unwrap().as_i64(), Some(7));
        assert!(m.get(&[0, 0]).is_err());
        assert!(m.get(&[1, 2]).is_err());
        assert!(m.get(&[1]).is_err());
    }

    #[test]
    fn dims_limits() {
        assert!(Matrix::new(vec![]).is_err());
        assert!(Matrix::new(vec![(0, 1); 5]).is_err());
        assert!(Matrix::new(vec![(2, 1)]).is_err());
    }

    #[test]
    fn transpose_roundtrip() {
        let m = mat2([[1, 2], [3, 4]]);
        let t = m.transpose().unwrap();
        assert_eq!(t.get(&[0, 1]).unwrap().as_i64(), Some(3));
        let tt = t.transpose().unwrap();
        assert_eq!(tt.get(&[0, 1]).unwrap().as_i64(), Some(2));
    }

    #[test]
    fn elementwise_and_broadcast() {
        let a = mat2([[1, 2], [3, 4]]);
        let b = mat2([[10, 20], [30, 40]]);
        let s = a.elementwise(&b, BinOp::Add, &conf()).unwrap();
        assert_eq!(s.get(&[1, 1]).unwrap().as_i64(), Some(44));
        let d = a.broadcast(&Value::from_i64(2), BinOp::Mul, false, &conf()).unwrap();
        assert_eq!(d.get(&[1, 0]).unwrap().as_i64(), Some(6));
        let c = mat3([[0; 3]; 3]);
        assert!(a.elementwise(&c, BinOp::Add, &conf()).is_err());
    }

    #[test]
    fn matmul_identity() {
        let a = mat2([[1, 2], [3, 4]]);
        let id = mat2([[1, 0], [0, 1]]);
        let p = a.matmul(&id, &conf()).unwrap();
        assert_eq!(p.get(&[0, 1]).unwrap().as_i64(), Some(2));
        assert_eq!(p.get(&[1, 0]).unwrap().as_i64(), Some(3));
    }

    #[test]
    fn determinant_bareiss() {
        assert_eq!(mat2([[1, 2], [3, 4]]).det(&conf()).unwrap().as_i64(), Some(-2));
        assert_eq!(
            mat3([[1, 2, 3], [4, 5, 6], [7, 8, 10]]).det(&conf()).unwrap().as_i64(),
            Some(-3)
        );
        // Singular: determinant zero.
        assert_eq!(
            mat3([[1, 2, 3], [4, 5, 6], [7, 8, 9]]).det(&conf()).unwrap().as_i64(),
            Some(0)
        );
        // Zero leading pivot forces a row swap.
        assert_eq!(mat2([[0, 1], [1, 0]]).det(&conf()).unwrap().as_i64(), Some(-1));
    }

    #[test]
    fn inverse_times_self_is_identity() {
        let m = mat3([[1, 2, 3], [4, 5, 6], [7, 8, 10]]);
        let inv = m.inverse(&conf()).unwrap();
        let p = inv.matmul(&m, &conf()).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1 } else { 0 };
                assert_eq!(p.get(&[i, j]).unwrap().as_i64(), Some(expect), "at {},{}", i, j);
            }
        }
        let sing = mat2([[1, 2], [2, 4]]);
        assert!(sing.inverse(&conf()).is_err());
    }
}
