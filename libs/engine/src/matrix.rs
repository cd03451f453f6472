//! Row-major f64 matrices
//!
//! Determinant and inverse use direct cofactor/adjugate formulas up to 3×3
//! and LU decomposition with partial pivoting above that. Equality is
//! elementwise with a 1e-9 tolerance.

use crate::error::{Error, Result};

/// Tolerance for elementwise matrix equality.
pub const EQUALITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(Error::evaluation(format!(
                "matrix shape ({}, {}) does not match {} cells",
                rows,
                cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        if height == 0 || width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(Error::evaluation("matrix rows must be non-empty and of equal width"));
        }
        Ok(Self {
            rows: height,
            cols: width,
            data: rows.into_iter().flatten().collect(),
        })
    }

    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for k in 0..n {
            data[k * n + k] = 1.0;
        }
        Self {
            rows: n,
            cols: n,
            data,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] = value;
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    pub fn same_shape(&self, other: &Matrix) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "add", |a, b| a + b)
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_with(other, "subtract", |a, b| a - b)
    }

    fn zip_with(&self, other: &Matrix, verb: &str, f: impl Fn(f64, f64) -> f64) -> Result<Matrix> {
        if !self.same_shape(other) {
            return Err(Error::evaluation(format!(
                "cannot {} a {}x{} matrix and a {}x{} matrix",
                verb, self.rows, self.cols, other.rows, other.cols
            )));
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| f(*a, *b))
            .collect();
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    pub fn scale(&self, k: f64) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|a| a * k).collect(),
        }
    }

    pub fn mul(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(Error::evaluation(format!(
                "cannot multiply a {}x{} matrix by a {}x{} matrix",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = Matrix {
            rows: self.rows,
            cols: other.cols,
            data: vec![0.0; self.rows * other.cols],
        };
        for r in 0..self.rows {
            for c in 0..other.cols {
                let mut acc = 0.0;
                for k in 0..self.cols {
                    acc += self.get(r, k) * other.get(k, c);
                }
                out.set(r, c, acc);
            }
        }
        Ok(out)
    }

    pub fn transpose(&self) -> Matrix {
        let mut out = Matrix {
            rows: self.cols,
            cols: self.rows,
            data: vec![0.0; self.data.len()],
        };
        for r in 0..self.rows {
            for c in 0..self.cols {
                out.set(c, r, self.get(r, c));
            }
        }
        out
    }

    pub fn trace(&self) -> Result<f64> {
        self.require_square("trace")?;
        Ok((0..self.rows).map(|k| self.get(k, k)).sum())
    }

    fn require_square(&self, what: &str) -> Result<()> {
        if !self.is_square() {
            return Err(Error::evaluation(format!(
                "{} requires a square matrix, got {}x{}",
                what, self.rows, self.cols
            )));
        }
        Ok(())
    }

    /// Determinant: cofactor expansion up to 3×3, LU with partial pivoting
    /// beyond.
    pub fn determinant(&self) -> Result<f64> {
        self.require_square("determinant")?;
        Ok(match self.rows {
            1 => self.get(0, 0),
            2 => self.get(0, 0) * self.get(1, 1) - self.get(0, 1) * self.get(1, 0),
            3 => {
                let m = |r: usize, c: usize| self.get(r, c);
                m(0, 0) * (m(1, 1) * m(2, 2) - m(1, 2) * m(2, 1))
                    - m(0, 1) * (m(1, 0) * m(2, 2) - m(1, 2) * m(2, 0))
                    + m(0, 2) * (m(1, 0) * m(2, 1) - m(1, 1) * m(2, 0))
            }
            _ => self.lu_determinant(),
        })
    }

    fn lu_determinant(&self) -> f64 {
        let n = self.rows;
        let mut lu = self.data.clone();
        let mut det = 1.0;
        for pivot in 0..n {
            // Partial pivoting
            let mut best = pivot;
            for r in pivot + 1..n {
                if lu[r * n + pivot].abs() > lu[best * n + pivot].abs() {
                    best = r;
                }
            }
            if lu[best * n + pivot] == 0.0 {
                return 0.0;
            }
            if best != pivot {
                for c in 0..n {
                    lu.swap(pivot * n + c, best * n + c);
                }
                det = -det;
            }
            det *= lu[pivot * n + pivot];
            for r in pivot + 1..n {
                let factor = lu[r * n + pivot] / lu[pivot * n + pivot];
                for c in pivot..n {
                    lu[r * n + c] -= factor * lu[pivot * n + c];
                }
            }
        }
        det
    }

    /// Inverse: adjugate over determinant up to 3×3, Gauss-Jordan beyond.
    /// Fails on a singular matrix.
    pub fn inverse(&self) -> Result<Matrix> {
        self.require_square("inverse")?;
        let det = self.determinant()?;
        if det.abs() < f64::EPSILON {
            return Err(Error::evaluation("matrix is singular: determinant is zero"));
        }
        match self.rows {
            1 => Matrix::new(1, 1, vec![1.0 / det]),
            2 => Matrix::new(
                2,
                2,
                vec![
                    self.get(1, 1) / det,
                    -self.get(0, 1) / det,
                    -self.get(1, 0) / det,
                    self.get(0, 0) / det,
                ],
            ),
            3 => {
                let m = |r: usize, c: usize| self.get(r, c);
                let cof = |r1: usize, c1: usize, r2: usize, c2: usize| {
                    m(r1, c1) * m(r2, c2) - m(r1, c2) * m(r2, c1)
                };
                // Adjugate = transposed cofactor matrix
                let data = vec![
                    cof(1, 1, 2, 2) / det,
                    -cof(0, 1, 2, 2) / det,
                    cof(0, 1, 1, 2) / det,
                    -cof(1, 0, 2, 2) / det,
                    cof(0, 0, 2, 2) / det,
                    -cof(0, 0, 1, 2) / det,
                    cof(1, 0, 2, 1) / det,
                    -cof(0, 0, 2, 1) / det,
                    cof(0, 0, 1, 1) / det,
                ];
                Matrix::new(3, 3, data)
            }
            _ => self.gauss_jordan_inverse(),
        }
    }

    fn gauss_jordan_inverse(&self) -> Result<Matrix> {
        let n = self.rows;
        let mut a = self.data.clone();
        let mut inv = Matrix::identity(n).data;
        for pivot in 0..n {
            let mut best = pivot;
            for r in pivot + 1..n {
                if a[r * n + pivot].abs() > a[best * n + pivot].abs() {
                    best = r;
                }
            }
            if a[best * n + pivot].abs() < f64::EPSILON {
                return Err(Error::evaluation("matrix is singular: determinant is zero"));
            }
            if best != pivot {
                for c in 0..n {
                    a.swap(pivot * n + c, best * n + c);
                    inv.swap(pivot * n + c, best * n + c);
                }
            }
            let scale = a[pivot * n + pivot];
            for c in 0..n {
                a[pivot * n + c] /= scale;
                inv[pivot * n + c] /= scale;
            }
            for r in 0..n {
                if r == pivot {
                    continue;
                }
                let factor = a[r * n + pivot];
                if factor == 0.0 {
                    continue;
                }
                for c in 0..n {
                    a[r * n + c] -= factor * a[pivot * n + c];
                    inv[r * n + c] -= factor * inv[pivot * n + c];
                }
            }
        }
        Matrix::new(n, n, inv)
    }

    /// Integer matrix power: repeated multiplication for n ≥ 0, inverse
    /// composed n times for n < 0.
    pub fn powi(&self, n: i64) -> Result<Matrix> {
        self.require_square("matrix power")?;
        if n < 0 {
            return self.inverse()?.powi(-n);
        }
        let mut acc = Matrix::identity(self.rows);
        for _ in 0..n {
            acc = acc.mul(self)?;
        }
        Ok(acc)
    }

    pub fn approx_eq(&self, other: &Matrix, tolerance: f64) -> bool {
        self.same_shape(other)
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m2(a: f64, b: f64, c: f64, d: f64) -> Matrix {
        Matrix::new(2, 2, vec![a, b, c, d]).unwrap()
    }

    #[test]
    fn determinant_2x2() {
        assert_eq!(m2(1.0, 2.0, 3.0, 4.0).determinant().unwrap(), -2.0);
    }

    #[test]
    fn determinant_4x4_via_lu() {
        // Block-diagonal: det = det([[2,0],[0,3]]) * det([[1,1],[0,4]]) = 24
        let m = Matrix::new(
            4,
            4,
            vec![
                2.0, 0.0, 0.0, 0.0, //
                0.0, 3.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 1.0, //
                0.0, 0.0, 0.0, 4.0,
            ],
        )
        .unwrap();
        assert!((m.determinant().unwrap() - 24.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_round_trip() {
        let m = m2(4.0, 7.0, 2.0, 6.0);
        let product = m.mul(&m.inverse().unwrap()).unwrap();
        assert!(product.approx_eq(&Matrix::identity(2), EQUALITY_TOLERANCE));
    }

    #[test]
    fn singular_inverse_fails() {
        assert!(m2(1.0, 2.0, 2.0, 4.0).inverse().is_err());
    }

    #[test]
    fn transpose_is_structural() {
        let m = Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let t = m.transpose();
        assert_eq!(t.rows(), 3);
        assert_eq!(t.get(0, 1), 4.0);
    }

    #[test]
    fn negative_power_is_inverse() {
        let m = m2(2.0, 0.0, 0.0, 4.0);
        let inv = m.powi(-1).unwrap();
        assert!(inv.approx_eq(&m2(0.5, 0.0, 0.0, 0.25), EQUALITY_TOLERANCE));
    }

    #[test]
    fn shape_mismatch_errors() {
        let a = Matrix::new(2, 3, vec![0.0; 6]).unwrap();
        let b = Matrix::new(2, 2, vec![0.0; 4]).unwrap();
        assert!(a.add(&b).is_err());
        assert!(b.mul(&a).is_ok());
        assert!(a.mul(&a).is_err());
    }
}
