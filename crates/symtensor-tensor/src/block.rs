//! `Block`: the dense matrix stored for one charge sector of a `SymTensor`.
//!
//! A block is row-major and tagged with a [`ScalarKind`] exactly like the
//! teacher crate's `Storage::DenseF64`/`Storage::DenseC64` split (see
//! `tensor4all-linalg::svd::unfold_split`), rather than being generic over
//! the scalar type: `SymTensor::scalar_kind` is decided once at tensor
//! creation and every block must agree with it, so `ScalarKindMismatch`
//! can be raised at the point contraction/assignment mixes the two.

use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use symtensor_core::{Result, SymTensorError};
use symtensor_linalg::DenseKernel;

/// Which scalar type a tensor (and every one of its blocks) is stored as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Real,
    Complex,
}

/// A dense, row-major matrix for one charge sector.
///
/// `diag` marks a block that is logically diagonal: `data` then holds only
/// the `min(rows, cols)` diagonal entries, and every operation below treats
/// the off-diagonal as implicit zero. This mirrors uni10's diagonal-block
/// fast path for operators like identity and singular-value blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Real {
        rows: usize,
        cols: usize,
        diag: bool,
        data: Vec<f64>,
    },
    Complex {
        rows: usize,
        cols: usize,
        diag: bool,
        data: Vec<Complex64>,
    },
}

impl Block {
    pub fn zeros(kind: ScalarKind, rows: usize, cols: usize) -> Self {
        match kind {
            ScalarKind::Real => Block::Real {
                rows,
                cols,
                diag: false,
                data: vec![0.0; rows * cols],
            },
            ScalarKind::Complex => Block::Complex {
                rows,
                cols,
                diag: false,
                data: vec![Complex64::new(0.0, 0.0); rows * cols],
            },
        }
    }

    /// A diagonal block with `1` (or `1+0i`) on every diagonal entry.
    pub fn identity(kind: ScalarKind, rows: usize, cols: usize) -> Self {
        let n = rows.min(cols);
        match kind {
            ScalarKind::Real => Block::Real {
                rows,
                cols,
                diag: true,
                data: vec![1.0; n],
            },
            ScalarKind::Complex => Block::Complex {
                rows,
                cols,
                diag: true,
                data: vec![Complex64::new(1.0, 0.0); n],
            },
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            Block::Real { .. } => ScalarKind::Real,
            Block::Complex { .. } => ScalarKind::Complex,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        match *self {
            Block::Real { rows, cols, .. } => (rows, cols),
            Block::Complex { rows, cols, .. } => (rows, cols),
        }
    }

    pub fn is_diag(&self) -> bool {
        match self {
            Block::Real { diag, .. } => *diag,
            Block::Complex { diag, .. } => *diag,
        }
    }

    /// Expands a diagonal block into a full dense block of the same shape.
    /// A no-op (clone) for blocks that are already dense.
    pub fn densify(&self) -> Self {
        if !self.is_diag() {
            return self.clone();
        }
        match self {
            Block::Real { rows, cols, data, .. } => {
                let mut full = vec![0.0; rows * cols];
                for (i, v) in data.iter().enumerate() {
                    full[i * cols + i] = *v;
                }
                Block::Real {
                    rows: *rows,
                    cols: *cols,
                    diag: false,
                    data: full,
                }
            }
            Block::Complex { rows, cols, data, .. } => {
                let mut full = vec![Complex64::new(0.0, 0.0); rows * cols];
                for (i, v) in data.iter().enumerate() {
                    full[i * cols + i] = *v;
                }
                Block::Complex {
                    rows: *rows,
                    cols: *cols,
                    diag: false,
                    data: full,
                }
            }
        }
    }

    /// Reads element `(i, j)`, returned widened to `Complex64` regardless
    /// of storage kind so callers such as `setRawElem`'s symmetry check can
    /// stay scalar-kind agnostic.
    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        match self {
            Block::Real { cols, diag, data, .. } => {
                if *diag {
                    if i == j { Complex64::new(data[i], 0.0) } else { Complex64::new(0.0, 0.0) }
                } else {
                    Complex64::new(data[i * cols + j], 0.0)
                }
            }
            Block::Complex { cols, diag, data, .. } => {
                if *diag {
                    if i == j { data[i] } else { Complex64::new(0.0, 0.0) }
                } else {
                    data[i * cols + j]
                }
            }
        }
    }

    pub fn set(&mut self, i: usize, j: usize, value: Complex64) -> Result<()> {
        if self.is_diag() && i != j {
            return Err(SymTensorError::SymmetryViolation {
                label: vec![i as i32, j as i32],
                magnitude: value.norm(),
            });
        }
        match self {
            Block::Real { cols, diag, data, .. } => {
                let idx = if *diag { i } else { i * *cols + j };
                data[idx] = value.re;
            }
            Block::Complex { cols, diag, data, .. } => {
                let idx = if *diag { i } else { i * *cols + j };
                data[idx] = value;
            }
        }
        Ok(())
    }

    pub fn fill_zero(&mut self) {
        match self {
            Block::Real { data, .. } => data.iter_mut().for_each(|v| *v = 0.0),
            Block::Complex { data, .. } => {
                data.iter_mut().for_each(|v| *v = Complex64::new(0.0, 0.0))
            }
        }
    }

    /// Fills with values drawn uniformly from `[0, 1)` (real and imaginary
    /// parts independently for complex blocks), seeded for reproducible
    /// tests via `rand`'s `StdRng`.
    pub fn fill_random(&mut self, seed: u64) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        match self {
            Block::Real { data, .. } => data.iter_mut().for_each(|v| *v = rng.gen::<f64>()),
            Block::Complex { data, .. } => data
                .iter_mut()
                .for_each(|v| *v = Complex64::new(rng.gen::<f64>(), rng.gen::<f64>())),
        }
    }

    /// Fills with a random matrix whose rows (or columns) are orthonormal,
    /// via QR of a `[0, 1)`-uniform draw: `orthonormal_rows` selects which
    /// side gets the orthonormal basis (the other is the thin-QR's `R`
    /// contraction dimension, so it must be at least as large as the side
    /// requested to be orthonormal).
    pub fn fill_random_orthonormal(&mut self, seed: u64, orthonormal_rows: bool) -> Result<()> {
        let (rows, cols) = self.shape();
        if orthonormal_rows && cols < rows {
            return Err(SymTensorError::ShapeMismatch { expected: (rows, rows), actual: (rows, cols) });
        }
        if !orthonormal_rows && rows < cols {
            return Err(SymTensorError::ShapeMismatch { expected: (cols, cols), actual: (rows, cols) });
        }
        self.fill_random(seed);
        let q = if orthonormal_rows {
            self.transpose().qr()?.0.transpose()
        } else {
            self.qr()?.0
        };
        *self = q;
        Ok(())
    }

    /// Thin QR (`A = Q * R`, `k = min(rows, cols)`) delegated to
    /// `symtensor_linalg`'s scalar-agnostic `DenseKernel` seam.
    pub fn qr(&self) -> Result<(Block, Block)> {
        let (rows, cols) = self.shape();
        let dense = self.densify();
        match dense {
            Block::Real { data, .. } => {
                let qr = f64::qr(rows, cols, &data).map_err(|e| SymTensorError::LinalgFailure(e.to_string()))?;
                Ok((
                    Block::Real { rows, cols: qr.k, diag: false, data: qr.q },
                    Block::Real { rows: qr.k, cols, diag: false, data: qr.r },
                ))
            }
            Block::Complex { data, .. } => {
                let qr = Complex64::qr(rows, cols, &data).map_err(|e| SymTensorError::LinalgFailure(e.to_string()))?;
                Ok((
                    Block::Complex { rows, cols: qr.k, diag: false, data: qr.q },
                    Block::Complex { rows: qr.k, cols, diag: false, data: qr.r },
                ))
            }
        }
    }

    /// Complex-conjugates every element in place; a no-op for real blocks.
    pub fn conjugate(&self) -> Block {
        match self {
            Block::Real { .. } => self.clone(),
            Block::Complex { rows, cols, diag, data } => Block::Complex {
                rows: *rows,
                cols: *cols,
                diag: *diag,
                data: data.iter().map(|v| v.conj()).collect(),
            },
        }
    }

    pub fn scale(&mut self, factor: f64) {
        match self {
            Block::Real { data, .. } => data.iter_mut().for_each(|v| *v *= factor),
            Block::Complex { data, .. } => data.iter_mut().for_each(|v| *v *= factor),
        }
    }

    pub fn add_assign(&mut self, other: &Block) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(SymTensorError::ShapeMismatch {
                expected: self.shape(),
                actual: other.shape(),
            });
        }
        let lhs = std::mem::replace(self, Block::zeros(self.kind(), 0, 0));
        let lhs = lhs.densify();
        let rhs = other.densify();
        *self = match (lhs, rhs) {
            (Block::Real { rows, cols, data: mut a, .. }, Block::Real { data: b, .. }) => {
                a.iter_mut().zip(b.iter()).for_each(|(x, y)| *x += y);
                Block::Real { rows, cols, diag: false, data: a }
            }
            (lhs, rhs) => {
                let (rows, cols) = lhs.shape();
                let a = to_complex_data(&lhs);
                let b = to_complex_data(&rhs);
                let data = a.iter().zip(b.iter()).map(|(x, y)| x + y).collect();
                Block::Complex { rows, cols, diag: false, data }
            }
        };
        Ok(())
    }

    /// Dense matrix multiply `self * other`, widening to complex if either
    /// operand is complex. Diagonal operands are treated as implicitly
    /// dense without materializing the zero fill in the hot loop.
    pub fn matmul(&self, other: &Block) -> Result<Block> {
        let (m, k) = self.shape();
        let (k2, n) = other.shape();
        if k != k2 {
            return Err(SymTensorError::ShapeMismatch {
                expected: (k, n),
                actual: (k2, n),
            });
        }
        if self.kind() == ScalarKind::Real && other.kind() == ScalarKind::Real {
            let a = self.densify();
            let b = other.densify();
            let (Block::Real { data: a, .. }, Block::Real { data: b, .. }) = (a, b) else {
                unreachable!()
            };
            let mut out = vec![0.0; m * n];
            for i in 0..m {
                for p in 0..k {
                    let aip = a[i * k + p];
                    if aip == 0.0 {
                        continue;
                    }
                    for j in 0..n {
                        out[i * n + j] += aip * b[p * n + j];
                    }
                }
            }
            Ok(Block::Real { rows: m, cols: n, diag: false, data: out })
        } else {
            let a = to_complex_data(&self.densify());
            let b = to_complex_data(&other.densify());
            let mut out = vec![Complex64::new(0.0, 0.0); m * n];
            for i in 0..m {
                for p in 0..k {
                    let aip = a[i * k + p];
                    if aip == Complex64::new(0.0, 0.0) {
                        continue;
                    }
                    for j in 0..n {
                        out[i * n + j] += aip * b[p * n + j];
                    }
                }
            }
            Ok(Block::Complex { rows: m, cols: n, diag: false, data: out })
        }
    }

    /// Sum of diagonal elements (undefined/zero-padded for non-square
    /// blocks beyond `min(rows, cols)`, matching a rectangular partial
    /// trace).
    pub fn trace(&self) -> Complex64 {
        let (rows, cols) = self.shape();
        let n = rows.min(cols);
        (0..n).map(|i| self.get(i, i)).sum()
    }

    /// Frobenius norm.
    pub fn norm(&self) -> f64 {
        match self {
            Block::Real { diag, data, .. } => {
                let sumsq: f64 = data.iter().map(|v| v * v).sum();
                let _ = diag;
                sumsq.sqrt()
            }
            Block::Complex { diag, data, .. } => {
                let sumsq: f64 = data.iter().map(|v| v.norm_sqr()).sum();
                let _ = diag;
                sumsq.sqrt()
            }
        }
    }

    /// Largest-magnitude element.
    pub fn absmax(&self) -> f64 {
        match self {
            Block::Real { data, .. } => data.iter().fold(0.0_f64, |m, v| m.max(v.abs())),
            Block::Complex { data, .. } => data.iter().fold(0.0_f64, |m, v| m.max(v.norm())),
        }
    }

    pub fn transpose(&self) -> Block {
        let (rows, cols) = self.shape();
        if self.is_diag() {
            let mut out = self.clone();
            if let Block::Real { rows: r, cols: c, .. } | Block::Complex { rows: r, cols: c, .. } = &mut out {
                std::mem::swap(r, c);
            }
            return out;
        }
        match self {
            Block::Real { data, .. } => {
                let mut out = vec![0.0; rows * cols];
                for i in 0..rows {
                    for j in 0..cols {
                        out[j * rows + i] = data[i * cols + j];
                    }
                }
                Block::Real { rows: cols, cols: rows, diag: false, data: out }
            }
            Block::Complex { data, .. } => {
                let mut out = vec![Complex64::new(0.0, 0.0); rows * cols];
                for i in 0..rows {
                    for j in 0..cols {
                        out[j * rows + i] = data[i * cols + j];
                    }
                }
                Block::Complex { rows: cols, cols: rows, diag: false, data: out }
            }
        }
    }
}

fn to_complex_data(block: &Block) -> Vec<Complex64> {
    match block {
        Block::Real { data, .. } => data.iter().map(|v| Complex64::new(*v, 0.0)).collect(),
        Block::Complex { data, .. } => data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_block_acts_as_matmul_identity() {
        let mut a = Block::zeros(ScalarKind::Real, 2, 2);
        a.set(0, 0, Complex64::new(1.0, 0.0)).unwrap();
        a.set(0, 1, Complex64::new(2.0, 0.0)).unwrap();
        a.set(1, 0, Complex64::new(3.0, 0.0)).unwrap();
        a.set(1, 1, Complex64::new(4.0, 0.0)).unwrap();
        let id = Block::identity(ScalarKind::Real, 2, 2);
        let product = a.matmul(&id).unwrap();
        assert_eq!(product.get(0, 0).re, 1.0);
        assert_eq!(product.get(1, 1).re, 4.0);
    }

    #[test]
    fn setting_offdiagonal_on_diag_block_is_symmetry_violation() {
        let mut d = Block::identity(ScalarKind::Real, 2, 2);
        let err = d.set(0, 1, Complex64::new(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, SymTensorError::SymmetryViolation { .. }));
    }

    #[test]
    fn trace_sums_diagonal() {
        let d = Block::identity(ScalarKind::Real, 3, 3);
        assert_eq!(d.trace().re, 3.0);
    }

    #[test]
    fn norm_matches_frobenius_definition() {
        let mut a = Block::zeros(ScalarKind::Real, 1, 2);
        a.set(0, 0, Complex64::new(3.0, 0.0)).unwrap();
        a.set(0, 1, Complex64::new(4.0, 0.0)).unwrap();
        assert_eq!(a.norm(), 5.0);
    }

    #[test]
    fn fill_random_samples_within_unit_interval() {
        let mut a = Block::zeros(ScalarKind::Real, 3, 3);
        a.fill_random(42);
        if let Block::Real { data, .. } = &a {
            assert!(data.iter().all(|v| (0.0..1.0).contains(v)));
        }
    }

    #[test]
    fn fill_random_orthonormal_columns_are_orthonormal() {
        let mut a = Block::zeros(ScalarKind::Real, 4, 2);
        a.fill_random_orthonormal(7, false).unwrap();
        let gram = a.transpose().matmul(&a).unwrap();
        assert!((gram.get(0, 0).re - 1.0).abs() < 1e-8);
        assert!((gram.get(1, 1).re - 1.0).abs() < 1e-8);
        assert!(gram.get(0, 1).re.abs() < 1e-8);
    }

    #[test]
    fn conjugate_negates_imaginary_part() {
        let mut a = Block::zeros(ScalarKind::Complex, 1, 1);
        a.set(0, 0, Complex64::new(1.0, 2.0)).unwrap();
        let conj = a.conjugate();
        assert_eq!(conj.get(0, 0), Complex64::new(1.0, -2.0));
    }

    #[test]
    fn transpose_swaps_shape_and_entries() {
        let mut a = Block::zeros(ScalarKind::Real, 1, 2);
        a.set(0, 0, Complex64::new(1.0, 0.0)).unwrap();
        a.set(0, 1, Complex64::new(2.0, 0.0)).unwrap();
        let t = a.transpose();
        assert_eq!(t.shape(), (2, 1));
        assert_eq!(t.get(1, 0).re, 2.0);
    }
}
