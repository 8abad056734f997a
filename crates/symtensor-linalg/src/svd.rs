//! Dense SVD of one row-major matrix, `A = U * diag(S) * Vt` with `k =
//! min(rows, cols)`.
//!
//! Grounded on `tensor4all-linalg::svd` for the Faer call and the
//! "singular values live in the backend's first row" caveat. Unlike the
//! teacher, this crate hands back `Vt` rather than `V`: `SymTensor::hosvd`
//! stores the result directly as a row/column-block tensor, and `Vt` (`k`
//! rows, one per singular value) is exactly the shape that block needs, so
//! the extra transpose-and-conjugate the teacher does to present `V`
//! instead would just be undone by the caller.

use num_complex::Complex64;
use thiserror::Error;

use crate::backend;

#[derive(Debug, Error)]
pub enum SvdError {
    #[error("SVD backend failure: {0}")]
    BackendError(#[from] mdarray_linalg::svd::SVDError),
    #[error("matrix has zero rows or columns")]
    EmptyMatrix,
}

/// `u` is `rows x k` row-major, `s` has length `k`, `vt` is `k x cols`
/// row-major (so `A ≈ u * diag(s) * vt`).
pub struct Svd<T> {
    pub u: Vec<T>,
    pub s: Vec<f64>,
    pub vt: Vec<T>,
    pub k: usize,
}

pub fn svd_f64(rows: usize, cols: usize, data: &[f64]) -> Result<Svd<f64>, SvdError> {
    if rows == 0 || cols == 0 {
        return Err(SvdError::EmptyMatrix);
    }
    let raw = backend::svd_f64(rows, cols, data)?;
    Ok(Svd { u: raw.u, s: raw.s, vt: raw.vt, k: rows.min(cols) })
}

pub fn svd_c64(rows: usize, cols: usize, data: &[Complex64]) -> Result<Svd<Complex64>, SvdError> {
    if rows == 0 || cols == 0 {
        return Err(SvdError::EmptyMatrix);
    }
    let raw = backend::svd_c64(rows, cols, data)?;
    Ok(Svd { u: raw.u, s: raw.s, vt: raw.vt, k: rows.min(cols) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn svd_of_identity_is_identity() {
        let data = vec![1.0, 0.0, 0.0, 1.0];
        let result = svd_f64(2, 2, &data).unwrap();
        assert_eq!(result.k, 2);
        assert!((result.s[0] - 1.0).abs() < 1e-9);
        assert!((result.s[1] - 1.0).abs() < 1e-9);
    }
}
