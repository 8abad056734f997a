//! Dense thin QR of one row-major matrix, `A = Q * R` with `k = min(rows,
//! cols)`, `Q` orthogonal/unitary `rows x k`, `R` upper-trapezoidal `k x
//! cols`.
//!
//! Grounded on `tensor4all-linalg::qr`: same thin-QR extraction from the
//! backend's full decomposition (`extract_thin_qr`), restated over flat
//! buffers instead of `TensorDynLen`.

use num_complex::Complex64;
use thiserror::Error;

use crate::backend;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("QR computation failed: {0}")]
    ComputationError(#[from] anyhow::Error),
    #[error("matrix has zero rows or columns")]
    EmptyMatrix,
}

pub struct Qr<T> {
    pub q: Vec<T>,
    pub r: Vec<T>,
    pub k: usize,
}

pub fn qr_f64(rows: usize, cols: usize, data: &[f64]) -> Result<Qr<f64>, QrError> {
    if rows == 0 || cols == 0 {
        return Err(QrError::EmptyMatrix);
    }
    let raw = backend::qr_f64(rows, cols, data)?;
    Ok(Qr { q: raw.q, r: raw.r, k: rows.min(cols) })
}

pub fn qr_c64(rows: usize, cols: usize, data: &[Complex64]) -> Result<Qr<Complex64>, QrError> {
    if rows == 0 || cols == 0 {
        return Err(QrError::EmptyMatrix);
    }
    let raw = backend::qr_c64(rows, cols, data)?;
    Ok(Qr { q: raw.q, r: raw.r, k: rows.min(cols) })
}
