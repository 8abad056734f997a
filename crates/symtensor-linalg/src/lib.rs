//! Dense QR and SVD kernels over flat row-major buffers, backed by
//! `mdarray-linalg`'s Faer implementation. Kept scalar/shape-agnostic
//! (`symtensor-tensor` supplies the `Block`/charge bookkeeping) so this
//! crate has no dependency on the tensor type it serves.

mod backend;
pub mod qr;
pub mod svd;

use num_complex::Complex64;

pub use qr::{qr_c64, qr_f64, Qr, QrError};
pub use svd::{svd_c64, svd_f64, Svd, SvdError};

/// `thiserror`-derived unified error covering either kernel, used at the
/// `symtensor-tensor` call sites that can hit either one.
#[derive(Debug, thiserror::Error)]
pub enum LinalgError {
    #[error(transparent)]
    Svd(#[from] SvdError),
    #[error(transparent)]
    Qr(#[from] QrError),
}

/// Scalar-agnostic seam onto the QR/SVD kernels, so a caller holding either
/// an `f64` or `Complex64` dense buffer (`symtensor-tensor::Block` densifies
/// to one or the other) can reach the right backend call without matching
/// on the scalar kind itself.
pub trait DenseKernel: Sized + Clone {
    fn qr(rows: usize, cols: usize, data: &[Self]) -> Result<Qr<Self>, QrError>;
    fn svd(rows: usize, cols: usize, data: &[Self]) -> Result<Svd<Self>, SvdError>;
}

impl DenseKernel for f64 {
    fn qr(rows: usize, cols: usize, data: &[f64]) -> Result<Qr<f64>, QrError> {
        qr_f64(rows, cols, data)
    }

    fn svd(rows: usize, cols: usize, data: &[f64]) -> Result<Svd<f64>, SvdError> {
        svd_f64(rows, cols, data)
    }
}

impl DenseKernel for Complex64 {
    fn qr(rows: usize, cols: usize, data: &[Complex64]) -> Result<Qr<Complex64>, QrError> {
        qr_c64(rows, cols, data)
    }

    fn svd(rows: usize, cols: usize, data: &[Complex64]) -> Result<Svd<Complex64>, SvdError> {
        svd_c64(rows, cols, data)
    }
}
