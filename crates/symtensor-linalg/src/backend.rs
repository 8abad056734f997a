//! Thin wrappers around the `mdarray-linalg` Faer backend, operating on
//! flat row-major buffers so callers never need to depend on `mdarray`
//! types directly.

use mdarray::{tensor, Dense, Slice};
use mdarray_linalg::qr::{QRDecomp, QR};
use mdarray_linalg::svd::{SVDDecomp, SVDError, SVD};
use mdarray_linalg_faer::Faer;
use num_complex::Complex64;

pub(crate) struct RawSvd<T> {
    pub u: Vec<T>,
    pub s: Vec<f64>,
    pub vt: Vec<T>,
}

pub(crate) fn svd_f64(rows: usize, cols: usize, data: &[f64]) -> Result<RawSvd<f64>, SVDError> {
    let mut a = build_f64(rows, cols, data);
    let backend = Faer;
    let a_slice: &mut Slice<f64, (usize, usize), Dense> = a.as_mut();
    let SVDDecomp { s, u, vt } = backend.svd(a_slice)?;
    let k = rows.min(cols);
    let s_vec = (0..k).map(|i| s[[0, i]]).collect();
    let u_vec = flatten(&u, rows, rows, k);
    let vt_vec = flatten(&vt, cols, cols, cols).into_iter().take(k * cols).collect();
    Ok(RawSvd { u: u_vec, s: s_vec, vt: vt_vec })
}

pub(crate) fn svd_c64(rows: usize, cols: usize, data: &[Complex64]) -> Result<RawSvd<Complex64>, SVDError> {
    let mut a = build_c64(rows, cols, data);
    let backend = Faer;
    let a_slice: &mut Slice<Complex64, (usize, usize), Dense> = a.as_mut();
    let SVDDecomp { s, u, vt } = backend.svd(a_slice)?;
    let k = rows.min(cols);
    let s_vec = (0..k).map(|i| s[[0, i]].re).collect();
    let u_vec = flatten(&u, rows, rows, k);
    let vt_vec = flatten(&vt, cols, cols, cols).into_iter().take(k * cols).collect();
    Ok(RawSvd { u: u_vec, s: s_vec, vt: vt_vec })
}

pub(crate) struct RawQr<T> {
    pub q: Vec<T>,
    pub r: Vec<T>,
}

pub(crate) fn qr_f64(rows: usize, cols: usize, data: &[f64]) -> Result<RawQr<f64>, anyhow::Error> {
    let mut a = build_f64(rows, cols, data);
    let backend = Faer;
    let a_slice: &mut Slice<f64, (usize, usize), Dense> = a.as_mut();
    let QRDecomp { q, r } = backend
        .qr(a_slice)
        .map_err(|e| anyhow::anyhow!("qr backend failure: {e:?}"))?;
    let k = rows.min(cols);
    let q_vec = flatten(&q, rows, rows, k);
    let r_vec = flatten(&r, rows, cols, cols).into_iter().take(k * cols).collect();
    Ok(RawQr { q: q_vec, r: r_vec })
}

pub(crate) fn qr_c64(rows: usize, cols: usize, data: &[Complex64]) -> Result<RawQr<Complex64>, anyhow::Error> {
    let mut a = build_c64(rows, cols, data);
    let backend = Faer;
    let a_slice: &mut Slice<Complex64, (usize, usize), Dense> = a.as_mut();
    let QRDecomp { q, r } = backend
        .qr(a_slice)
        .map_err(|e| anyhow::anyhow!("qr backend failure: {e:?}"))?;
    let k = rows.min(cols);
    let q_vec = flatten(&q, rows, rows, k);
    let r_vec = flatten(&r, rows, cols, cols).into_iter().take(k * cols).collect();
    Ok(RawQr { q: q_vec, r: r_vec })
}

fn build_f64(rows: usize, cols: usize, data: &[f64]) -> mdarray::DTensor<f64, 2> {
    let mut a = tensor![[0.0; cols]; rows];
    for i in 0..rows {
        for j in 0..cols {
            a[[i, j]] = data[i * cols + j];
        }
    }
    a
}

fn build_c64(rows: usize, cols: usize, data: &[Complex64]) -> mdarray::DTensor<Complex64, 2> {
    let mut a = tensor![[Complex64::new(0.0, 0.0); cols]; rows];
    for i in 0..rows {
        for j in 0..cols {
            a[[i, j]] = data[i * cols + j];
        }
    }
    a
}

/// Flattens a backend `full_rows`×`full_cols` matrix's first `keep_cols`
/// columns into a row-major `full_rows * keep_cols` buffer.
fn flatten<T: Copy>(m: &mdarray::DTensor<T, 2>, full_rows: usize, full_cols: usize, keep_cols: usize) -> Vec<T> {
    let _ = full_cols;
    let mut out = Vec::with_capacity(full_rows * keep_cols);
    for i in 0..full_rows {
        for j in 0..keep_cols {
            out.push(m[[i, j]]);
        }
    }
    out
}
