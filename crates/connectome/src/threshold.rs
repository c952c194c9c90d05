//! Proportional (density) thresholding of connectivity matrices.
//!
//! Keeps the strongest fraction `p` of connections, after the Brain
//! Connectivity Toolbox `threshold_proportional`:
//!
//! ```text
//!   W[i,i] = 0
//!   symmetric?  keep upper triangle, ud = 2     else ud = 1
//!   candidates = non-zero entries, row-major, stably sorted by |w| desc
//!   keep       = round_half_even((n² − n) · p / ud)
//!   W_thr      = top `keep` candidates (+ transpose when symmetric)
//! ```
use crate::error::{ConnectomeError, Result};
use ndarray::{Array2, ArrayView2, Zip};

/// Absolute tolerance of the symmetry check.
pub const SYMMETRY_ATOL: f64 = 1e-10;

/// Relative tolerance of the symmetry check.
pub const SYMMETRY_RTOL: f64 = 1e-5;

/// `|a − b| ≤ atol + rtol · |b|` element-wise; NaN never compares close.
pub fn allclose(a: ArrayView2<f64>, b: ArrayView2<f64>, rtol: f64, atol: f64) -> bool {
    a.dim() == b.dim()
        && Zip::from(&a)
            .and(&b)
            .all(|&x, &y| (x - y).abs() <= atol + rtol * y.abs())
}

/// Whether `w` equals its transpose within the symmetry tolerances.
pub fn is_symmetric(w: ArrayView2<f64>) -> bool {
    allclose(w, w.t(), SYMMETRY_RTOL, SYMMETRY_ATOL)
}

/// Number of entries kept for an `n × n` matrix at proportion `p`.
pub fn edges_to_keep(n: usize, p: f64, symmetric: bool) -> usize {
    let ud = if symmetric { 2.0 } else { 1.0 };
    let total = (n * n - n) as f64;
    (total * p / ud).round_ties_even().max(0.0) as usize
}

/// Retain the top `p` proportion of weights (by absolute value) of `w`.
///
/// Self-connections are always removed. Ties keep row-major order. NaN
/// weights rank below every finite weight.
pub fn threshold_proportional(w: ArrayView2<f64>, p: f64) -> Result<Array2<f64>> {
    let (rows, cols) = w.dim();
    if rows != cols {
        return Err(ConnectomeError::NotSquare { rows, cols });
    }
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ConnectomeError::InvalidProportion(p));
    }
    let n = rows;

    let mut w = w.to_owned();
    w.diag_mut().fill(0.0);

    let symmetric = is_symmetric(w.view());
    if symmetric {
        for ((i, j), v) in w.indexed_iter_mut() {
            if j < i {
                *v = 0.0;
            }
        }
    }

    let mut candidates: Vec<(usize, usize, f64)> = w
        .indexed_iter()
        .filter(|(_, &v)| v != 0.0)
        .map(|((i, j), &v)| (i, j, v))
        .collect();

    let strength = |v: f64| if v.is_nan() { f64::NEG_INFINITY } else { v.abs() };
    candidates.sort_by(|a, b| strength(b.2).total_cmp(&strength(a.2)));

    let keep = edges_to_keep(n, p, symmetric);
    let mut out = Array2::<f64>::zeros((n, n));
    for &(i, j, v) in candidates.iter().take(keep) {
        out[[i, j]] = v;
    }

    if symmetric {
        out = &out + &out.t();
    }
    Ok(out)
}
