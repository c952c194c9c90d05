//! Adjacency matrix → COO edge list.
use ndarray::{Array2, ArrayView2};

/// All `(i, j)` with `adj[i, j] > 0` and `i ≠ j`, row-major, as a `[2, E]`
/// array (row 0 = sources, row 1 = targets).
pub fn edge_index(adj: ArrayView2<f64>) -> Array2<i64> {
    let (src, dst): (Vec<i64>, Vec<i64>) = adj
        .indexed_iter()
        .filter(|&((i, j), &w)| i != j && w > 0.0)
        .map(|((i, j), _)| (i as i64, j as i64))
        .unzip();

    let e = src.len();
    let mut out = Array2::<i64>::zeros((2, e));
    for (k, (s, d)) in src.into_iter().zip(dst).enumerate() {
        out[[0, k]] = s;
        out[[1, k]] = d;
    }
    out
}
