//! Loading connectivity matrices and label tables from MATLAB `.mat` or
//! safetensors files.
use crate::error::{ConnectomeError, Result};
use crate::mat;
use crate::safetensors::{SafeTensors, Tensor};
use ndarray::{concatenate, Array3, ArrayView3, Axis};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Every tensor in `path`; `.mat` files are read as MATLAB Level 5, anything
/// else as safetensors.
pub fn read_tensors(path: &Path) -> Result<SafeTensors> {
    let is_mat = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mat"));
    if is_mat {
        mat::read(path)
    } else {
        SafeTensors::read(path)
    }
}

// MATLAB drops a trailing singleton axis, so `[N, N]` is one graph
fn as_stack(name: &str, tensor: &Tensor) -> Result<Array3<f64>> {
    let (n, m, g) = match tensor.shape[..] {
        [n, m, g] => (n, m, g),
        [n, m] => (n, m, 1),
        _ => {
            return Err(ConnectomeError::BadTensor {
                name: name.to_string(),
                reason: format!("expected [N, N, G], got {:?}", tensor.shape),
            })
        }
    };
    if n != m {
        return Err(ConnectomeError::NotSquare { rows: n, cols: m });
    }
    Ok(Array3::from_shape_vec((n, m, g), tensor.to_f64())?)
}

/// Read `[N, N, G]` stacks from every file and join them on the graph axis.
///
/// `key` names the tensor inside each file; without it the file stem (or
/// the file's only tensor) is used.
pub fn load_matrices(paths: &[PathBuf], key: Option<&str>) -> Result<Array3<f64>> {
    let mut stacks = Vec::with_capacity(paths.len());
    for path in paths {
        let st = read_tensors(path)?;
        let (name, tensor) = st.select(key, path)?;
        let stack = as_stack(name, tensor)?;
        debug!(path = %path.display(), tensor = name, shape = ?stack.dim(), "Loaded matrices");

        if let Some(first) = stacks.first().map(|s: &Array3<f64>| s.dim().0) {
            if first != stack.dim().0 {
                return Err(ConnectomeError::NodeCountMismatch {
                    first,
                    other: stack.dim().0,
                });
            }
        }
        stacks.push(stack);
    }

    if stacks.is_empty() {
        return Err(ConnectomeError::NoGraphs);
    }
    let views: Vec<ArrayView3<f64>> = stacks.iter().map(|s| s.view()).collect();
    let all = concatenate(Axis(2), &views)?;
    info!(files = paths.len(), shape = ?all.dim(), "Matrices concatenated");
    Ok(all)
}

/// One label column from a `[S]` or `[S, C]` tensor.
pub fn label_column(name: &str, tensor: &Tensor, index: usize) -> Result<Vec<f64>> {
    let values = tensor.to_f64();
    let out_of_range = |cols: usize| ConnectomeError::BadTensor {
        name: name.to_string(),
        reason: format!("label index {index} out of range for {cols} column(s)"),
    };
    match tensor.shape[..] {
        [_] if index == 0 => Ok(values),
        [_] => Err(out_of_range(1)),
        [_, cols] if index < cols => Ok(values.chunks(cols).map(|row| row[index]).collect()),
        [_, cols] => Err(out_of_range(cols)),
        _ => Err(ConnectomeError::BadTensor {
            name: name.to_string(),
            reason: format!("expected [S] or [S, C], got {:?}", tensor.shape),
        }),
    }
}

/// Read the label column `index` from `path`.
pub fn load_labels(path: &Path, key: Option<&str>, index: usize) -> Result<Vec<f64>> {
    let st = read_tensors(path)?;
    let (name, tensor) = st.select(key, path)?;
    label_column(name, tensor, index)
}
