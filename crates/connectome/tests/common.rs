//! Shared fixtures for the converter tests.
use gnnlaunch_connectome::safetensors::StWriter;
use ndarray::{Array2, Array3};
use std::path::{Path, PathBuf};

/// Symmetric `n × n` matrix with unit diagonal and distinct off-diagonal
/// weights `seed + (a·n + b) / 1000` for `a = min(i, j)`, `b = max(i, j)`.
pub fn symmetric(n: usize, seed: f64) -> Array2<f64> {
    Array2::from_shape_fn((n, n), |(i, j)| {
        if i == j {
            1.0
        } else {
            let (a, b) = if i < j { (i, j) } else { (j, i) };
            seed + (a * n + b) as f64 / 1000.0
        }
    })
}

/// Stack matrices on the last axis → `[N, N, G]`.
pub fn stack(mats: &[Array2<f64>]) -> Array3<f64> {
    let n = mats[0].nrows();
    Array3::from_shape_fn((n, n, mats.len()), |(i, j, k)| mats[k][[i, j]])
}

#[allow(unused)]
pub fn write_stack(dir: &Path, name: &str, stack: &Array3<f64>) -> PathBuf {
    let (n, m, g) = stack.dim();
    let path = dir.join(format!("{name}.safetensors"));
    StWriter::new()
        .add_f64(name, stack.iter().copied().collect(), &[n, m, g])
        .write(&path)
        .unwrap();
    path
}

#[allow(unused)]
pub fn write_labels(dir: &Path, rows: &[[f64; 2]]) -> PathBuf {
    let path = dir.join("labels.safetensors");
    StWriter::new()
        .add_f64("labels", rows.iter().flatten().copied().collect(), &[rows.len(), 2])
        .write(&path)
        .unwrap();
    path
}

#[allow(unused)]
fn mat_element(data_type: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(data_type.to_le_bytes());
    out.extend((payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.resize(out.len().next_multiple_of(8), 0);
    out
}

/// Uncompressed little-endian Level 5 MAT-file with one `double` array.
/// `values` are in MATLAB (column-major) order.
#[allow(unused)]
pub fn write_mat(path: &Path, name: &str, dims: &[usize], values: &[f64]) {
    const MI_INT8: u32 = 1;
    const MI_INT32: u32 = 5;
    const MI_UINT32: u32 = 6;
    const MI_DOUBLE: u32 = 9;
    const MI_MATRIX: u32 = 14;
    const MX_DOUBLE_CLASS: u32 = 6;

    let flags: Vec<u8> = [MX_DOUBLE_CLASS, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
    let dims: Vec<u8> = dims.iter().flat_map(|&d| (d as i32).to_le_bytes()).collect();
    let real: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    let mut matrix = mat_element(MI_UINT32, &flags);
    matrix.extend(mat_element(MI_INT32, &dims));
    matrix.extend(mat_element(MI_INT8, name.as_bytes()));
    matrix.extend(mat_element(MI_DOUBLE, &real));

    let mut bytes = b"MATLAB 5.0 MAT-file, created by the connectome tests".to_vec();
    bytes.resize(116, b' ');
    bytes.extend([0u8; 8]);
    bytes.extend(0x0100u16.to_le_bytes());
    bytes.extend(b"IM");
    bytes.extend(mat_element(MI_MATRIX, &matrix));
    std::fs::write(path, bytes).unwrap();
}

/// MATLAB storage order of a stack: first index fastest.
#[allow(unused)]
pub fn column_major(stack: &Array3<f64>) -> Vec<f64> {
    stack.t().iter().copied().collect()
}
