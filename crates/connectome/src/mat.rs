//! MATLAB Level 5 `.mat` input.
//!
//! Every numeric array becomes a [`Tensor`] with MATLAB's dimensions, its
//! values reordered from column-major to row-major. Narrow integer classes
//! are widened; complex arrays are rejected.
use crate::error::{ConnectomeError, Result};
use crate::safetensors::{SafeTensors, Tensor, TensorData};
use matfile::{MatFile, NumericData};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn read(path: &Path) -> Result<SafeTensors> {
    let file = File::open(path).map_err(|source| ConnectomeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mat = MatFile::parse(BufReader::new(file)).map_err(|e| ConnectomeError::Format {
        path: path.to_path_buf(),
        reason: format!("not a Level 5 MAT-file: {e:?}"),
    })?;

    let mut out = SafeTensors::default();
    for array in mat.arrays() {
        let tensor = to_tensor(array.name(), array.size(), array.data())?;
        out.tensors.insert(array.name().to_string(), tensor);
    }
    Ok(out)
}

fn row_major<T: Clone>(shape: &[usize], column_major: &[T]) -> Result<Vec<T>> {
    let array = ArrayD::from_shape_vec(IxDyn(shape).f(), column_major.to_vec())?;
    Ok(array.iter().cloned().collect())
}

fn widen<T: Copy + Into<U>, U: Clone>(shape: &[usize], values: &[T]) -> Result<Vec<U>> {
    let wide: Vec<U> = values.iter().map(|&v| v.into()).collect();
    row_major(shape, &wide)
}

fn to_tensor(name: &str, size: &[usize], data: &NumericData) -> Result<Tensor> {
    let bad = |reason: &str| ConnectomeError::BadTensor {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let values = match data {
        NumericData::Double { real, imag: None } => TensorData::F64(row_major(size, real)?),
        NumericData::Single { real, imag: None } => TensorData::F32(row_major(size, real)?),
        NumericData::Int64 { real, imag: None } => TensorData::I64(row_major(size, real)?),
        NumericData::Int32 { real, imag: None } => TensorData::I32(row_major(size, real)?),
        NumericData::Int16 { real, imag: None } => TensorData::I32(widen(size, real)?),
        NumericData::Int8 { real, imag: None } => TensorData::I32(widen(size, real)?),
        NumericData::UInt16 { real, imag: None } => TensorData::I32(widen(size, real)?),
        NumericData::UInt8 { real, imag: None } => TensorData::I32(widen(size, real)?),
        NumericData::UInt32 { real, imag: None } => TensorData::I64(widen(size, real)?),
        NumericData::UInt64 { real, imag: None } => {
            let signed = real
                .iter()
                .map(|&v| i64::try_from(v))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|_| bad("uint64 values do not fit in int64"))?;
            TensorData::I64(row_major(size, &signed)?)
        }
        _ => return Err(bad("complex arrays are not supported")),
    };
    Ok(Tensor::new(size.to_vec(), values))
}
