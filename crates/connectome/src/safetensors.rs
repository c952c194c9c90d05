//! Minimal safetensors codec.
//!
//! Layout: `u64` little-endian header length, a JSON header mapping tensor
//! names to `{dtype, shape, data_offsets}` (plus an optional string map under
//! `__metadata__`), then the raw little-endian tensor bytes.
//!
//! Only the dtypes the converter exchanges are supported: `F32`, `F64`,
//! `I32`, `I64`.
use crate::error::{ConnectomeError, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

const METADATA_KEY: &str = "__metadata__";

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl TensorData {
    pub fn dtype(&self) -> &'static str {
        match self {
            TensorData::F32(_) => "F32",
            TensorData::F64(_) => "F64",
            TensorData::I32(_) => "I32",
            TensorData::I64(_) => "I64",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::F64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }
}

/// One named tensor, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Self {
        Self { shape, data }
    }

    /// Values widened to f64 (integers convert exactly up to 2^53).
    pub fn to_f64(&self) -> Vec<f64> {
        match &self.data {
            TensorData::F32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::F64(v) => v.clone(),
            TensorData::I32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::I64(v) => v.iter().map(|&x| x as f64).collect(),
        }
    }

    /// Values as i64; fails for floating-point tensors.
    pub fn to_i64(&self, name: &str) -> Result<Vec<i64>> {
        match &self.data {
            TensorData::I32(v) => Ok(v.iter().map(|&x| x as i64).collect()),
            TensorData::I64(v) => Ok(v.clone()),
            other => Err(ConnectomeError::BadTensor {
                name: name.to_string(),
                reason: format!("expected an integer dtype, got {}", other.dtype()),
            }),
        }
    }
}

/// Parsed contents of a safetensors file.
#[derive(Debug, Default, Clone)]
pub struct SafeTensors {
    pub tensors: BTreeMap<String, Tensor>,
    pub metadata: BTreeMap<String, String>,
}

impl SafeTensors {
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| ConnectomeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&bytes).map_err(|reason| ConnectomeError::Format {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Decode an in-memory file; errors are plain messages so the caller
    /// can attach the path.
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, String> {
        let len_bytes: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or("file too small for a safetensors header")?;
        let header_len = u64::from_le_bytes(len_bytes) as usize;
        let data_start = 8usize
            .checked_add(header_len)
            .filter(|&end| end <= bytes.len())
            .ok_or("header length exceeds file size")?;

        let header: Map<String, Value> = serde_json::from_slice(&bytes[8..data_start])
            .map_err(|e| format!("invalid header: {e}"))?;
        let data = &bytes[data_start..];

        let mut out = SafeTensors::default();
        for (name, entry) in header {
            if name == METADATA_KEY {
                if let Some(map) = entry.as_object() {
                    for (k, v) in map {
                        if let Some(s) = v.as_str() {
                            out.metadata.insert(k.clone(), s.to_string());
                        }
                    }
                }
                continue;
            }
            let tensor = decode_entry(&name, &entry, data)?;
            out.tensors.insert(name, tensor);
        }
        Ok(out)
    }

    /// Pick a tensor by explicit key, else by file stem, else the only one.
    pub fn select(&self, key: Option<&str>, path: &Path) -> Result<(&str, &Tensor)> {
        let format_err = |reason: String| ConnectomeError::Format {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(key) = key {
            return self
                .tensors
                .get_key_value(key)
                .map(|(k, t)| (k.as_str(), t))
                .ok_or_else(|| format_err(format!("no tensor named '{key}'")));
        }

        let stem = path.file_stem().and_then(|s| s.to_str());
        if let Some((k, t)) = stem.and_then(|s| self.tensors.get_key_value(s)) {
            return Ok((k.as_str(), t));
        }

        let mut iter = self.tensors.iter();
        match (iter.next(), iter.next()) {
            (Some((k, t)), None) => Ok((k.as_str(), t)),
            (None, _) => Err(format_err("file holds no tensors".to_string())),
            _ => Err(format_err(format!(
                "several tensors ({}); pass --key",
                self.tensors.keys().cloned().collect::<Vec<_>>().join(", ")
            ))),
        }
    }
}

fn decode_entry(name: &str, entry: &Value, data: &[u8]) -> std::result::Result<Tensor, String> {
    let bad = |reason: &str| format!("tensor '{name}': {reason}");

    let dtype = entry["dtype"].as_str().ok_or_else(|| bad("missing dtype"))?;
    let shape = entry["shape"]
        .as_array()
        .ok_or_else(|| bad("missing shape"))?
        .iter()
        .map(|v| v.as_u64().map(|d| d as usize))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| bad("shape must hold non-negative integers"))?;
    let offsets = entry["data_offsets"]
        .as_array()
        .filter(|o| o.len() == 2)
        .and_then(|o| Some((o[0].as_u64()? as usize, o[1].as_u64()? as usize)))
        .ok_or_else(|| bad("missing data_offsets"))?;

    let (start, end) = offsets;
    if start > end || end > data.len() {
        return Err(bad("data_offsets out of range"));
    }
    let raw = &data[start..end];

    let elem = match dtype {
        "F32" | "I32" => 4,
        "F64" | "I64" => 8,
        other => return Err(bad(&format!("unsupported dtype {other}"))),
    };
    let bytes = shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .and_then(|count| count.checked_mul(elem))
        .ok_or_else(|| bad("shape too large"))?;
    if raw.len() != bytes {
        return Err(bad(&format!(
            "{} bytes do not match shape {:?} of {dtype}",
            raw.len(),
            shape
        )));
    }

    let data = match dtype {
        "F32" => TensorData::F32(
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        "I32" => TensorData::I32(
            raw.chunks_exact(4)
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
        ),
        "F64" => TensorData::F64(
            raw.chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
        ),
        _ => TensorData::I64(
            raw.chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
        ),
    };
    Ok(Tensor { shape, data })
}

/// Safetensors file writer; tensors are laid out in insertion order.
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Tensor)>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, tensor: Tensor) -> &mut Self {
        self.entries.push((name.to_string(), tensor));
        self
    }

    pub fn add_f32(&mut self, name: &str, data: Vec<f32>, shape: &[usize]) -> &mut Self {
        self.add(name, Tensor::new(shape.to_vec(), TensorData::F32(data)))
    }

    pub fn add_f64(&mut self, name: &str, data: Vec<f64>, shape: &[usize]) -> &mut Self {
        self.add(name, Tensor::new(shape.to_vec(), TensorData::F64(data)))
    }

    pub fn add_i64(&mut self, name: &str, data: Vec<i64>, shape: &[usize]) -> &mut Self {
        self.add(name, Tensor::new(shape.to_vec(), TensorData::I64(data)))
    }

    pub fn metadata(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = Map::new();
        if !self.metadata.is_empty() {
            header.insert(METADATA_KEY.to_string(), json!(self.metadata));
        }

        let blobs: Vec<Vec<u8>> = self.entries.iter().map(|(_, t)| t.data.to_le_bytes()).collect();
        let mut offset = 0usize;
        for ((name, tensor), blob) in self.entries.iter().zip(&blobs) {
            header.insert(
                name.clone(),
                json!({
                    "dtype": tensor.data.dtype(),
                    "shape": tensor.shape,
                    "data_offsets": [offset, offset + blob.len()],
                }),
            );
            offset += blob.len();
        }

        // Map<String, Value> always serializes
        let mut hdr = Value::Object(header).to_string().into_bytes();
        let pad = (8 - hdr.len() % 8) % 8;
        hdr.extend(std::iter::repeat(b' ').take(pad));

        let mut out = Vec::with_capacity(8 + hdr.len() + offset);
        out.extend_from_slice(&(hdr.len() as u64).to_le_bytes());
        out.extend_from_slice(&hdr);
        for blob in blobs {
            out.extend_from_slice(&blob);
        }
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let io_err = |source: std::io::Error| ConnectomeError::Io {
            path: PathBuf::from(path),
            source,
        };
        let mut f = std::fs::File::create(path).map_err(io_err)?;
        f.write_all(&self.to_bytes()).map_err(io_err)?;
        Ok(())
    }
}
