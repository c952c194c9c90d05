//! Batched graph dataset built from a stack of connectivity matrices.
//!
//! Every graph has the same `N` nodes. Node features are the rows of the
//! thresholded matrix, so for `G` graphs:
//!
//! ```text
//!   x            [G·N, N]  f32   graph k occupies rows node_offsets[k]..node_offsets[k+1]
//!   edge_index   [2, E]    i64   graph k occupies cols edge_offsets[k]..edge_offsets[k+1]
//!   y            [G, 1]    i64
//!   node_offsets [G + 1]   i64   last entry = G·N
//!   edge_offsets [G + 1]   i64   last entry = E
//! ```
//!
//! Edge indices are local to their graph (0..N).
use crate::error::{ConnectomeError, Result};
use crate::graph::edge_index;
use crate::safetensors::{SafeTensors, StWriter, Tensor};
use crate::threshold::threshold_proportional;
use ndarray::{s, Array2, ArrayView2, ArrayView3, Axis};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct GraphDataset {
    pub x: Array2<f32>,
    pub edge_index: Array2<i64>,
    pub y: Array2<i64>,
    pub node_offsets: Vec<i64>,
    pub edge_offsets: Vec<i64>,
}

/// One graph sliced out of a [`GraphDataset`].
#[derive(Debug)]
pub struct Graph<'a> {
    pub x: ArrayView2<'a, f32>,
    pub edge_index: ArrayView2<'a, i64>,
    pub y: i64,
}

/// `graphs_<label_column>_<pct>pct.safetensors`, pct truncated to an integer.
pub fn output_file_name(label_column: &str, threshold: f64) -> String {
    format!(
        "graphs_{label_column}_{}pct.safetensors",
        (threshold * 100.0) as i64
    )
}

impl GraphDataset {
    /// Threshold every matrix of `matrices` (`[N, N, G]`) and stack the
    /// resulting graphs.
    ///
    /// Graphs whose label is NaN are dropped. Labels are truncated towards
    /// zero; values outside `0..num_labels` are kept but reported.
    pub fn build(
        matrices: ArrayView3<f64>,
        labels: &[f64],
        threshold: f64,
        num_labels: usize,
    ) -> Result<Self> {
        let (n, m, g) = matrices.dim();
        if n != m {
            return Err(ConnectomeError::NotSquare { rows: n, cols: m });
        }
        if labels.len() != g {
            return Err(ConnectomeError::LabelCountMismatch {
                expected: g,
                got: labels.len(),
            });
        }

        let kept: Vec<(usize, f64)> = labels
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, label)| !label.is_nan())
            .collect();
        if kept.is_empty() {
            return Err(ConnectomeError::NoGraphs);
        }
        if kept.len() < g {
            info!(dropped = g - kept.len(), "Dropped graphs with missing labels");
        }

        let mut x = Vec::with_capacity(kept.len() * n * n);
        let mut src = Vec::new();
        let mut dst = Vec::new();
        let mut y = Vec::with_capacity(kept.len());
        let mut node_offsets = Vec::with_capacity(kept.len() + 1);
        let mut edge_offsets = Vec::with_capacity(kept.len() + 1);

        for &(k, label) in &kept {
            let adj = threshold_proportional(matrices.index_axis(Axis(2), k), threshold)?;
            let edges = edge_index(adj.view());

            node_offsets.push((y.len() * n) as i64);
            edge_offsets.push(src.len() as i64);

            x.extend(adj.iter().map(|&v| v as f32));
            src.extend(edges.row(0).iter().copied());
            dst.extend(edges.row(1).iter().copied());

            let class = label.trunc() as i64;
            if class < 0 || class as usize >= num_labels {
                warn!(graph = k, label, num_labels, "Label outside the expected class range");
            }
            y.push(class);
        }
        node_offsets.push((y.len() * n) as i64);
        edge_offsets.push(src.len() as i64);

        let e = src.len();
        src.extend(dst);
        let dataset = Self {
            x: Array2::from_shape_vec((kept.len() * n, n), x)?,
            edge_index: Array2::from_shape_vec((2, e), src)?,
            y: Array2::from_shape_vec((kept.len(), 1), y)?,
            node_offsets,
            edge_offsets,
        };
        info!(
            graphs = dataset.num_graphs(),
            nodes = n,
            edges = e,
            threshold,
            "Graph dataset built"
        );
        Ok(dataset)
    }

    pub fn num_graphs(&self) -> usize {
        self.y.nrows()
    }

    pub fn graph(&self, i: usize) -> Option<Graph<'_>> {
        if i >= self.num_graphs() {
            return None;
        }
        let node = self.node_offsets[i] as usize..self.node_offsets[i + 1] as usize;
        let edge = self.edge_offsets[i] as usize..self.edge_offsets[i + 1] as usize;
        Some(Graph {
            x: self.x.slice(s![node, ..]),
            edge_index: self.edge_index.slice(s![.., edge]),
            y: self.y[[i, 0]],
        })
    }

    pub fn save(&self, path: &Path, label_column: &str, threshold: f64) -> Result<()> {
        let mut w = StWriter::new();
        w.add_f32("x", self.x.iter().copied().collect(), &[self.x.nrows(), self.x.ncols()])
            .add_i64(
                "edge_index",
                self.edge_index.iter().copied().collect(),
                &[self.edge_index.nrows(), self.edge_index.ncols()],
            )
            .add_i64("y", self.y.iter().copied().collect(), &[self.y.nrows(), self.y.ncols()])
            .add_i64("node_offsets", self.node_offsets.clone(), &[self.node_offsets.len()])
            .add_i64("edge_offsets", self.edge_offsets.clone(), &[self.edge_offsets.len()])
            .metadata("label_column", label_column)
            .metadata("threshold", threshold)
            .metadata("num_graphs", self.num_graphs());
        w.write(path)?;
        info!(path = %path.display(), "Graph dataset written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let st = SafeTensors::read(path)?;
        let get = |name: &str| -> Result<&Tensor> {
            st.tensors.get(name).ok_or_else(|| ConnectomeError::Format {
                path: path.to_path_buf(),
                reason: format!("missing tensor '{name}'"),
            })
        };
        let dims2 = |name: &str, t: &Tensor| -> Result<(usize, usize)> {
            match t.shape[..] {
                [r, c] => Ok((r, c)),
                _ => Err(ConnectomeError::BadTensor {
                    name: name.to_string(),
                    reason: format!("expected 2 dimensions, got {:?}", t.shape),
                }),
            }
        };

        let x = get("x")?;
        let x = Array2::from_shape_vec(
            dims2("x", x)?,
            x.to_f64().into_iter().map(|v| v as f32).collect(),
        )?;
        let ei = get("edge_index")?;
        let ei_dims = dims2("edge_index", ei)?;
        if ei_dims.0 != 2 {
            return Err(ConnectomeError::BadTensor {
                name: "edge_index".to_string(),
                reason: format!("expected [2, E], got {:?}", ei.shape),
            });
        }
        let edge_index = Array2::from_shape_vec(ei_dims, ei.to_i64("edge_index")?)?;
        let yt = get("y")?;
        let y_dims = dims2("y", yt)?;
        if y_dims.1 != 1 {
            return Err(ConnectomeError::BadTensor {
                name: "y".to_string(),
                reason: format!("expected [G, 1], got {:?}", yt.shape),
            });
        }
        let y = Array2::from_shape_vec(y_dims, yt.to_i64("y")?)?;
        let node_offsets = get("node_offsets")?.to_i64("node_offsets")?;
        let edge_offsets = get("edge_offsets")?.to_i64("edge_offsets")?;

        let dataset = Self {
            x,
            edge_index,
            y,
            node_offsets,
            edge_offsets,
        };
        dataset.check_offsets().map_err(|reason| ConnectomeError::Format {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(dataset)
    }

    fn check_offsets(&self) -> std::result::Result<(), String> {
        let g = self.num_graphs();
        for (name, offsets, total) in [
            ("node_offsets", &self.node_offsets, self.x.nrows()),
            ("edge_offsets", &self.edge_offsets, self.edge_index.ncols()),
        ] {
            if offsets.len() != g + 1 {
                return Err(format!("{name} has {} entries for {g} graphs", offsets.len()));
            }
            if offsets.first() != Some(&0)
                || offsets.last() != Some(&(total as i64))
                || offsets.windows(2).any(|w| w[0] > w[1])
            {
                return Err(format!("{name} is not a monotone split of {total}"));
            }
        }
        Ok(())
    }
}
