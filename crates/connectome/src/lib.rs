//! # gnnlaunch-connectome: connectivity matrices → graph datasets
//!
//! Turns a stack of (correlation) connectivity matrices into a batched graph
//! dataset for GNN training:
//!
//! ```text
//! corr_*.mat | .safetensors [N, N, Gk]   labels.mat | .safetensors [S, C]
//!   │                                   │
//!   ├─ io::load_matrices()  concat on the graph axis → [N, N, G]
//!   │                                   ├─ io::load_labels()  column → [G]
//!   ├─ drop graphs whose label is NaN ◄─┘
//!   ├─ threshold_proportional()   keep the strongest p of the edges
//!   ├─ edge_index()               (i, j) with w > 0, i ≠ j
//!   └─ GraphDataset               x, edge_index, y, node/edge offsets
//!        │
//!        └─→ graphs_<label>_<pct>pct.safetensors
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use gnnlaunch_connectome::{io, output_file_name, GraphDataset};
//! use std::path::{Path, PathBuf};
//!
//! let mats = io::load_matrices(&[PathBuf::from("corr_1.safetensors")], None).unwrap();
//! let labels = io::load_labels(Path::new("labels.safetensors"), None, 0).unwrap();
//! let ds = GraphDataset::build(mats.view(), &labels, 0.05, 2).unwrap();
//! ds.save(Path::new(&output_file_name("cddr15a", 0.05)), "cddr15a", 0.05).unwrap();
//! ```

pub mod dataset;
pub mod error;
pub mod graph;
pub mod io;
pub mod mat;
pub mod safetensors;
pub mod threshold;

pub use dataset::{output_file_name, Graph, GraphDataset};
pub use error::{ConnectomeError, Result};
pub use graph::edge_index;
pub use threshold::threshold_proportional;
