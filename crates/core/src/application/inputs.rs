// Conversion input collection

use crate::domain::launch::{dedup_inputs, is_matrix_file};
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Expand directories into the matrix files they contain
///
/// Directory entries are filtered by extension and sorted by name; explicit
/// files are taken as given. Duplicates are dropped, first occurrence wins.
pub fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_matrix_file(p))
                .collect();
            found.sort();
            debug!(dir = %path.display(), files = found.len(), "Expanded input directory");
            out.extend(found);
        } else {
            out.push(path.clone());
        }
    }
    Ok(dedup_inputs(out))
}
