//! Persisted branch bookkeeping.
//!
//! Stored as `branch.json` next to the chunk files:
//!
//! ```json
//! {
//!   "depthBegin": 6,
//!   "depthEnd": 10,
//!   "branchingFactor": 4,
//!   "pointSize": 24,
//!   "chunks": [0, 3, 17]
//! }
//! ```
//!
//! `chunks` lists the zero-based ids of every materialized chunk so a restored
//! branch can map them without probing the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BranchError, Result};

/// File name of the metadata document inside a branch directory.
pub const METADATA_FILE: &str = "branch.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchMetadata {
  pub depth_begin: u64,
  pub depth_end: u64,
  pub branching_factor: u64,
  /// Record size the chunk files were written with.
  pub point_size: usize,
  /// Ids of materialized chunks, ascending.
  #[serde(default)]
  pub chunks: Vec<u64>,
}

impl BranchMetadata {
  pub fn path_in(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
  }

  pub fn load(path: &Path) -> Result<Self> {
    let raw = fs::read(path).map_err(|e| BranchError::io(path, e))?;
    Ok(serde_json::from_slice(&raw)?)
  }

  /// Write atomically: serialize to a sibling temp file, then rename over.
  pub fn store(&self, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(self)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| BranchError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| BranchError::io(path, e))
  }
}
