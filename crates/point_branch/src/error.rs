//! Error type for branch construction, chunk storage and metadata.

use std::path::PathBuf;

use thiserror::Error;

use crate::point::PointInfo;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BranchError>;

#[derive(Error, Debug)]
pub enum BranchError {
  /// Branching factor or depth range cannot describe a tree.
  #[error("invalid branch configuration: {0}")]
  InvalidConfig(String),

  /// The depth range does not split into whole chunks.
  #[error("{points} points in depth range do not divide into chunks of {per_chunk}")]
  UnevenChunks { points: u64, per_chunk: u64 },

  /// Linear index outside the branch's `[begin, end)` range.
  #[error("index {index} outside branch range [{begin}, {end})")]
  IndexOutOfRange { index: u64, begin: u64, end: u64 },

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("could not map {}: {source}", path.display())]
  Map {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// An existing chunk file does not have the configured fixed size.
  #[error("chunk file {} is {actual} bytes, expected {expected}", path.display())]
  SizeMismatch {
    path: PathBuf,
    expected: u64,
    actual: u64,
  },

  #[error("branch metadata: {0}")]
  Metadata(String),

  #[error("branch metadata json: {0}")]
  Json(#[from] serde_json::Error),

  /// Record layout has no dimension with this name.
  #[error("record layout has no dimension named {0:?}")]
  UnknownField(String),

  /// An encoded record does not match the layout's record size.
  #[error("record is {actual} bytes, layout expects {expected}")]
  RecordSize { expected: usize, actual: usize },

  /// A slot accessor was handed a byte offset outside the mapping.
  #[error("slot at byte {offset} (+{len}) exceeds chunk of {size} bytes")]
  SlotOutOfRange { offset: usize, len: usize, size: usize },
}

impl BranchError {
  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    BranchError::Io {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn config(msg: impl Into<String>) -> Self {
    BranchError::InvalidConfig(msg.into())
  }

  pub(crate) fn metadata(msg: impl Into<String>) -> Self {
    BranchError::Metadata(msg.into())
  }
}

/// An insertion that could not complete. The offered point is handed back so
/// it is never lost, even on failure.
#[derive(Error, Debug)]
#[error("point was not stored: {source}")]
pub struct InsertError {
  #[source]
  pub source: BranchError,
  pub point: PointInfo,
}

impl InsertError {
  pub fn new(source: BranchError, point: PointInfo) -> Self {
    Self { source, point }
  }

  pub fn into_point(self) -> PointInfo {
    self.point
  }
}
