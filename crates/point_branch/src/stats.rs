//! Lock-free insertion counters for a branch.
//!
//! Updated from every worker thread with relaxed atomics; read with
//! [`BranchStats::snapshot`] for logging and tests.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a [`DiskBranch`](crate::DiskBranch).
#[derive(Debug, Default)]
pub struct BranchStats {
  chunks_materialized: AtomicU64,
  chunk_files_written: AtomicU64,
  placed: AtomicU64,
  replaced: AtomicU64,
  rejected: AtomicU64,
}

/// Point-in-time copy of [`BranchStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
  /// Chunks whose mapping was established.
  pub chunks_materialized: u64,
  /// Chunk files created from the sentinel template.
  pub chunk_files_written: u64,
  /// Points written into an empty slot.
  pub placed: u64,
  /// Points that evicted a farther resident.
  pub replaced: u64,
  /// Points that lost to the resident.
  pub rejected: u64,
}

impl StatsSnapshot {
  /// Insertions that handed a point back to the caller.
  pub fn displaced(&self) -> u64 {
    self.replaced + self.rejected
  }
}

impl BranchStats {
  pub(crate) fn chunk_materialized(&self) {
    self.chunks_materialized.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn chunk_file_written(&self) {
    self.chunk_files_written.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_placed(&self) {
    self.placed.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_replaced(&self) {
    self.replaced.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn record_rejected(&self) {
    self.rejected.fetch_add(1, Ordering::Relaxed);
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      chunks_materialized: self.chunks_materialized.load(Ordering::Relaxed),
      chunk_files_written: self.chunk_files_written.load(Ordering::Relaxed),
      placed: self.placed.load(Ordering::Relaxed),
      replaced: self.replaced.load(Ordering::Relaxed),
      rejected: self.rejected.load(Ordering::Relaxed),
    }
  }
}
