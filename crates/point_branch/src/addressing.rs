//! Linear addressing from tree depth to point slots and chunks.
//!
//! Every tree level `d` holds `F^d` point slots (F = branching factor: 4 for
//! a quadtree, 8 for an octree). Levels are laid out back to back, so the
//! first slot of level `d` sits at
//!
//! ```text
//! level_offset(d) = F^0 + F^1 + ... + F^(d-1) = (F^d - 1) / (F - 1)
//! ```
//!
//! A branch covers the half-open depth range `[depth_begin, depth_end)` and
//! stores it as equally sized chunks, each one the size of the branch's first
//! level.

use crate::error::{BranchError, Result};

/// Total number of point slots in all levels shallower than `depth`.
pub fn level_offset(depth: u64, branching_factor: u64) -> Result<u64> {
  if branching_factor < 2 {
    return Err(BranchError::config(format!(
      "branching factor must be at least 2, got {branching_factor}"
    )));
  }
  let exp = u32::try_from(depth)
    .map_err(|_| BranchError::config(format!("depth {depth} is too large")))?;
  let level_points = branching_factor.checked_pow(exp).ok_or_else(|| {
    BranchError::config(format!(
      "depth {depth} overflows point indices for branching factor {branching_factor}"
    ))
  })?;
  Ok((level_points - 1) / (branching_factor - 1))
}

/// Point capacity of the single level at `depth_begin`.
pub fn points_per_chunk(depth_begin: u64, branching_factor: u64) -> Result<u64> {
  Ok(level_offset(depth_begin + 1, branching_factor)? - level_offset(depth_begin, branching_factor)?)
}

/// Number of chunks needed to hold `[depth_begin, depth_end)`.
///
/// The range's capacity must be a whole multiple of [`points_per_chunk`].
pub fn num_chunks(depth_begin: u64, depth_end: u64, branching_factor: u64) -> Result<u64> {
  if depth_end <= depth_begin {
    return Err(BranchError::config(format!(
      "empty depth range [{depth_begin}, {depth_end})"
    )));
  }
  let points =
    level_offset(depth_end, branching_factor)? - level_offset(depth_begin, branching_factor)?;
  let per_chunk = points_per_chunk(depth_begin, branching_factor)?;
  if points % per_chunk != 0 {
    return Err(BranchError::UnevenChunks { points, per_chunk });
  }
  Ok(points / per_chunk)
}

/// Where a linear point index lives inside a branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotAddress {
  /// Zero-based chunk id within the branch.
  pub chunk_id: usize,
  /// Linear index of the chunk's first slot (also its file name).
  pub chunk_first_point: u64,
  /// Byte offset of the slot inside the chunk mapping.
  pub byte_offset: usize,
}

/// Immutable addressing scheme of one branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchLayout {
  pub branching_factor: u64,
  pub depth_begin: u64,
  pub depth_end: u64,
  /// First linear index covered (inclusive).
  pub index_begin: u64,
  /// One past the last linear index covered.
  pub index_end: u64,
  pub points_per_chunk: u64,
  pub num_chunks: u64,
}

impl BranchLayout {
  pub fn new(branching_factor: u64, depth_begin: u64, depth_end: u64) -> Result<Self> {
    let num_chunks = num_chunks(depth_begin, depth_end, branching_factor)?;
    let points_per_chunk = points_per_chunk(depth_begin, branching_factor)?;
    if usize::try_from(num_chunks).is_err() || usize::try_from(points_per_chunk).is_err() {
      return Err(BranchError::config(format!(
        "depth range [{depth_begin}, {depth_end}) does not fit in memory addressing"
      )));
    }
    Ok(Self {
      branching_factor,
      depth_begin,
      depth_end,
      index_begin: level_offset(depth_begin, branching_factor)?,
      index_end: level_offset(depth_end, branching_factor)?,
      points_per_chunk,
      num_chunks,
    })
  }

  /// Total slots in the branch.
  #[inline]
  pub fn capacity(&self) -> u64 {
    self.index_end - self.index_begin
  }

  #[inline]
  pub fn contains(&self, index: u64) -> bool {
    index >= self.index_begin && index < self.index_end
  }

  /// Zero-based chunk holding `index`.
  pub fn chunk_id(&self, index: u64) -> Result<usize> {
    self.check(index)?;
    Ok(((index - self.index_begin) / self.points_per_chunk) as usize)
  }

  /// Byte size of one chunk file holding `point_size` byte records.
  pub fn chunk_bytes(&self, point_size: usize) -> Result<usize> {
    usize::try_from(self.points_per_chunk)
      .ok()
      .and_then(|points| points.checked_mul(point_size))
      .ok_or_else(|| {
        BranchError::config(format!(
          "chunks of {} points x {point_size} bytes overflow memory addressing",
          self.points_per_chunk
        ))
      })
  }

  /// Linear index of the first slot in `chunk_id`.
  #[inline]
  pub fn chunk_first_point(&self, chunk_id: usize) -> u64 {
    self.index_begin + chunk_id as u64 * self.points_per_chunk
  }

  /// Resolve `index` to its chunk and the byte offset of its record.
  pub fn locate(&self, index: u64, point_size: usize) -> Result<SlotAddress> {
    let chunk_id = self.chunk_id(index)?;
    let chunk_first_point = self.chunk_first_point(chunk_id);
    Ok(SlotAddress {
      chunk_id,
      chunk_first_point,
      byte_offset: (index - chunk_first_point) as usize * point_size,
    })
  }

  fn check(&self, index: u64) -> Result<()> {
    if self.contains(index) {
      Ok(())
    } else {
      Err(BranchError::IndexOutOfRange {
        index,
        begin: self.index_begin,
        end: self.index_end,
      })
    }
  }
}

#[cfg(test)]
#[path = "addressing_test.rs"]
mod addressing_test;
