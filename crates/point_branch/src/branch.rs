//! DiskBranch - one depth range of the tree stored as mapped chunk files.
//!
//! Every chunk covers `points_per_chunk` consecutive linear indices and is
//! materialized on first touch. Points routed to an occupied slot compete on
//! distance to the node center; the loser is handed back to the caller for a
//! retry one level deeper.
//!
//! # On-disk layout
//!
//! ```text
//! <path>/
//!   branch.json        BranchMetadata (written by save)
//!   <first index>      one file per materialized chunk,
//!   ...                points_per_chunk * point_size bytes
//! ```

use std::path::{Path, PathBuf};

use glam::DVec2;
use rayon::prelude::*;

use crate::addressing::{BranchLayout, SlotAddress};
use crate::chunk::{Chunk, SlotOutcome};
use crate::error::{BranchError, InsertError, Result};
use crate::locked_chunk::LockedChunk;
use crate::metadata::BranchMetadata;
use crate::point::{Insertion, PointInfo, TreePosition};
use crate::schema::Schema;
use crate::stats::{BranchStats, StatsSnapshot};

/// Parameters for a fresh branch.
#[derive(Clone, Debug)]
pub struct BranchConfig {
  /// Directory holding the chunk files; created if missing.
  pub path: PathBuf,
  pub schema: Schema,
  /// Children per node: 4 for a quadtree, 8 for an octree.
  pub branching_factor: u64,
  /// First depth stored (inclusive).
  pub depth_begin: u64,
  /// One past the last depth stored.
  pub depth_end: u64,
}

pub struct DiskBranch {
  path: PathBuf,
  schema: Schema,
  layout: BranchLayout,
  chunks: Vec<LockedChunk>,
  /// Sentinel image written into every newly created chunk file.
  empty_chunk: Vec<u8>,
  stats: BranchStats,
}

impl DiskBranch {
  /// Create a branch with no chunks materialized.
  pub fn new(config: BranchConfig) -> Result<Self> {
    let layout = BranchLayout::new(
      config.branching_factor,
      config.depth_begin,
      config.depth_end,
    )?;
    let branch = Self::build(config.path, config.schema, layout)?;
    tracing::info!(
      path = %branch.path.display(),
      depth_begin = layout.depth_begin,
      depth_end = layout.depth_end,
      chunks = layout.num_chunks,
      points_per_chunk = layout.points_per_chunk,
      "created branch"
    );
    Ok(branch)
  }

  /// Restore a branch from its persisted metadata, mapping every chunk the
  /// metadata lists.
  pub fn from_metadata(
    path: impl Into<PathBuf>,
    schema: Schema,
    meta: &BranchMetadata,
  ) -> Result<Self> {
    if meta.point_size != schema.point_size() {
      return Err(BranchError::metadata(format!(
        "chunks were written with {} byte records, layout has {}",
        meta.point_size,
        schema.point_size()
      )));
    }
    let layout = BranchLayout::new(meta.branching_factor, meta.depth_begin, meta.depth_end)?;
    let branch = Self::build(path.into(), schema, layout)?;

    for &id in &meta.chunks {
      let chunk_id = usize::try_from(id)
        .ok()
        .filter(|&id| id < branch.chunks.len())
        .ok_or_else(|| {
          BranchError::metadata(format!(
            "chunk id {id} outside branch of {} chunks",
            layout.num_chunks
          ))
        })?;
      let chunk = branch.materialize(chunk_id)?;
      if chunk.created() {
        tracing::warn!(
          path = %chunk.path().display(),
          "chunk listed in metadata was missing and has been recreated empty"
        );
      }
    }

    tracing::info!(
      path = %branch.path.display(),
      depth_begin = layout.depth_begin,
      depth_end = layout.depth_end,
      restored = meta.chunks.len(),
      "restored branch"
    );
    Ok(branch)
  }

  /// Restore from `<path>/branch.json`.
  pub fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
    let path = path.into();
    let meta = BranchMetadata::load(&BranchMetadata::path_in(&path))?;
    Self::from_metadata(path, schema, &meta)
  }

  fn build(path: PathBuf, schema: Schema, layout: BranchLayout) -> Result<Self> {
    layout.chunk_bytes(schema.point_size())?;
    std::fs::create_dir_all(&path).map_err(|e| BranchError::io(&path, e))?;
    let empty_chunk = schema.empty_chunk(layout.points_per_chunk as usize);
    let chunks = (0..layout.num_chunks).map(|_| LockedChunk::new()).collect();
    Ok(Self {
      path,
      schema,
      layout,
      chunks,
      empty_chunk,
      stats: BranchStats::default(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn schema(&self) -> &Schema {
    &self.schema
  }

  pub fn layout(&self) -> &BranchLayout {
    &self.layout
  }

  pub fn stats(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  /// Offer a point to the slot at `position`.
  ///
  /// Returns [`Insertion::Placed`] when the point now occupies the slot, or
  /// [`Insertion::Displaced`] with the point (this one or the evicted
  /// resident) that must be retried one level deeper. On failure the point
  /// comes back inside the error and nothing was stored.
  #[cfg_attr(
    feature = "tracing-spans",
    tracing::instrument(skip_all, name = "branch::add_point", fields(index = position.index))
  )]
  pub fn add_point(
    &self,
    info: PointInfo,
    position: &TreePosition,
  ) -> std::result::Result<Insertion, InsertError> {
    let slot = match self.locate(position.index) {
      Ok(slot) => slot,
      Err(err) => return Err(InsertError::new(err, info)),
    };
    let chunk = match self.materialize(slot.chunk_id) {
      Ok(chunk) => chunk,
      Err(err) => return Err(InsertError::new(err, info)),
    };

    let outcome = chunk.add_point(&self.schema, position.center, info, slot.byte_offset)?;
    match &outcome {
      SlotOutcome::Placed => self.stats.record_placed(),
      SlotOutcome::Replaced(_) => self.stats.record_replaced(),
      SlotOutcome::Rejected(_) => self.stats.record_rejected(),
    }
    Ok(outcome.into_insertion())
  }

  /// True when the slot at `index` holds a point.
  pub fn has_point(&self, index: u64) -> Result<bool> {
    Ok(self.read(index)?.is_some())
  }

  /// Planar position stored at `index`, if any.
  pub fn get_point(&self, index: u64) -> Result<Option<DVec2>> {
    Ok(self.read(index)?.map(|info| info.point()))
  }

  /// Full encoded record stored at `index`, if any.
  pub fn get_point_data(&self, index: u64) -> Result<Option<Vec<u8>>> {
    Ok(self.read(index)?.map(PointInfo::into_data))
  }

  /// Reads never materialize a chunk; an absent chunk has no points.
  fn read(&self, index: u64) -> Result<Option<PointInfo>> {
    let slot = self.locate(index)?;
    match self.chunks[slot.chunk_id].get() {
      Some(chunk) => chunk.read_slot(&self.schema, slot.byte_offset),
      None => Ok(None),
    }
  }

  fn locate(&self, index: u64) -> Result<SlotAddress> {
    self.layout.locate(index, self.schema.point_size())
  }

  fn materialize(&self, chunk_id: usize) -> Result<&Chunk> {
    let first_point = self.layout.chunk_first_point(chunk_id);
    self.chunks[chunk_id].init(&self.path, first_point, &self.empty_chunk, |chunk| {
      self.stats.chunk_materialized();
      if chunk.created() {
        self.stats.chunk_file_written();
      }
    })
  }

  /// Ids of the chunks materialized so far, ascending.
  pub fn chunk_ids(&self) -> Vec<u64> {
    self
      .chunks
      .iter()
      .enumerate()
      .filter(|(_, chunk)| chunk.exists())
      .map(|(id, _)| id as u64)
      .collect()
  }

  /// Metadata describing the branch as it stands now.
  pub fn metadata(&self) -> BranchMetadata {
    BranchMetadata {
      depth_begin: self.layout.depth_begin,
      depth_end: self.layout.depth_end,
      branching_factor: self.layout.branching_factor,
      point_size: self.schema.point_size(),
      chunks: self.chunk_ids(),
    }
  }

  /// Write every materialized chunk's dirty pages back to disk.
  pub fn flush(&self) -> Result<()> {
    self
      .chunks
      .par_iter()
      .filter_map(LockedChunk::get)
      .try_for_each(Chunk::flush)
  }

  /// Flush all chunks and write `<path>/branch.json`.
  pub fn save(&self) -> Result<BranchMetadata> {
    let meta_path = BranchMetadata::path_in(&self.path);
    self.save_to(&meta_path)
  }

  /// Flush all chunks and write the metadata document to `meta_path`.
  pub fn save_to(&self, meta_path: &Path) -> Result<BranchMetadata> {
    self.flush()?;
    let meta = self.metadata();
    meta.store(meta_path)?;
    tracing::info!(
      path = %meta_path.display(),
      chunks = meta.chunks.len(),
      "saved branch metadata"
    );
    Ok(meta)
  }
}

impl std::fmt::Debug for DiskBranch {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DiskBranch")
      .field("path", &self.path)
      .field("layout", &self.layout)
      .field("stats", &self.stats.snapshot())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
#[path = "branch_test.rs"]
mod branch_test;
