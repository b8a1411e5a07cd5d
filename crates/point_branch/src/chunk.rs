//! Memory-mapped, fixed-capacity point storage.
//!
//! A chunk is one file of `points_per_chunk * point_size` bytes, mapped
//! read-write and shared, so every write is immediately visible to any other
//! mapper of the file. Slot `i` lives at byte `i * point_size`.
//!
//! One mutex guards the whole mapping. Every compare-and-write on the chunk is
//! serialized, including writes to unrelated slots; for the coarse chunks near
//! the root this is the main point of contention.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use glam::DVec2;
use memmap2::{MmapMut, MmapOptions};
use parking_lot::Mutex;

use crate::error::{BranchError, InsertError, Result};
use crate::point::{point_exists, Insertion, PointInfo};
use crate::schema::Schema;

/// Outcome of one slot competition, before it is reported to the caller.
#[derive(Debug, PartialEq)]
pub enum SlotOutcome {
  /// The slot was empty and now holds the offered point.
  Placed,
  /// The offered point was closer; the former resident is handed back.
  Replaced(PointInfo),
  /// The resident was at least as close; the offered point is handed back.
  Rejected(PointInfo),
}

impl SlotOutcome {
  pub fn into_insertion(self) -> Insertion {
    match self {
      SlotOutcome::Placed => Insertion::Placed,
      SlotOutcome::Replaced(info) | SlotOutcome::Rejected(info) => Insertion::Displaced(info),
    }
  }
}

/// File name of the chunk whose first slot is `first_point`.
pub fn chunk_path(dir: &Path, first_point: u64) -> PathBuf {
  dir.join(first_point.to_string())
}

/// A single mapped chunk file.
pub struct Chunk {
  path: PathBuf,
  first_point: u64,
  created: bool,
  mapping: Mutex<MmapMut>,
}

impl Chunk {
  /// Open (creating from `template` when absent) and map the chunk file.
  ///
  /// An existing file must be exactly `template.len()` bytes.
  pub fn open(dir: &Path, first_point: u64, template: &[u8]) -> Result<Self> {
    let path = chunk_path(dir, first_point);

    let created = if path.exists() {
      false
    } else {
      write_template(&path, template)?;
      tracing::debug!(path = %path.display(), bytes = template.len(), "wrote empty chunk");
      true
    };

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .open(&path)
      .map_err(|e| BranchError::io(&path, e))?;
    check_size(&path, &file, template.len() as u64)?;

    // SAFETY: the file is only ever written through chunk mappings, and every
    // write to this mapping goes through `self.mapping`'s mutex.
    let mapping = unsafe { MmapOptions::new().len(template.len()).map_mut(&file) }
      .map_err(|source| BranchError::Map {
        path: path.clone(),
        source,
      })?;
    tracing::debug!(path = %path.display(), created, "mapped chunk");

    Ok(Self {
      path,
      first_point,
      created,
      mapping: Mutex::new(mapping),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Linear index of slot 0.
  pub fn first_point(&self) -> u64 {
    self.first_point
  }

  /// True when this open wrote the file from the template.
  pub fn created(&self) -> bool {
    self.created
  }

  /// Size of the mapping in bytes.
  pub fn len(&self) -> usize {
    self.mapping.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Offer `info` to the slot at `byte_offset`, keeping whichever point is
  /// closer to `center`. Ties keep the resident.
  ///
  /// On error the slot is untouched and `info` comes back inside the error.
  #[cfg_attr(
    feature = "tracing-spans",
    tracing::instrument(skip_all, name = "chunk::add_point")
  )]
  pub fn add_point(
    &self,
    schema: &Schema,
    center: DVec2,
    info: PointInfo,
    byte_offset: usize,
  ) -> std::result::Result<SlotOutcome, InsertError> {
    let size = schema.point_size();
    if info.data().len() != size {
      let err = BranchError::RecordSize {
        expected: size,
        actual: info.data().len(),
      };
      return Err(InsertError::new(err, info));
    }

    let mut mapping = self.mapping.lock();
    let slot = match slot_mut(&mut mapping, byte_offset, size) {
      Ok(slot) => slot,
      Err(err) => return Err(InsertError::new(err, info)),
    };
    let resident = schema.xy(slot);

    if !point_exists(resident) {
      slot.copy_from_slice(info.data());
      return Ok(SlotOutcome::Placed);
    }

    if info.sq_dist(center) < resident.distance_squared(center) {
      let evicted = PointInfo::from_parts(resident, slot.to_vec());
      slot.copy_from_slice(info.data());
      tracing::trace!(
        chunk = self.first_point,
        byte_offset,
        "resident displaced by closer point"
      );
      Ok(SlotOutcome::Replaced(evicted))
    } else {
      Ok(SlotOutcome::Rejected(info))
    }
  }

  /// Copy out the record at `byte_offset`, or `None` for an empty slot.
  pub fn read_slot(&self, schema: &Schema, byte_offset: usize) -> Result<Option<PointInfo>> {
    let size = schema.point_size();
    let mapping = self.mapping.lock();
    let slot = slot_ref(&mapping, byte_offset, size)?;
    let point = schema.xy(slot);
    Ok(point_exists(point).then(|| PointInfo::from_parts(point, slot.to_vec())))
  }

  /// Synchronously write dirty pages back to the file.
  pub fn flush(&self) -> Result<()> {
    self
      .mapping
      .lock()
      .flush()
      .map_err(|e| BranchError::io(&self.path, e))
  }
}

impl std::fmt::Debug for Chunk {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Chunk")
      .field("path", &self.path)
      .field("first_point", &self.first_point)
      .field("created", &self.created)
      .finish_non_exhaustive()
  }
}

/// Write `template` to a sibling temp file and rename it into place, so a
/// failed write never leaves a short file at `path`.
fn write_template(path: &Path, template: &[u8]) -> Result<()> {
  let tmp = path.with_extension("tmp");
  let written = File::create(&tmp)
    .and_then(|mut file| {
      file.write_all(template)?;
      file.sync_data()
    })
    .and_then(|_| fs::rename(&tmp, path));
  written.map_err(|e| {
    let _ = fs::remove_file(&tmp);
    BranchError::io(path, e)
  })
}

fn check_size(path: &Path, file: &File, expected: u64) -> Result<()> {
  let actual = file
    .metadata()
    .map_err(|e| BranchError::io(path, e))?
    .len();
  if actual != expected {
    return Err(BranchError::SizeMismatch {
      path: path.to_path_buf(),
      expected,
      actual,
    });
  }
  Ok(())
}

fn slot_ref(mapping: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
  let size = mapping.len();
  offset
    .checked_add(len)
    .and_then(|end| mapping.get(offset..end))
    .ok_or(BranchError::SlotOutOfRange { offset, len, size })
}

fn slot_mut(mapping: &mut [u8], offset: usize, len: usize) -> Result<&mut [u8]> {
  let size = mapping.len();
  offset
    .checked_add(len)
    .and_then(|end| mapping.get_mut(offset..end))
    .ok_or(BranchError::SlotOutOfRange { offset, len, size })
}

#[cfg(test)]
#[path = "chunk_test.rs"]
mod chunk_test;
