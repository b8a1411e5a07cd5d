//! Lazily materialized chunk handle.
//!
//! A `LockedChunk` starts absent and becomes present exactly once, the first
//! time a point is routed to it. Racing initializers block on the cell while
//! one of them opens and maps the file; the rest observe its result. Once
//! present, the chunk can be dereferenced without further synchronization.

use std::path::Path;

use once_cell::sync::OnceCell;

use crate::chunk::Chunk;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct LockedChunk {
  cell: OnceCell<Chunk>,
}

impl LockedChunk {
  pub fn new() -> Self {
    Self::default()
  }

  /// Non-blocking presence check.
  #[inline]
  pub fn exists(&self) -> bool {
    self.cell.get().is_some()
  }

  /// The chunk, if it has been materialized.
  #[inline]
  pub fn get(&self) -> Option<&Chunk> {
    self.cell.get()
  }

  /// Materialize the chunk if needed and return it.
  ///
  /// `on_create` runs only for the caller whose open succeeded and got
  /// published. If the open fails the handle stays absent and the error goes
  /// to that caller.
  pub fn init(
    &self,
    dir: &Path,
    first_point: u64,
    template: &[u8],
    on_create: impl FnOnce(&Chunk),
  ) -> Result<&Chunk> {
    if let Some(chunk) = self.cell.get() {
      return Ok(chunk);
    }
    self.cell.get_or_try_init(|| {
      let chunk = Chunk::open(dir, first_point, template)?;
      on_create(&chunk);
      Ok(chunk)
    })
  }
}
