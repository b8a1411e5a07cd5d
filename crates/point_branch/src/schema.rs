//! Packed point record layout.
//!
//! A [`Schema`] is an ordered list of named dimensions stored back to back,
//! little-endian, with no padding. The branch only ever inspects X and Y;
//! every other dimension is opaque payload carried with the record.

use std::collections::HashSet;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{BranchError, Result};

/// Name of the X dimension (required).
pub const X: &str = "X";
/// Name of the Y dimension (required).
pub const Y: &str = "Y";
/// Name of the Z dimension used by [`Schema::xyz`].
pub const Z: &str = "Z";

/// Storage type of one dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimType {
  I8,
  I16,
  I32,
  I64,
  U8,
  U16,
  U32,
  U64,
  F32,
  F64,
}

impl DimType {
  /// Size in bytes.
  pub fn size(self) -> usize {
    match self {
      DimType::I8 | DimType::U8 => 1,
      DimType::I16 | DimType::U16 => 2,
      DimType::I32 | DimType::U32 | DimType::F32 => 4,
      DimType::I64 | DimType::U64 | DimType::F64 => 8,
    }
  }

  fn read(self, bytes: &[u8]) -> f64 {
    macro_rules! le {
      ($t:ty) => {{
        let mut raw = [0u8; std::mem::size_of::<$t>()];
        raw.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
        <$t>::from_le_bytes(raw) as f64
      }};
    }
    match self {
      DimType::I8 => le!(i8),
      DimType::I16 => le!(i16),
      DimType::I32 => le!(i32),
      DimType::I64 => le!(i64),
      DimType::U8 => le!(u8),
      DimType::U16 => le!(u16),
      DimType::U32 => le!(u32),
      DimType::U64 => le!(u64),
      DimType::F32 => le!(f32),
      DimType::F64 => le!(f64),
    }
  }

  fn write(self, bytes: &mut [u8], value: f64) {
    macro_rules! le {
      ($t:ty) => {{
        let raw = (value as $t).to_le_bytes();
        bytes[..raw.len()].copy_from_slice(&raw);
      }};
    }
    match self {
      DimType::I8 => le!(i8),
      DimType::I16 => le!(i16),
      DimType::I32 => le!(i32),
      DimType::I64 => le!(i64),
      DimType::U8 => le!(u8),
      DimType::U16 => le!(u16),
      DimType::U32 => le!(u32),
      DimType::U64 => le!(u64),
      DimType::F32 => le!(f32),
      DimType::F64 => le!(f64),
    }
  }
}

/// One named dimension of a point record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimInfo {
  pub name: String,
  #[serde(rename = "type")]
  pub kind: DimType,
}

impl DimInfo {
  pub fn new(name: impl Into<String>, kind: DimType) -> Self {
    Self {
      name: name.into(),
      kind,
    }
  }
}

/// Ordered, packed record layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DimInfo>", into = "Vec<DimInfo>")]
pub struct Schema {
  dims: Vec<DimInfo>,
  offsets: Vec<usize>,
  point_size: usize,
  x: (usize, DimType),
  y: (usize, DimType),
}

impl Schema {
  /// Build a layout from its dimensions. X and Y must both be present.
  pub fn new(dims: Vec<DimInfo>) -> Result<Self> {
    let mut offsets = Vec::with_capacity(dims.len());
    let mut seen = HashSet::with_capacity(dims.len());
    let mut point_size = 0;
    for dim in &dims {
      if !seen.insert(dim.name.as_str()) {
        return Err(BranchError::config(format!("duplicate dimension {:?}", dim.name)));
      }
      offsets.push(point_size);
      point_size += dim.kind.size();
    }

    let find = |name: &str| {
      dims
        .iter()
        .position(|d| d.name == name)
        .map(|i| (offsets[i], dims[i].kind))
        .ok_or_else(|| BranchError::UnknownField(name.to_string()))
    };
    let x = find(X)?;
    let y = find(Y)?;
    // The not-present sentinel is +inf, which only floats can hold.
    for (name, (_, kind)) in [(X, x), (Y, y)] {
      if !matches!(kind, DimType::F32 | DimType::F64) {
        return Err(BranchError::config(format!(
          "dimension {name} must be floating point, got {kind:?}"
        )));
      }
    }

    Ok(Self {
      dims,
      offsets,
      point_size,
      x,
      y,
    })
  }

  /// X, Y, Z as f64: 24 byte records.
  pub fn xyz() -> Self {
    Self {
      dims: vec![
        DimInfo::new(X, DimType::F64),
        DimInfo::new(Y, DimType::F64),
        DimInfo::new(Z, DimType::F64),
      ],
      offsets: vec![0, 8, 16],
      point_size: 24,
      x: (0, DimType::F64),
      y: (8, DimType::F64),
    }
  }

  /// Record size in bytes.
  #[inline]
  pub fn point_size(&self) -> usize {
    self.point_size
  }

  pub fn dims(&self) -> &[DimInfo] {
    &self.dims
  }

  /// Byte offset and type of a named dimension.
  pub fn find(&self, name: &str) -> Result<(usize, DimType)> {
    self
      .dims
      .iter()
      .position(|d| d.name == name)
      .map(|i| (self.offsets[i], self.dims[i].kind))
      .ok_or_else(|| BranchError::UnknownField(name.to_string()))
  }

  /// Read a dimension from one record, widened to f64.
  pub fn get_f64(&self, record: &[u8], name: &str) -> Result<f64> {
    let (offset, kind) = self.find(name)?;
    Ok(kind.read(&record[offset..]))
  }

  /// Write a dimension into one record, narrowed from f64.
  pub fn set_f64(&self, record: &mut [u8], name: &str, value: f64) -> Result<()> {
    let (offset, kind) = self.find(name)?;
    kind.write(&mut record[offset..], value);
    Ok(())
  }

  /// The planar position of a record.
  #[inline]
  pub fn xy(&self, record: &[u8]) -> DVec2 {
    DVec2::new(
      self.x.1.read(&record[self.x.0..]),
      self.y.1.read(&record[self.y.0..]),
    )
  }

  #[inline]
  pub fn set_xy(&self, record: &mut [u8], point: DVec2) {
    self.x.1.write(&mut record[self.x.0..], point.x);
    self.y.1.write(&mut record[self.y.0..], point.y);
  }

  /// Sentinel chunk image: `points` records with X and Y set to the
  /// not-present value and every other byte zero.
  pub fn empty_chunk(&self, points: usize) -> Vec<u8> {
    let mut data = vec![0u8; points * self.point_size];
    let empty = DVec2::splat(crate::point::EMPTY_COORD);
    for record in data.chunks_exact_mut(self.point_size) {
      self.set_xy(record, empty);
    }
    data
  }
}

impl TryFrom<Vec<DimInfo>> for Schema {
  type Error = BranchError;

  fn try_from(dims: Vec<DimInfo>) -> Result<Self> {
    Schema::new(dims)
  }
}

impl From<Schema> for Vec<DimInfo> {
  fn from(schema: Schema) -> Self {
    schema.dims
  }
}
