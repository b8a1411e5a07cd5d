use super::*;
use crate::schema::Z;

const SLOTS: usize = 16;

fn schema() -> Schema {
  Schema::xyz()
}

/// Encode (x, y) with Z = x + y as a per-record checksum.
fn record(schema: &Schema, x: f64, y: f64) -> PointInfo {
  let mut data = vec![0u8; schema.point_size()];
  schema.set_xy(&mut data, DVec2::new(x, y));
  schema.set_f64(&mut data, Z, x + y).unwrap();
  PointInfo::from_record(schema, data).unwrap()
}

fn open_chunk(dir: &Path, schema: &Schema) -> Chunk {
  Chunk::open(dir, 5, &schema.empty_chunk(SLOTS)).expect("chunk should open")
}

// =========================================================================
// Creation and mapping
// =========================================================================

#[test]
fn test_open_creates_template_file() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);

  assert!(chunk.created());
  assert_eq!(chunk.path(), dir.path().join("5"));
  assert_eq!(chunk.first_point(), 5);
  assert_eq!(chunk.len(), SLOTS * schema.point_size());
  assert_eq!(
    std::fs::metadata(chunk.path()).unwrap().len() as usize,
    SLOTS * schema.point_size()
  );
}

/// Every slot of a fresh chunk reads back as empty.
#[test]
fn test_fresh_chunk_is_all_sentinel() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);

  for slot in 0..SLOTS {
    let offset = slot * schema.point_size();
    assert_eq!(chunk.read_slot(&schema, offset).unwrap(), None, "slot {slot}");
  }
}

#[test]
fn test_reopen_keeps_existing_contents() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let offset = 3 * schema.point_size();

  {
    let chunk = open_chunk(dir.path(), &schema);
    let outcome = chunk.add_point(&schema, DVec2::ZERO, record(&schema, 1.0, 2.0), offset);
    assert_eq!(outcome.unwrap(), SlotOutcome::Placed);
    chunk.flush().unwrap();
  }

  let chunk = open_chunk(dir.path(), &schema);
  assert!(!chunk.created());
  let stored = chunk.read_slot(&schema, offset).unwrap().expect("slot should be occupied");
  assert_eq!(stored, record(&schema, 1.0, 2.0));
}

#[test]
fn test_wrong_sized_file_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  std::fs::write(dir.path().join("5"), [0u8; 10]).unwrap();

  let err = Chunk::open(dir.path(), 5, &schema.empty_chunk(SLOTS)).unwrap_err();
  assert!(matches!(err, BranchError::SizeMismatch { actual: 10, .. }));
}

#[test]
fn test_missing_directory_is_io_error() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let missing = dir.path().join("does-not-exist");

  let err = Chunk::open(&missing, 0, &schema.empty_chunk(SLOTS)).unwrap_err();
  assert!(matches!(err, BranchError::Io { .. }));
}

/// A template write that fails leaves no chunk file behind, so the next open
/// starts over and succeeds.
#[test]
fn test_failed_template_write_can_be_retried() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let blocker = dir.path().join("5.tmp");
  std::fs::create_dir(&blocker).unwrap();

  let err = Chunk::open(dir.path(), 5, &schema.empty_chunk(SLOTS)).unwrap_err();
  assert!(matches!(err, BranchError::Io { .. }));
  assert!(!dir.path().join("5").exists());

  std::fs::remove_dir(&blocker).unwrap();
  let chunk = open_chunk(dir.path(), &schema);
  assert!(chunk.created());
  assert_eq!(chunk.len(), SLOTS * schema.point_size());
}

/// A short temp file left by an interrupted write is replaced, not reused.
#[test]
fn test_stale_temp_file_is_overwritten() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  std::fs::write(dir.path().join("5.tmp"), [0u8; 7]).unwrap();

  let chunk = open_chunk(dir.path(), &schema);

  assert!(chunk.created());
  assert!(!dir.path().join("5.tmp").exists());
  assert_eq!(
    std::fs::metadata(chunk.path()).unwrap().len() as usize,
    SLOTS * schema.point_size()
  );
  assert_eq!(chunk.read_slot(&schema, 0).unwrap(), None);
}

// =========================================================================
// Slot competition
// =========================================================================

#[test]
fn test_empty_slot_accepts_point() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);

  let outcome = chunk
    .add_point(&schema, DVec2::ZERO, record(&schema, 3.0, 4.0), 0)
    .unwrap();

  assert_eq!(outcome, SlotOutcome::Placed);
  assert_eq!(chunk.read_slot(&schema, 0).unwrap(), Some(record(&schema, 3.0, 4.0)));
}

/// A closer point evicts the resident, which comes back with its payload.
#[test]
fn test_closer_point_replaces_resident() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);
  let center = DVec2::new(10.0, 10.0);

  let first = chunk.add_point(&schema, center, record(&schema, 0.0, 0.0), 0);
  assert_eq!(first.unwrap(), SlotOutcome::Placed);

  let second = chunk
    .add_point(&schema, center, record(&schema, 9.0, 9.0), 0)
    .unwrap();
  assert_eq!(second, SlotOutcome::Replaced(record(&schema, 0.0, 0.0)));
  assert_eq!(chunk.read_slot(&schema, 0).unwrap(), Some(record(&schema, 9.0, 9.0)));
}

/// A farther point is handed straight back and the slot is untouched.
#[test]
fn test_farther_point_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);
  let center = DVec2::ZERO;

  let _ = chunk.add_point(&schema, center, record(&schema, 1.0, 1.0), 0).unwrap();
  let outcome = chunk
    .add_point(&schema, center, record(&schema, 5.0, 5.0), 0)
    .unwrap();

  assert_eq!(outcome, SlotOutcome::Rejected(record(&schema, 5.0, 5.0)));
  assert_eq!(chunk.read_slot(&schema, 0).unwrap(), Some(record(&schema, 1.0, 1.0)));
}

/// Equal distance keeps the resident.
#[test]
fn test_tie_favors_resident() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);

  let _ = chunk.add_point(&schema, DVec2::ZERO, record(&schema, 1.0, 0.0), 0).unwrap();
  let outcome = chunk
    .add_point(&schema, DVec2::ZERO, record(&schema, 0.0, -1.0), 0)
    .unwrap();

  assert_eq!(outcome, SlotOutcome::Rejected(record(&schema, 0.0, -1.0)));
  assert_eq!(chunk.read_slot(&schema, 0).unwrap(), Some(record(&schema, 1.0, 0.0)));
}

/// The closer of two points wins regardless of arrival order.
#[test]
fn test_winner_is_order_independent() {
  let schema = schema();
  let center = DVec2::new(2.0, 2.0);
  let near = record(&schema, 2.5, 2.0);
  let far = record(&schema, -3.0, 7.0);

  for (a, b) in [(near.clone(), far.clone()), (far.clone(), near.clone())] {
    let dir = tempfile::tempdir().unwrap();
    let chunk = open_chunk(dir.path(), &schema);

    let _ = chunk.add_point(&schema, center, a, 0).unwrap();
    let displaced = chunk
      .add_point(&schema, center, b, 0)
      .unwrap()
      .into_insertion()
      .displaced()
      .expect("second insertion displaces one point");

    assert_eq!(displaced, far);
    assert_eq!(chunk.read_slot(&schema, 0).unwrap(), Some(near.clone()));
  }
}

#[test]
fn test_slot_out_of_range() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);
  let past_end = SLOTS * schema.point_size();

  let err = chunk
    .add_point(&schema, DVec2::ZERO, record(&schema, 0.0, 0.0), past_end)
    .unwrap_err();
  assert!(matches!(err.source, BranchError::SlotOutOfRange { .. }));
  assert_eq!(err.into_point(), record(&schema, 0.0, 0.0));
  assert!(chunk.read_slot(&schema, past_end - 1).is_err());
}

#[test]
fn test_record_size_mismatch() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);

  let other = Schema::new(vec![
    crate::schema::DimInfo::new("X", crate::schema::DimType::F32),
    crate::schema::DimInfo::new("Y", crate::schema::DimType::F32),
  ])
  .unwrap();
  let err = chunk
    .add_point(&schema, DVec2::ZERO, PointInfo::encode(&other, DVec2::ONE), 0)
    .unwrap_err();
  assert!(matches!(
    err.source,
    BranchError::RecordSize {
      expected: 24,
      actual: 8
    }
  ));
}

// =========================================================================
// Concurrency
// =========================================================================

/// Many threads hammering every slot of one chunk never leave a torn record:
/// each stored record still satisfies Z == X + Y, and each slot holds the
/// closest point offered to it.
#[test]
fn test_concurrent_writes_never_tear_records() {
  let dir = tempfile::tempdir().unwrap();
  let schema = schema();
  let chunk = open_chunk(dir.path(), &schema);
  let center = DVec2::ZERO;
  const THREADS: usize = 8;
  const ROUNDS: usize = 200;

  std::thread::scope(|scope| {
    for t in 0..THREADS {
      let chunk = &chunk;
      let schema = &schema;
      scope.spawn(move || {
        for round in 0..ROUNDS {
          let slot = (t + round) % SLOTS;
          let d = 1.0 + ((t * ROUNDS + round) % 97) as f64;
          let info = record(schema, d, -d);
          let _ = chunk
            .add_point(schema, center, info, slot * schema.point_size())
            .unwrap();
        }
      });
    }
  });

  for slot in 0..SLOTS {
    let stored = chunk
      .read_slot(&schema, slot * schema.point_size())
      .unwrap()
      .expect("every slot was offered points");
    let xy = stored.point();
    assert_eq!(schema.get_f64(stored.data(), Z).unwrap(), xy.x + xy.y);
    assert_eq!(xy.x, -xy.y);
  }

  // Slot 0 gets offered distance 1.0 by thread 0 in round 0.
  let best = chunk.read_slot(&schema, 0).unwrap().unwrap();
  assert_eq!(best.point(), DVec2::new(1.0, -1.0));
}
