//! Insertion throughput for a single branch level.
//!
//! Compares one writer against rayon's pool hammering the same branch, at a
//! coarse level (few large chunks, heavy mutex contention) and a fine level
//! (many chunks, little contention).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::DVec2;
use point_branch::{BranchConfig, DiskBranch, PointInfo, Schema, TreePosition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

const EXTENT: f64 = 1024.0;
const POINTS: usize = 20_000;

/// Descend `depth` quadtree levels toward `p`; returns the linear index and
/// node center at that depth.
///
/// Mirrors `branch_ingest::Roller` so this crate's benches stay free of a
/// dependency on the driver crate built on top of it.
fn position_at(p: DVec2, depth: u64) -> TreePosition {
  let mut min = DVec2::ZERO;
  let mut max = DVec2::splat(EXTENT);
  let mut index = 0u64;
  for _ in 0..depth {
    let mid = (min + max) * 0.5;
    let east = p.x >= mid.x;
    let north = p.y >= mid.y;
    index = index * 4 + 1 + (east as u64) + ((north as u64) << 1);
    min = DVec2::new(if east { mid.x } else { min.x }, if north { mid.y } else { min.y });
    max = DVec2::new(if east { max.x } else { mid.x }, if north { max.y } else { mid.y });
  }
  TreePosition::new(index, (min + max) * 0.5)
}

fn random_points(n: usize) -> Vec<DVec2> {
  let mut rng = StdRng::seed_from_u64(7);
  (0..n)
    .map(|_| DVec2::new(rng.random_range(0.0..EXTENT), rng.random_range(0.0..EXTENT)))
    .collect()
}

fn fresh_branch(dir: &std::path::Path, depth: u64) -> DiskBranch {
  DiskBranch::new(BranchConfig {
    path: dir.to_path_buf(),
    schema: Schema::xyz(),
    branching_factor: 4,
    depth_begin: depth,
    depth_end: depth + 1,
  })
  .expect("branch")
}

fn bench_insert(c: &mut Criterion) {
  let points = random_points(POINTS);
  let mut group = c.benchmark_group("insert");

  for depth in [2u64, 6] {
    let positions: Vec<TreePosition> = points.iter().map(|&p| position_at(p, depth)).collect();

    group.bench_with_input(BenchmarkId::new("serial", depth), &depth, |b, &depth| {
      b.iter_batched(
        || tempfile::tempdir().expect("tempdir"),
        |dir| {
          let branch = fresh_branch(dir.path(), depth);
          let schema = branch.schema().clone();
          for (p, pos) in points.iter().zip(&positions) {
            let _ = black_box(branch.add_point(PointInfo::encode(&schema, *p), pos));
          }
          dir
        },
        criterion::BatchSize::PerIteration,
      )
    });

    group.bench_with_input(BenchmarkId::new("rayon", depth), &depth, |b, &depth| {
      b.iter_batched(
        || tempfile::tempdir().expect("tempdir"),
        |dir| {
          let branch = fresh_branch(dir.path(), depth);
          let schema = branch.schema().clone();
          points.par_iter().zip(&positions).for_each(|(p, pos)| {
            let _ = black_box(branch.add_point(PointInfo::encode(&schema, *p), pos));
          });
          dir
        },
        criterion::BatchSize::PerIteration,
      )
    });
  }

  group.finish();
}

criterion_group!(benches, bench_insert);
criterion_main!(benches);
