//! point_branch - disk-backed level-of-detail storage for point cloud trees
//!
//! A branch stores one depth range of a quadtree/octree as fixed-capacity,
//! memory-mapped chunk files. Each tree node owns exactly one point slot; when
//! several points are routed to the same node, the one closest to the node's
//! center keeps the slot and the others are handed back to the caller to be
//! retried one level deeper.
//!
//! # Features
//!
//! - **Linear addressing**: depth and branching factor map every node to a
//!   slot index, chunk file and byte offset without any lookup tables
//! - **Lazy chunks**: chunk files are created and mapped exactly once, on the
//!   first point routed to them, even under racing writers
//! - **Concurrent insertion**: `DiskBranch` is `Sync`; any number of worker
//!   threads may insert at arbitrary positions
//! - **Restartable**: `save` persists the set of materialized chunks so a
//!   later process can reopen the branch
//!
//! # Example
//!
//! ```ignore
//! use glam::DVec2;
//! use point_branch::{BranchConfig, DiskBranch, Insertion, PointInfo, Schema, TreePosition};
//!
//! let branch = DiskBranch::new(BranchConfig {
//!     path: "out/branch".into(),
//!     schema: Schema::xyz(),
//!     branching_factor: 4,
//!     depth_begin: 0,
//!     depth_end: 8,
//! })?;
//!
//! let info = PointInfo::encode(branch.schema(), DVec2::new(1.0, 2.0));
//! match branch.add_point(info, &TreePosition::new(0, DVec2::ZERO))? {
//!     Insertion::Placed => {}
//!     Insertion::Displaced(point) => { /* retry one level deeper */ }
//! }
//! branch.save()?;
//! ```

pub mod addressing;
pub mod branch;
pub mod chunk;
pub mod error;
pub mod locked_chunk;
pub mod metadata;
pub mod point;
pub mod schema;
pub mod stats;

// Re-export commonly used items
pub use addressing::{level_offset, num_chunks, points_per_chunk, BranchLayout, SlotAddress};
pub use branch::{BranchConfig, DiskBranch};
pub use chunk::{Chunk, SlotOutcome};
pub use error::{BranchError, InsertError, Result};
pub use locked_chunk::LockedChunk;
pub use metadata::{BranchMetadata, METADATA_FILE};
pub use point::{point_exists, Insertion, PointInfo, TreePosition, EMPTY_COORD};
pub use schema::{DimInfo, DimType, Schema};
pub use stats::{BranchStats, StatsSnapshot};
