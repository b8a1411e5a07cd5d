//! branch_ingest - streams points through a quadtree into a [`point_branch`]
//! branch.
//!
//! The library side holds the traversal driver ([`ingest`]), the quadtree
//! cursor ([`roller`]), point sources ([`input`]) and the TOML configuration
//! ([`config`]). The `branch_ingest` binary wires them to the command line.

pub mod config;
pub mod ingest;
pub mod input;
pub mod roller;

pub use config::{BoundsConfig, Config, SyntheticConfig};
pub use ingest::{ingest, insert_point, IngestSummary, Outcome};
pub use roller::{Bounds, Roller, BRANCHING_FACTOR};
