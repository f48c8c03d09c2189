//! Spatial partitioning and bounding volumes
//!
//! Bounding volumes and frustum tests used by culling, and the octree that
//! backs each per-type component index.

mod bounds;
mod octree;

pub use bounds::{Aabb, Frustum, Plane, Sphere};
pub use octree::{Octree, OctreeConfig, OctreeItem, OctreeNode};
