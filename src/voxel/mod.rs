//! Voxel data structures and the world occupancy grid

pub mod voxel_data;
pub mod region;
pub mod world;

pub use voxel_data::{VoxelData, EMPTY};
pub use region::{BlockRegion, DirtyRegion};
pub use world::VoxelWorld;
