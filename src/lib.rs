//! Voxlume - voxel world renderer core
//!
//! Placed voxel objects are rasterized into one bit-packed occupancy grid
//! that is mirrored to the GPU, kept in sync through event buses, and drawn
//! nearest first every frame.

pub mod core;
pub mod math;
pub mod voxel;
pub mod event;
pub mod entity;
pub mod render;
pub mod engine;
