//! Registry components for named, placed and voxelized entities

use std::sync::Arc;

use crate::core::types::{Quat, Vec3};
use crate::render::gpu::TextureId;
use crate::voxel::VoxelData;

/// Human-readable entity name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);

/// Placement of an entity in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Stored for application use; rasterization ignores it
    pub scale: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// The part of the transform that determines a voxel footprint
    pub fn pose(&self) -> Pose {
        Pose {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Position and rotation of a rasterized footprint
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Voxel payload of a placed object
#[derive(Clone, Debug)]
pub struct VoxelComponent {
    pub voxel_data: Arc<VoxelData>,
    /// Per-object GPU texture, set once the render system has uploaded it
    pub texture: Option<TextureId>,
    /// Set by paths that change the transform without publishing an event
    pub needs_update: bool,
    /// Local-space distance to the viewer, refreshed every frame
    pub distance: f32,
    /// Pose currently rasterized into the voxel world
    pub last_pose: Pose,
}

impl VoxelComponent {
    pub fn new(voxel_data: Arc<VoxelData>) -> Self {
        Self {
            voxel_data,
            texture: None,
            needs_update: false,
            distance: 0.0,
            last_pose: Pose::default(),
        }
    }
}
