//! Error types for the voxel renderer

use glam::{IVec3, UVec3};
use hecs::Entity;
use thiserror::Error;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Voxel {pos} out of range for grid of size {dimensions}")]
    VoxelOutOfRange { pos: IVec3, dimensions: UVec3 },

    #[error("Invalid world dimensions {0}: every axis must be even and non-zero")]
    InvalidWorldDimensions(UVec3),

    #[error("Entity {0:?} does not exist")]
    NoSuchEntity(Entity),

    #[error("Entity {entity:?} has no {component} component")]
    MissingComponent {
        entity: Entity,
        component: &'static str,
    },

    #[error("No current camera")]
    NoCamera,

    #[error("Entity {entity:?} already has a {component} component")]
    DuplicateComponent {
        entity: Entity,
        component: &'static str,
    },
}

impl Error {
    /// Map a registry lookup failure for `component` on `entity`.
    pub fn from_component(entity: Entity, component: &'static str, err: hecs::ComponentError) -> Self {
        match err {
            hecs::ComponentError::NoSuchEntity => Error::NoSuchEntity(entity),
            hecs::ComponentError::MissingComponent(_) => Error::MissingComponent { entity, component },
        }
    }
}
