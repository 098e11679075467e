//! The four event categories published by the engine

use std::sync::Arc;

use hecs::Entity;

use crate::entity::{Pose, Transform};
use crate::voxel::VoxelData;
use super::manager::{EventCategory, EventManager};

/// Window and engine-level events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    OnWindowResize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowResize {
    pub width: u32,
    pub height: u32,
}

pub struct EngineEvents;

impl EventCategory for EngineEvents {
    type Kind = EngineEvent;
    type Payload = WindowResize;
}

/// Entity transform events
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    OnTransformChange,
}

/// Published after the new transform has been written to the registry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformChange {
    pub entity: Entity,
    pub transform: Transform,
    pub old_transform: Transform,
}

pub struct EntityEvents;

impl EventCategory for EntityEvents {
    type Kind = EntityEvent;
    type Payload = TransformChange;
}

/// Attach and detach of a voxel payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelComponentEvent {
    /// Published after the component has been attached
    OnVoxelDataCreation,
    /// Published after the component has been detached
    OnVoxelDataDestruction,
}

#[derive(Clone, Debug)]
pub struct VoxelLifecycle {
    pub entity: Entity,
    pub voxel_data: Arc<VoxelData>,
    /// Current pose on creation, last rasterized pose on destruction
    pub pose: Pose,
}

pub struct VoxelComponentEvents;

impl EventCategory for VoxelComponentEvents {
    type Kind = VoxelComponentEvent;
    type Payload = VoxelLifecycle;
}

/// Replacement of a voxel payload's contents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VoxelContentEvent {
    /// Published before the component holds the new data
    OnVoxelDataChange,
}

#[derive(Clone, Debug)]
pub struct VoxelContentChange {
    pub entity: Entity,
    pub old_voxel_data: Arc<VoxelData>,
    pub new_voxel_data: Arc<VoxelData>,
    /// Current transform pose of the entity
    pub pose: Pose,
}

pub struct VoxelContentEvents;

impl EventCategory for VoxelContentEvents {
    type Kind = VoxelContentEvent;
    type Payload = VoxelContentChange;
}

pub type EngineEventManager = EventManager<EngineEvents>;
pub type EntityEventManager = EventManager<EntityEvents>;
pub type VoxelComponentEventManager = EventManager<VoxelComponentEvents>;
pub type VoxelContentEventManager = EventManager<VoxelContentEvents>;
