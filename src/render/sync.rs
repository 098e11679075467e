//! Keeps the voxel world and object textures in step with the registry
//!
//! Each handler removes the footprint recorded in `last_pose` before adding
//! the new one, so the world only ever changes along the two footprints
//! involved.

use crate::core::types::Result;
use crate::entity::{Pose, Registry, Transform, VoxelComponent};
use crate::event::{TransformChange, VoxelContentChange, VoxelLifecycle};
use crate::render::gpu::GpuTexture;
use crate::voxel::{VoxelData, VoxelWorld};
use super::system::RenderState;

fn move_footprint(world: &mut VoxelWorld, data: &VoxelData, from: &Pose, to: &Pose) {
    world.rasterize_voxel_data(from.position, from.rotation, data, true);
    world.rasterize_voxel_data(to.position, to.rotation, data, false);
}

/// Rasterize a newly attached payload and upload its texture
pub fn on_voxel_created(state: &mut RenderState, registry: &mut Registry, event: &VoxelLifecycle) -> Result<()> {
    let pose = event.pose;
    state
        .world
        .rasterize_voxel_data(pose.position, pose.rotation, &event.voxel_data, false);

    if let Ok(mut voxel) = registry.get::<&mut VoxelComponent>(event.entity) {
        voxel.last_pose = pose;
        voxel.needs_update = false;
    }

    let texture = GpuTexture::for_voxel_data(&state.backend, &event.voxel_data)?;
    let id = texture.id();
    state.textures.insert(event.entity, texture);
    if let Ok(mut voxel) = registry.get::<&mut VoxelComponent>(event.entity) {
        voxel.texture = Some(id);
    }

    log::debug!("Voxel object {:?} created with texture {:?}", event.entity, id);
    Ok(())
}

/// Remove a detached payload's footprint and free its texture
pub fn on_voxel_destroyed(state: &mut RenderState, event: &VoxelLifecycle) -> Result<()> {
    let pose = event.pose;
    state
        .world
        .rasterize_voxel_data(pose.position, pose.rotation, &event.voxel_data, true);

    if state.textures.remove(&event.entity).is_none() {
        log::warn!("Voxel object {:?} destroyed without a texture", event.entity);
    }
    log::debug!("Voxel object {:?} destroyed", event.entity);
    Ok(())
}

/// Swap the old contents' footprint and texture for the new contents'.
///
/// Runs while the component still holds the old data.
pub fn on_voxel_content_changed(
    state: &mut RenderState,
    registry: &mut Registry,
    event: &VoxelContentChange,
) -> Result<()> {
    let last_pose = registry
        .get::<&VoxelComponent>(event.entity)
        .map(|voxel| voxel.last_pose)
        .unwrap_or(event.pose);

    state.world.rasterize_voxel_data(
        last_pose.position,
        last_pose.rotation,
        &event.old_voxel_data,
        true,
    );
    state.world.rasterize_voxel_data(
        event.pose.position,
        event.pose.rotation,
        &event.new_voxel_data,
        false,
    );

    // Free the old texture before allocating its replacement
    state.textures.remove(&event.entity);
    let texture = GpuTexture::for_voxel_data(&state.backend, &event.new_voxel_data);

    if let Ok(mut voxel) = registry.get::<&mut VoxelComponent>(event.entity) {
        voxel.last_pose = event.pose;
        voxel.needs_update = false;
        voxel.texture = texture.as_ref().ok().map(GpuTexture::id);
    }

    let texture = texture?;
    log::debug!(
        "Voxel object {:?} content changed, texture {:?} ({} solid voxels)",
        event.entity,
        texture.id(),
        event.new_voxel_data.solid_count()
    );
    state.textures.insert(event.entity, texture);
    Ok(())
}

/// Move a voxel object's footprint to its new transform
pub fn on_transform_changed(
    state: &mut RenderState,
    registry: &mut Registry,
    event: &TransformChange,
) -> Result<()> {
    let Ok(mut voxel) = registry.get::<&mut VoxelComponent>(event.entity) else {
        return Ok(());
    };

    let pose = event.transform.pose();
    move_footprint(&mut state.world, &voxel.voxel_data, &voxel.last_pose, &pose);
    voxel.last_pose = pose;
    voxel.needs_update = false;
    Ok(())
}

/// Move every object flagged `needs_update` to its current transform.
///
/// Returns the number of objects moved.
pub fn reconcile(registry: &mut Registry, world: &mut VoxelWorld) -> usize {
    let mut moved = 0;
    for (_, (transform, voxel)) in registry.query_mut::<(&Transform, &mut VoxelComponent)>() {
        if !voxel.needs_update {
            continue;
        }
        let pose = transform.pose();
        move_footprint(world, &voxel.voxel_data, &voxel.last_pose, &pose);
        voxel.last_pose = pose;
        voxel.needs_update = false;
        moved += 1;
    }
    if moved > 0 {
        log::trace!("Reconciled {} voxel objects", moved);
    }
    moved
}
