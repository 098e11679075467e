//! Per-frame render loop over the voxel world and placed objects

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use hecs::Entity;

use crate::core::config::EngineConfig;
use crate::core::types::{Mat4, Result, UVec2, Vec3};
use crate::entity::{SharedRegistry, Transform, VoxelComponent};
use crate::event::{
    EngineEvent, EngineEventManager, EntityEvent, EntityEventManager, VoxelComponentEvent,
    VoxelComponentEventManager, VoxelContentEvent, VoxelContentEventManager,
};
use crate::voxel::VoxelWorld;
use super::draw_order::{draw_order, update_distances};
use super::gpu::{GpuTexture, LightingParams, ObjectDrawParams, SharedBackend, TextureId};
use super::sync;

/// State mutated by the render system's event listeners
pub struct RenderState {
    pub world: VoxelWorld,
    /// Per-object textures, freed when removed or replaced
    pub textures: HashMap<Entity, GpuTexture>,
    pub backend: SharedBackend,
    pub resolution: UVec2,
    pub sun_position: Vec3,
}

/// Statistics for one rendered frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Objects moved by the reconciliation pass
    pub reconciled: usize,
    /// Packed bytes pushed to the world texture
    pub uploaded_bytes: usize,
    pub objects_drawn: usize,
}

/// Owns the voxel world and draws every voxel object once per frame
pub struct RenderSystem {
    state: Rc<RefCell<RenderState>>,
    registry: SharedRegistry,
}

impl RenderSystem {
    /// Create the voxel world and its GPU mirror
    pub fn new(config: &EngineConfig, backend: SharedBackend, registry: SharedRegistry) -> Result<Self> {
        let world = VoxelWorld::with_gpu_mirror(config.world_dimensions(), &backend)?;
        let state = RenderState {
            world,
            textures: HashMap::new(),
            backend,
            resolution: UVec2::new(config.window_width, config.window_height),
            sun_position: config.sun_position(),
        };

        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            registry,
        })
    }

    /// Subscribe the synchronization listeners. Call once per bus.
    pub fn register(
        &self,
        engine_events: &mut EngineEventManager,
        entity_events: &mut EntityEventManager,
        voxel_component_events: &mut VoxelComponentEventManager,
        voxel_content_events: &mut VoxelContentEventManager,
    ) {
        let state = Rc::clone(&self.state);
        engine_events.subscribe(EngineEvent::OnWindowResize, move |_, resize| {
            state.borrow_mut().resolution = UVec2::new(resize.width, resize.height);
            Ok(())
        });

        let (state, registry) = (Rc::clone(&self.state), Rc::clone(&self.registry));
        entity_events.subscribe(EntityEvent::OnTransformChange, move |_, change| {
            sync::on_transform_changed(&mut state.borrow_mut(), &mut registry.borrow_mut(), change)
        });

        for kind in [
            VoxelComponentEvent::OnVoxelDataCreation,
            VoxelComponentEvent::OnVoxelDataDestruction,
        ] {
            let (state, registry) = (Rc::clone(&self.state), Rc::clone(&self.registry));
            voxel_component_events.subscribe(kind, move |kind, lifecycle| {
                let mut state = state.borrow_mut();
                match kind {
                    VoxelComponentEvent::OnVoxelDataCreation => {
                        sync::on_voxel_created(&mut state, &mut registry.borrow_mut(), lifecycle)
                    }
                    VoxelComponentEvent::OnVoxelDataDestruction => {
                        sync::on_voxel_destroyed(&mut state, lifecycle)
                    }
                }
            });
        }

        let (state, registry) = (Rc::clone(&self.state), Rc::clone(&self.registry));
        voxel_content_events.subscribe(VoxelContentEvent::OnVoxelDataChange, move |_, change| {
            sync::on_voxel_content_changed(&mut state.borrow_mut(), &mut registry.borrow_mut(), change)
        });

        log::debug!("Render system listeners registered");
    }

    pub fn state(&self) -> Ref<'_, RenderState> {
        self.state.borrow()
    }

    pub fn world_texture(&self) -> Option<TextureId> {
        self.state.borrow().world.texture()
    }

    /// Render one frame seen from `viewer`.
    ///
    /// Order: reconcile flagged objects, refresh distances, upload the
    /// world's dirty region, draw objects nearest first with a barrier after
    /// each, then run the lighting pass over the world texture.
    pub fn update(&mut self, viewer: Vec3, view_projection: Mat4) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        let mut state = self.state.borrow_mut();
        let state = &mut *state;
        let resolution = state.resolution.as_vec2();

        let draws: Vec<(TextureId, ObjectDrawParams)> = {
            let mut registry = self.registry.borrow_mut();
            stats.reconciled = sync::reconcile(&mut registry, &mut state.world);
            update_distances(&mut registry, viewer);

            draw_order(&registry)
                .into_iter()
                .filter_map(|entity| {
                    let mut query = registry
                        .query_one::<(&Transform, &VoxelComponent)>(entity)
                        .ok()?;
                    let (transform, voxel) = query.get()?;
                    let texture = voxel.texture?;
                    let params = ObjectDrawParams::new(
                        transform.position,
                        transform.rotation,
                        voxel.voxel_data.dimensions().as_vec3(),
                        view_projection,
                        resolution,
                    );
                    Some((texture, params))
                })
                .collect()
        };

        if let Some(region) = state.world.sync()? {
            stats.uploaded_bytes = region.volume();
        }

        let mut backend = state.backend.borrow_mut();
        for (texture, params) in &draws {
            backend.draw_voxel_object(*texture, params);
            backend.texture_barrier();
        }
        stats.objects_drawn = draws.len();

        if let Some(world_texture) = state.world.texture() {
            let dims = state.world.dimensions().as_vec3();
            let lighting = LightingParams {
                inv_view_projection: view_projection.inverse().to_cols_array_2d(),
                sun_position: state.sun_position.extend(1.0).to_array(),
                world_dimensions: dims.extend(0.0).to_array(),
                inv_resolution: [1.0 / resolution.x.max(1.0), 1.0 / resolution.y.max(1.0), 0.0, 0.0],
            };
            backend.draw_world_lighting(world_texture, &lighting);
        }

        log::trace!(
            "Frame: {} reconciled, {} bytes uploaded, {} objects drawn",
            stats.reconciled,
            stats.uploaded_bytes,
            stats.objects_drawn
        );
        Ok(stats)
    }
}
