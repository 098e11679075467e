//! Voxel component API: attach, replace and detach voxel payloads

use std::sync::Arc;

use hecs::Entity;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::entity::VoxelComponent;
use crate::event::{
    VoxelComponentEvent, VoxelContentChange, VoxelContentEvent, VoxelLifecycle,
};
use crate::voxel::VoxelData;
use super::Engine;

impl Engine {
    /// Attach `voxel_data` to an entity with a transform and publish
    /// `OnVoxelDataCreation`
    pub fn add_voxel_component(&mut self, entity: Entity, voxel_data: VoxelData) -> Result<()> {
        let pose = self.transform(entity)?.pose();
        let voxel_data = Arc::new(voxel_data);
        {
            let mut registry = self.registry.borrow_mut();
            if registry.get::<&VoxelComponent>(entity).is_ok() {
                return Err(Error::DuplicateComponent {
                    entity,
                    component: "VoxelComponent",
                });
            }
            let mut component = VoxelComponent::new(Arc::clone(&voxel_data));
            component.last_pose = pose;
            registry
                .insert_one(entity, component)
                .map_err(|_| Error::NoSuchEntity(entity))?;
        }

        let event = VoxelLifecycle {
            entity,
            voxel_data,
            pose,
        };
        self.voxel_component_events
            .publish(VoxelComponentEvent::OnVoxelDataCreation, &event)
    }

    /// Detach the voxel payload, publish `OnVoxelDataDestruction` and return the data
    pub fn remove_voxel_component(&mut self, entity: Entity) -> Result<Arc<VoxelData>> {
        let component = self
            .registry
            .borrow_mut()
            .remove_one::<VoxelComponent>(entity)
            .map_err(Self::component_error(entity, "VoxelComponent"))?;

        let event = VoxelLifecycle {
            entity,
            voxel_data: component.voxel_data,
            pose: component.last_pose,
        };
        self.voxel_component_events
            .publish(VoxelComponentEvent::OnVoxelDataDestruction, &event)?;
        Ok(event.voxel_data)
    }

    pub fn has_voxel_component(&self, entity: Entity) -> bool {
        self.registry
            .borrow()
            .entity(entity)
            .is_ok_and(|e| e.has::<VoxelComponent>())
    }

    pub fn voxel_data(&self, entity: Entity) -> Result<Arc<VoxelData>> {
        let registry = self.registry.borrow();
        let voxel = registry
            .get::<&VoxelComponent>(entity)
            .map_err(Self::component_error(entity, "VoxelComponent"))?;
        Ok(Arc::clone(&voxel.voxel_data))
    }

    /// Replace an object's contents.
    ///
    /// `OnVoxelDataChange` is published while the component still holds the
    /// old data; the component is updated afterwards even if a listener failed,
    /// since the world already reflects the new contents.
    pub fn set_voxel_data(&mut self, entity: Entity, voxel_data: VoxelData) -> Result<()> {
        let old_voxel_data = self.voxel_data(entity)?;
        let pose = self.transform(entity)?.pose();

        let new_voxel_data = Arc::new(voxel_data);
        let change = VoxelContentChange {
            entity,
            old_voxel_data,
            new_voxel_data: Arc::clone(&new_voxel_data),
            pose,
        };
        let published = self
            .voxel_content_events
            .publish(VoxelContentEvent::OnVoxelDataChange, &change);

        let registry = self.registry.borrow();
        let mut voxel = registry
            .get::<&mut VoxelComponent>(entity)
            .map_err(Self::component_error(entity, "VoxelComponent"))?;
        voxel.voxel_data = new_voxel_data;
        published
    }

    /// Copy the current contents, let `edit` mutate the copy, then apply it
    /// through [`Engine::set_voxel_data`]
    pub fn edit_voxel_data<F, R>(&mut self, entity: Entity, edit: F) -> Result<R>
    where
        F: FnOnce(&mut VoxelData) -> Result<R>,
    {
        let mut voxel_data = (*self.voxel_data(entity)?).clone();
        let output = edit(&mut voxel_data)?;
        self.set_voxel_data(entity, voxel_data)?;
        Ok(output)
    }

    /// Flag an object for the next reconciliation pass
    pub fn mark_needs_update(&mut self, entity: Entity) -> Result<()> {
        let registry = self.registry.borrow();
        let mut voxel = registry
            .get::<&mut VoxelComponent>(entity)
            .map_err(Self::component_error(entity, "VoxelComponent"))?;
        voxel.needs_update = true;
        Ok(())
    }

    /// Subscribe to voxel payload creation and destruction
    pub fn subscribe_voxel_component<F>(&mut self, kind: VoxelComponentEvent, listener: F)
    where
        F: FnMut(VoxelComponentEvent, &VoxelLifecycle) -> Result<()> + 'static,
    {
        self.voxel_component_events.subscribe(kind, listener);
    }

    /// Subscribe to voxel content replacement
    pub fn subscribe_voxel_content<F>(&mut self, kind: VoxelContentEvent, listener: F)
    where
        F: FnMut(VoxelContentEvent, &VoxelContentChange) -> Result<()> + 'static,
    {
        self.voxel_content_events.subscribe(kind, listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{IVec3, Quat, UVec3, Vec3};
    use crate::engine::tests::engine;
    use crate::entity::Transform;
    use crate::voxel::VoxelWorld;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn expected_world(placements: &[(&VoxelData, Vec3, Quat)]) -> Vec<u8> {
        let mut world = VoxelWorld::new(UVec3::splat(32)).unwrap();
        for (data, position, rotation) in placements {
            world.rasterize_voxel_data(*position, *rotation, data, false);
        }
        world.packed().to_vec()
    }

    #[test]
    fn test_add_voxel_component_rasterizes() {
        let (mut engine, backend) = engine();
        let transform = Transform::from_position(Vec3::new(3.0, 4.0, 5.0))
            .with_rotation(Quat::from_rotation_x(0.4));
        let entity = engine.create_entity("object", transform);
        let data = VoxelData::filled(UVec3::new(3, 2, 4), 9);
        engine.add_voxel_component(entity, data.clone()).unwrap();

        assert!(engine.has_voxel_component(entity));
        assert_eq!(*engine.voxel_data(entity).unwrap(), data);
        let state = engine.render_system().state();
        assert_eq!(
            state.world.packed(),
            &expected_world(&[(&data, transform.position, transform.rotation)])[..]
        );
        assert_eq!(backend.borrow().live_texture_count(), 2);
    }

    #[test]
    fn test_duplicate_and_missing_transform() {
        let (mut engine, _backend) = engine();
        let entity = engine.create_entity("object", Transform::default());
        let data = VoxelData::filled(UVec3::splat(2), 1);
        engine.add_voxel_component(entity, data.clone()).unwrap();
        assert!(matches!(
            engine.add_voxel_component(entity, data.clone()),
            Err(Error::DuplicateComponent { .. })
        ));

        let bare = engine.registry().borrow_mut().spawn(());
        assert!(matches!(
            engine.add_voxel_component(bare, data),
            Err(Error::MissingComponent { component: "Transform", .. })
        ));
    }

    #[test]
    fn test_set_voxel_data_swaps_contents() {
        let (mut engine, backend) = engine();
        let position = Vec3::new(8.0, 8.0, 8.0);
        let entity = engine.create_entity("object", Transform::from_position(position));
        engine
            .add_voxel_component(entity, VoxelData::filled(UVec3::splat(4), 1))
            .unwrap();
        let old_texture = engine.registry().borrow().get::<&VoxelComponent>(entity).unwrap().texture;

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        engine.subscribe_voxel_content(VoxelContentEvent::OnVoxelDataChange, move |_, change| {
            sink.borrow_mut()
                .push((change.old_voxel_data.dimensions(), change.new_voxel_data.dimensions()));
            Ok(())
        });

        let new_data = VoxelData::filled(UVec3::new(2, 6, 2), 5);
        engine.set_voxel_data(entity, new_data.clone()).unwrap();

        assert_eq!(*events.borrow(), vec![(UVec3::splat(4), UVec3::new(2, 6, 2))]);
        assert_eq!(*engine.voxel_data(entity).unwrap(), new_data);
        let state = engine.render_system().state();
        assert_eq!(
            state.world.packed(),
            &expected_world(&[(&new_data, position, Quat::IDENTITY)])[..]
        );
        let new_texture = engine.registry().borrow().get::<&VoxelComponent>(entity).unwrap().texture;
        assert_ne!(new_texture, old_texture);
        assert_eq!(backend.borrow().live_texture_count(), 2);
    }

    #[test]
    fn test_set_voxel_data_reports_missing_transform() {
        let (mut engine, _backend) = engine();
        let entity = engine.create_entity("object", Transform::default());
        engine
            .add_voxel_component(entity, VoxelData::filled(UVec3::splat(2), 1))
            .unwrap();
        engine.registry().borrow_mut().remove_one::<Transform>(entity).unwrap();

        assert!(matches!(
            engine.set_voxel_data(entity, VoxelData::filled(UVec3::ONE, 2)),
            Err(Error::MissingComponent { component: "Transform", .. })
        ));

        let bare = engine.create_entity("bare", Transform::default());
        assert!(matches!(
            engine.set_voxel_data(bare, VoxelData::filled(UVec3::ONE, 2)),
            Err(Error::MissingComponent { component: "VoxelComponent", .. })
        ));
    }

    #[test]
    fn test_edit_voxel_data() {
        let (mut engine, _backend) = engine();
        let entity = engine.create_entity("object", Transform::default());
        engine
            .add_voxel_component(entity, VoxelData::new(UVec3::splat(4)))
            .unwrap();

        let solid = engine
            .edit_voxel_data(entity, |data| {
                data.set_voxel(IVec3::new(1, 2, 3), 7)?;
                Ok(data.solid_count())
            })
            .unwrap();
        assert_eq!(solid, 1);
        assert!(engine.render_system().state().world.is_occupied(IVec3::new(1, 2, 3)));

        // A failing edit leaves the object untouched
        let result = engine.edit_voxel_data(entity, |data| data.set_voxel(IVec3::splat(9), 1));
        assert!(matches!(result, Err(Error::VoxelOutOfRange { .. })));
        assert_eq!(engine.voxel_data(entity).unwrap().solid_count(), 1);
    }

    #[test]
    fn test_remove_voxel_component_returns_data() {
        let (mut engine, backend) = engine();
        let entity = engine.create_entity("object", Transform::from_position(Vec3::splat(6.0)));
        let data = VoxelData::filled(UVec3::splat(2), 4);
        engine.add_voxel_component(entity, data.clone()).unwrap();

        let destroyed = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&destroyed);
        engine.subscribe_voxel_component(VoxelComponentEvent::OnVoxelDataDestruction, move |_, _| {
            *flag.borrow_mut() = true;
            Ok(())
        });

        let removed = engine.remove_voxel_component(entity).unwrap();
        assert_eq!(*removed, data);
        assert!(*destroyed.borrow());
        assert!(!engine.has_voxel_component(entity));
        assert_eq!(engine.render_system().state().world.occupied_count(), 0);
        assert_eq!(backend.borrow().live_texture_count(), 1);
        assert!(matches!(
            engine.remove_voxel_component(entity),
            Err(Error::MissingComponent { .. })
        ));
    }

    #[test]
    fn test_overlapping_objects_share_cells() {
        let (mut engine, _backend) = engine();
        let row = VoxelData::filled(UVec3::new(3, 1, 1), 1);
        let a = engine.create_entity("a", Transform::default());
        let b = engine.create_entity("b", Transform::from_position(Vec3::new(2.0, 0.0, 0.0)));
        engine.add_voxel_component(a, row.clone()).unwrap();
        engine.add_voxel_component(b, row.clone()).unwrap();

        engine.destroy_entity(a).unwrap();
        let state = engine.render_system().state();
        // Occupancy has no ownership: the cell both objects covered is cleared too
        assert!(!state.world.is_occupied(IVec3::new(2, 0, 0)));
        assert!(state.world.is_occupied(IVec3::new(3, 0, 0)));
        assert!(state.world.is_occupied(IVec3::new(4, 0, 0)));
    }

    #[test]
    fn test_mark_needs_update_reconciles_next_frame() {
        let (mut engine, _backend) = engine();
        let entity = engine.create_entity("object", Transform::default());
        engine
            .add_voxel_component(entity, VoxelData::filled(UVec3::splat(2), 1))
            .unwrap();

        // Write the transform behind the engine's back, then flag it
        engine
            .registry()
            .borrow_mut()
            .get::<&mut Transform>(entity)
            .unwrap()
            .position = Vec3::splat(20.0);
        engine.mark_needs_update(entity).unwrap();
        assert_eq!(engine.frame().unwrap().reconciled, 1);
        assert!(engine.render_system().state().world.is_occupied(IVec3::splat(21)));
    }
}
