//! Entity API: naming, transforms and transform events

use hecs::Entity;

use crate::core::error::Error;
use crate::core::types::{Quat, Result, Vec3};
use crate::entity::{Name, Transform, VoxelComponent};
use crate::event::{EntityEvent, TransformChange};
use super::Engine;

impl Engine {
    pub fn create_entity(&mut self, name: &str, transform: Transform) -> Entity {
        let entity = self
            .registry
            .borrow_mut()
            .spawn((Name(name.to_string()), transform));
        log::debug!("Created entity {:?} '{}'", entity, name);
        entity
    }

    /// Detach any voxel payload (publishing its destruction), then despawn.
    ///
    /// The entity is despawned even when a destruction listener fails; the
    /// listener's error is returned afterwards.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<()> {
        let detached = if self.has_voxel_component(entity) {
            self.remove_voxel_component(entity).map(drop)
        } else {
            Ok(())
        };
        self.registry
            .borrow_mut()
            .despawn(entity)
            .map_err(|_| Error::NoSuchEntity(entity))?;
        if self.current_camera == Some(entity) {
            self.current_camera = None;
        }
        log::debug!("Destroyed entity {:?}", entity);
        detached
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.registry.borrow().contains(entity)
    }

    pub fn first_with_name(&self, name: &str) -> Option<Entity> {
        self.registry
            .borrow()
            .query::<&Name>()
            .iter()
            .find(|(_, n)| n.0 == name)
            .map(|(entity, _)| entity)
    }

    pub fn name(&self, entity: Entity) -> Result<String> {
        let registry = self.registry.borrow();
        let name = registry
            .get::<&Name>(entity)
            .map_err(Self::component_error(entity, "Name"))?;
        Ok(name.0.clone())
    }

    pub fn set_name(&mut self, entity: Entity, name: &str) -> Result<()> {
        self.registry
            .borrow_mut()
            .insert_one(entity, Name(name.to_string()))
            .map_err(|_| Error::NoSuchEntity(entity))
    }

    pub fn transform(&self, entity: Entity) -> Result<Transform> {
        let registry = self.registry.borrow();
        let transform = registry
            .get::<&Transform>(entity)
            .map_err(Self::component_error(entity, "Transform"))?;
        Ok(*transform)
    }

    pub fn set_position(&mut self, entity: Entity, position: Vec3) -> Result<()> {
        let transform = Transform {
            position,
            ..self.transform(entity)?
        };
        self.set_transform(entity, transform)
    }

    pub fn set_rotation(&mut self, entity: Entity, rotation: Quat) -> Result<()> {
        let transform = Transform {
            rotation,
            ..self.transform(entity)?
        };
        self.set_transform(entity, transform)
    }

    /// Write the transform, then publish `OnTransformChange` with old and new values
    pub fn set_transform(&mut self, entity: Entity, transform: Transform) -> Result<()> {
        let old_transform = self.replace_transform(entity, transform)?;
        let change = TransformChange {
            entity,
            transform,
            old_transform,
        };
        self.entity_events.publish(EntityEvent::OnTransformChange, &change)
    }

    /// Scale is kept on the transform only; it publishes nothing and does
    /// not affect the voxel world
    pub fn set_scale(&mut self, entity: Entity, scale: Vec3) -> Result<()> {
        let registry = self.registry.borrow_mut();
        let mut transform = registry
            .get::<&mut Transform>(entity)
            .map_err(Self::component_error(entity, "Transform"))?;
        transform.scale = scale;
        Ok(())
    }

    /// Write many transforms without publishing events.
    ///
    /// Voxel objects among them are flagged and moved by the next frame's
    /// reconciliation pass.
    pub fn set_transforms_batched<I>(&mut self, transforms: I) -> Result<()>
    where
        I: IntoIterator<Item = (Entity, Transform)>,
    {
        let mut registry = self.registry.borrow_mut();
        let mut count = 0;
        for (entity, transform) in transforms {
            let (current, voxel) = registry
                .query_one_mut::<(&mut Transform, Option<&mut VoxelComponent>)>(entity)
                .map_err(|err| match err {
                    hecs::QueryOneError::NoSuchEntity => Error::NoSuchEntity(entity),
                    hecs::QueryOneError::Unsatisfied => Error::MissingComponent {
                        entity,
                        component: "Transform",
                    },
                })?;
            *current = transform;
            if let Some(voxel) = voxel {
                voxel.needs_update = true;
            }
            count += 1;
        }
        log::trace!("Batched {} transform writes", count);
        Ok(())
    }

    /// Subscribe to entity transform events
    pub fn subscribe_entity<F>(&mut self, kind: EntityEvent, listener: F)
    where
        F: FnMut(EntityEvent, &TransformChange) -> Result<()> + 'static,
    {
        self.entity_events.subscribe(kind, listener);
    }

    fn replace_transform(&mut self, entity: Entity, transform: Transform) -> Result<Transform> {
        let registry = self.registry.borrow_mut();
        let mut current = registry
            .get::<&mut Transform>(entity)
            .map_err(Self::component_error(entity, "Transform"))?;
        Ok(std::mem::replace(&mut *current, transform))
    }
}
