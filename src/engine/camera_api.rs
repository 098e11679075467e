//! Camera API: camera components and the current viewpoint

use hecs::Entity;

use crate::core::camera::{view_matrix, CameraComponent};
use crate::core::error::Error;
use crate::core::types::{Mat4, Result, Vec3};
use crate::entity::Transform;
use super::Engine;

impl Engine {
    pub fn add_camera_component(&mut self, entity: Entity, camera: CameraComponent) -> Result<()> {
        let mut registry = self.registry.borrow_mut();
        if registry.get::<&CameraComponent>(entity).is_ok() {
            return Err(Error::DuplicateComponent {
                entity,
                component: "CameraComponent",
            });
        }
        registry
            .insert_one(entity, camera)
            .map_err(|_| Error::NoSuchEntity(entity))
    }

    /// Make `entity` the viewpoint of subsequent frames
    pub fn set_current_camera(&mut self, entity: Entity) -> Result<()> {
        self.camera(entity)?;
        self.current_camera = Some(entity);
        log::debug!("Current camera set to {:?}", entity);
        Ok(())
    }

    pub fn current_camera(&self) -> Option<Entity> {
        self.current_camera
    }

    pub fn camera(&self, entity: Entity) -> Result<CameraComponent> {
        let registry = self.registry.borrow();
        let camera = registry
            .get::<&CameraComponent>(entity)
            .map_err(Self::component_error(entity, "CameraComponent"))?;
        Ok(*camera)
    }

    /// Projection * view of the current camera
    pub fn view_projection(&self) -> Result<Mat4> {
        Ok(self.camera_view()?.1)
    }

    pub(super) fn with_camera_mut<R>(
        &mut self,
        entity: Entity,
        f: impl FnOnce(&mut CameraComponent) -> R,
    ) -> Result<R> {
        let registry = self.registry.borrow();
        let mut camera = registry
            .get::<&mut CameraComponent>(entity)
            .map_err(Self::component_error(entity, "CameraComponent"))?;
        Ok(f(&mut *camera))
    }

    /// Viewer position and view-projection of the current camera
    pub(super) fn camera_view(&self) -> Result<(Vec3, Mat4)> {
        let entity = self.current_camera.ok_or(Error::NoCamera)?;
        let registry = self.registry.borrow();
        let mut query = registry
            .query_one::<(&Transform, &CameraComponent)>(entity)
            .map_err(|_| Error::NoSuchEntity(entity))?;
        let (transform, camera) = query.get().ok_or(Error::MissingComponent {
            entity,
            component: "CameraComponent",
        })?;

        let view = view_matrix(transform.position, transform.rotation);
        Ok((transform.position, camera.projection_matrix() * view))
    }

    /// Create a default camera when there is no usable current camera
    pub(super) fn ensure_camera(&mut self) -> Result<()> {
        let usable = self.current_camera.is_some_and(|entity| {
            self.registry
                .borrow()
                .query_one::<(&Transform, &CameraComponent)>(entity)
                .is_ok_and(|mut query| query.get().is_some())
        });
        if usable {
            return Ok(());
        }

        log::warn!("No camera found. Creating a default one.");
        let entity = self.create_entity("default_camera", Transform::default());
        let mut camera = CameraComponent::default();
        camera.set_aspect(self.resolution.x, self.resolution.y);
        self.add_camera_component(entity, camera)?;
        self.set_current_camera(entity)
    }
}
