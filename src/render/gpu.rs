//! GPU backend interface and scoped texture ownership

use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::core::types::{Mat4, Result, UVec3, Vec2, Vec3};
use crate::voxel::VoxelData;

/// Opaque handle to a backend texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Per-object uniform block for the voxel object pass (std140 compatible)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ObjectDrawParams {
    pub model_matrix: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    /// Inverse of view-projection * translation * rotation
    pub inv_world_matrix: [[f32; 4]; 4],
    pub min_box: [f32; 4],
    pub max_box: [f32; 4],
    /// Object size in voxels (xyz)
    pub size: [f32; 4],
    /// 1 / render resolution (xy)
    pub inv_resolution: [f32; 4],
}

impl ObjectDrawParams {
    /// Build the uniform block for an object of `size` voxels placed at
    /// `position` with `rotation`. The rotation pivots on the min corner,
    /// matching the rasterization into the world grid.
    pub fn new(
        position: Vec3,
        rotation: glam::Quat,
        size: Vec3,
        view_projection: Mat4,
        resolution: Vec2,
    ) -> Self {
        let translate = Mat4::from_translation(position);
        let rotate = Mat4::from_quat(rotation);
        let model = translate * rotate * Mat4::from_scale(size);
        let inv_world = (view_projection * translate * rotate).inverse();
        let max_box = position + size;

        Self {
            model_matrix: model.to_cols_array_2d(),
            view_projection: view_projection.to_cols_array_2d(),
            inv_world_matrix: inv_world.to_cols_array_2d(),
            min_box: position.extend(0.0).to_array(),
            max_box: max_box.extend(0.0).to_array(),
            size: size.extend(0.0).to_array(),
            inv_resolution: [1.0 / resolution.x.max(1.0), 1.0 / resolution.y.max(1.0), 0.0, 0.0],
        }
    }
}

/// Uniform block for the full-screen lighting pass that samples the world texture
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightingParams {
    pub inv_view_projection: [[f32; 4]; 4],
    pub sun_position: [f32; 4],
    /// Full-resolution world dimensions (xyz)
    pub world_dimensions: [f32; 4],
    pub inv_resolution: [f32; 4],
}

/// Operations the renderer needs from the graphics API.
///
/// Voxel volumes are single-channel, one byte per texel, laid out x-fastest.
pub trait GpuBackend {
    /// Allocate a 3-D texture of `dims` texels initialised from `bytes`
    fn create_volume_texture(&mut self, label: &str, bytes: &[u8], dims: UVec3) -> Result<TextureId>;

    /// Overwrite the box at `offset` of size `dims` with tightly packed `bytes`
    fn upload_volume_subregion(
        &mut self,
        texture: TextureId,
        bytes: &[u8],
        offset: UVec3,
        dims: UVec3,
    ) -> Result<()>;

    fn delete_texture(&mut self, texture: TextureId);

    /// Allocate the per-object material texture for `voxel_data`
    fn create_voxel_object_texture(&mut self, voxel_data: &VoxelData) -> Result<TextureId> {
        self.create_volume_texture("voxel_object", voxel_data.as_bytes(), voxel_data.dimensions())
    }

    /// Draw one voxel object; later draws may read what this one wrote
    fn draw_voxel_object(&mut self, texture: TextureId, params: &ObjectDrawParams);

    /// Make writes of the previous draw visible to the next one
    fn texture_barrier(&mut self);

    /// Composite pass reading the synced world occupancy texture
    fn draw_world_lighting(&mut self, world_texture: TextureId, params: &LightingParams);
}

/// Backend shared between the world mirror, object textures and the render loop
pub type SharedBackend = Rc<RefCell<dyn GpuBackend>>;

/// Owns a backend texture and deletes it when dropped
pub struct GpuTexture {
    id: TextureId,
    dimensions: UVec3,
    backend: SharedBackend,
}

impl GpuTexture {
    pub fn new_volume(backend: &SharedBackend, label: &str, bytes: &[u8], dims: UVec3) -> Result<Self> {
        let id = backend.borrow_mut().create_volume_texture(label, bytes, dims)?;
        Ok(Self {
            id,
            dimensions: dims,
            backend: Rc::clone(backend),
        })
    }

    pub fn for_voxel_data(backend: &SharedBackend, voxel_data: &VoxelData) -> Result<Self> {
        let id = backend.borrow_mut().create_voxel_object_texture(voxel_data)?;
        Ok(Self {
            id,
            dimensions: voxel_data.dimensions(),
            backend: Rc::clone(backend),
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn upload_subregion(&self, bytes: &[u8], offset: UVec3, dims: UVec3) -> Result<()> {
        self.backend
            .borrow_mut()
            .upload_volume_subregion(self.id, bytes, offset, dims)
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        match self.backend.try_borrow_mut() {
            Ok(mut backend) => backend.delete_texture(self.id),
            Err(_) => log::warn!("GPU backend busy, leaking texture {:?}", self.id),
        }
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuTexture")
            .field("id", &self.id)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBackend;

    #[test]
    fn test_uniform_sizes() {
        assert_eq!(std::mem::size_of::<ObjectDrawParams>(), 3 * 64 + 4 * 16);
        assert_eq!(std::mem::size_of::<LightingParams>(), 64 + 3 * 16);
    }

    #[test]
    fn test_draw_params_box() {
        let params = ObjectDrawParams::new(
            Vec3::new(1.0, 2.0, 3.0),
            glam::Quat::IDENTITY,
            Vec3::new(4.0, 5.0, 6.0),
            Mat4::IDENTITY,
            Vec2::new(200.0, 100.0),
        );
        assert_eq!(params.min_box, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(params.max_box, [5.0, 7.0, 9.0, 0.0]);
        assert_eq!(params.inv_resolution[..2], [0.005, 0.01]);
        // Model matrix maps the unit cube corner onto the max corner
        let model = Mat4::from_cols_array_2d(&params.model_matrix);
        assert!((model.transform_point3(Vec3::ONE) - Vec3::new(5.0, 7.0, 9.0)).length() < 1e-5);
    }

    #[test]
    fn test_texture_deleted_on_drop() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();

        let data = VoxelData::filled(UVec3::splat(2), 1);
        let texture = GpuTexture::for_voxel_data(&shared, &data).unwrap();
        let id = texture.id();
        assert_eq!(texture.dimensions(), UVec3::splat(2));
        assert!(backend.borrow().texture_bytes(id).is_some());

        drop(texture);
        assert!(backend.borrow().texture_bytes(id).is_none());
        assert_eq!(backend.borrow().live_texture_count(), 0);
    }

    #[test]
    fn test_failed_allocation_returns_error() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        backend.borrow_mut().set_fail_allocations(true);
        let shared: SharedBackend = backend.clone();

        let result = GpuTexture::new_volume(&shared, "test", &[0; 8], UVec3::splat(2));
        assert!(matches!(result, Err(crate::core::Error::Gpu(_))));
        assert_eq!(backend.borrow().live_texture_count(), 0);
    }
}
