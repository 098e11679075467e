//! GPU backend over wgpu

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use super::gpu::{GpuBackend, LightingParams, ObjectDrawParams, TextureId};

/// A draw submission queued for the frame's render pipeline
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameDraw {
    Object { texture: TextureId, params: ObjectDrawParams },
    Barrier,
    Lighting { world_texture: TextureId, params: LightingParams },
}

/// wgpu-backed texture store.
///
/// Voxel volumes become 3-D `R8Uint` textures. Draws are not encoded here:
/// they are queued as uniform blocks and drained by the application's
/// pipeline with [`WgpuBackend::take_frame_draws`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    textures: HashMap<TextureId, wgpu::Texture>,
    next_id: u32,
    frame_draws: Vec<FrameDraw>,
}

impl WgpuBackend {
    /// Create a backend on its own device, without a surface
    pub fn new_headless() -> Result<Self> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::Gpu(format!("No suitable adapter found: {:?}", e)))?;

        let info = adapter.get_info();
        log::info!("Using adapter {} ({:?})", info.name, info.backend);

        let device_desc = wgpu::DeviceDescriptor {
            label: Some("voxlume_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: Default::default(),
        };

        let (device, queue) = adapter
            .request_device(&device_desc)
            .await
            .map_err(|e| Error::Gpu(e.to_string()))?;

        Ok(Self::from_device(device, queue))
    }

    /// Wrap a device and queue owned by the application
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            textures: HashMap::new(),
            next_id: 0,
            frame_draws: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn texture(&self, texture: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(&texture)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Drain the draws submitted since the last call, in submission order
    pub fn take_frame_draws(&mut self) -> Vec<FrameDraw> {
        std::mem::take(&mut self.frame_draws)
    }

    fn write_region(&self, texture: &wgpu::Texture, bytes: &[u8], offset: UVec3, dims: UVec3) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: offset.x,
                    y: offset.y,
                    z: offset.z,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                // One byte per texel
                bytes_per_row: Some(dims.x),
                rows_per_image: Some(dims.y),
            },
            extent(dims),
        );
    }
}

fn extent(dims: UVec3) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: dims.x,
        height: dims.y,
        depth_or_array_layers: dims.z,
    }
}

fn volume(dims: UVec3) -> usize {
    dims.x as usize * dims.y as usize * dims.z as usize
}

impl GpuBackend for WgpuBackend {
    fn create_volume_texture(&mut self, label: &str, bytes: &[u8], dims: UVec3) -> Result<TextureId> {
        if bytes.len() != volume(dims) {
            return Err(Error::Gpu(format!(
                "texture '{label}' expects {} bytes, got {}",
                volume(dims),
                bytes.len()
            )));
        }
        let max = self.device.limits().max_texture_dimension_3d;
        if dims.max_element() > max || dims.min_element() == 0 {
            return Err(Error::Gpu(format!("texture '{label}' size {dims} outside 1..={max}")));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(dims),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Uint,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.write_region(&texture, bytes, UVec3::ZERO, dims);

        self.next_id += 1;
        let id = TextureId(self.next_id);
        log::debug!("Created volume texture '{}' {:?} ({} KB)", label, id, bytes.len() / 1024);
        self.textures.insert(id, texture);
        Ok(id)
    }

    fn upload_volume_subregion(
        &mut self,
        texture: TextureId,
        bytes: &[u8],
        offset: UVec3,
        dims: UVec3,
    ) -> Result<()> {
        let target = self
            .textures
            .get(&texture)
            .ok_or_else(|| Error::Gpu(format!("upload to unknown texture {texture:?}")))?;
        if bytes.len() != volume(dims) {
            return Err(Error::Gpu("upload byte count does not match region".to_string()));
        }
        let size = UVec3::new(target.width(), target.height(), target.depth_or_array_layers());
        if (offset + dims).cmpgt(size).any() {
            return Err(Error::Gpu(format!("upload {offset}+{dims} exceeds texture size {size}")));
        }

        self.write_region(target, bytes, offset, dims);
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        match self.textures.remove(&texture) {
            Some(t) => t.destroy(),
            None => log::warn!("Deleting unknown texture {:?}", texture),
        }
    }

    fn draw_voxel_object(&mut self, texture: TextureId, params: &ObjectDrawParams) {
        self.frame_draws.push(FrameDraw::Object { texture, params: *params });
    }

    fn texture_barrier(&mut self) {
        self.frame_draws.push(FrameDraw::Barrier);
    }

    fn draw_world_lighting(&mut self, world_texture: TextureId, params: &LightingParams) {
        self.frame_draws.push(FrameDraw::Lighting { world_texture, params: *params });
    }
}
