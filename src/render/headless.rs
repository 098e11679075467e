//! In-memory GPU backend that records every command
//!
//! Used for tests and for running the engine without a graphics device.

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::{Result, UVec3};
use super::gpu::{GpuBackend, LightingParams, ObjectDrawParams, TextureId};

/// A command received by [`HeadlessBackend`], in submission order
#[derive(Clone, Debug, PartialEq)]
pub enum GpuCommand {
    CreateTexture { texture: TextureId, dims: UVec3 },
    Upload { texture: TextureId, offset: UVec3, dims: UVec3 },
    DeleteTexture(TextureId),
    DrawObject { texture: TextureId, params: ObjectDrawParams },
    Barrier,
    Lighting { world_texture: TextureId, params: LightingParams },
}

struct HeadlessTexture {
    dims: UVec3,
    bytes: Vec<u8>,
}

/// CPU-side texture store with a command log
#[derive(Default)]
pub struct HeadlessBackend {
    textures: HashMap<TextureId, HeadlessTexture>,
    commands: Vec<GpuCommand>,
    next_id: u32,
    fail_allocations: bool,
    fail_uploads: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following texture allocation fail (simulates exhaustion)
    pub fn set_fail_allocations(&mut self, fail: bool) {
        self.fail_allocations = fail;
    }

    /// Make every following sub-region upload fail
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn texture_bytes(&self, texture: TextureId) -> Option<&[u8]> {
        self.textures.get(&texture).map(|t| t.bytes.as_slice())
    }

    pub fn texture_dims(&self, texture: TextureId) -> Option<UVec3> {
        self.textures.get(&texture).map(|t| t.dims)
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of sub-region uploads recorded for `texture`
    pub fn upload_count(&self, texture: TextureId) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, GpuCommand::Upload { texture: t, .. } if *t == texture))
            .count()
    }

    /// Textures of the object draws recorded so far, in order
    pub fn drawn_textures(&self) -> Vec<TextureId> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                GpuCommand::DrawObject { texture, .. } => Some(*texture),
                _ => None,
            })
            .collect()
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_volume_texture(&mut self, label: &str, bytes: &[u8], dims: UVec3) -> Result<TextureId> {
        if self.fail_allocations {
            return Err(Error::Gpu(format!("out of texture memory allocating '{label}'")));
        }
        let expected = dims.x as usize * dims.y as usize * dims.z as usize;
        if bytes.len() != expected {
            return Err(Error::Gpu(format!(
                "texture '{label}' expects {expected} bytes, got {}",
                bytes.len()
            )));
        }

        self.next_id += 1;
        let texture = TextureId(self.next_id);
        self.textures.insert(texture, HeadlessTexture { dims, bytes: bytes.to_vec() });
        self.commands.push(GpuCommand::CreateTexture { texture, dims });
        Ok(texture)
    }

    fn upload_volume_subregion(
        &mut self,
        texture: TextureId,
        bytes: &[u8],
        offset: UVec3,
        dims: UVec3,
    ) -> Result<()> {
        if self.fail_uploads {
            return Err(Error::Gpu(format!("device lost uploading to {texture:?}")));
        }
        let target = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| Error::Gpu(format!("upload to unknown texture {texture:?}")))?;

        let end = offset + dims;
        if end.cmpgt(target.dims).any() {
            return Err(Error::Gpu(format!(
                "upload {offset}+{dims} exceeds texture size {}",
                target.dims
            )));
        }
        let row = dims.x as usize;
        if bytes.len() != row * dims.y as usize * dims.z as usize {
            return Err(Error::Gpu("upload byte count does not match region".to_string()));
        }

        let (w, h) = (target.dims.x as usize, target.dims.y as usize);
        let mut src = 0;
        for z in offset.z..end.z {
            for y in offset.y..end.y {
                let dst = offset.x as usize + y as usize * w + z as usize * w * h;
                target.bytes[dst..dst + row].copy_from_slice(&bytes[src..src + row]);
                src += row;
            }
        }

        self.commands.push(GpuCommand::Upload { texture, offset, dims });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.commands.push(GpuCommand::DeleteTexture(texture));
        } else {
            log::warn!("Deleting unknown texture {:?}", texture);
        }
    }

    fn draw_voxel_object(&mut self, texture: TextureId, params: &ObjectDrawParams) {
        self.commands.push(GpuCommand::DrawObject { texture, params: *params });
    }

    fn texture_barrier(&mut self) {
        self.commands.push(GpuCommand::Barrier);
    }

    fn draw_world_lighting(&mut self, world_texture: TextureId, params: &LightingParams) {
        self.commands.push(GpuCommand::Lighting { world_texture, params: *params });
    }
}
