//! Global occupancy grid shared by all placed voxel objects
//!
//! Occupancy is stored at half linear resolution: every byte of the packed
//! buffer covers an aligned 2x2x2 block of world voxels, one bit per voxel
//! (`bit = bx + bz * 2 + by * 4`). The packed buffer is mirrored into a 3-D
//! single-channel GPU texture by [`VoxelWorld::sync`].
//!
//! The grid stores occupancy only, not ownership. Clearing an object's
//! footprint clears every bit that object's voxels map to, including bits
//! another overlapping object also set.

use crate::core::error::Error;
use crate::core::types::{IVec3, Quat, Result, UVec3, Vec3};
use crate::render::gpu::{GpuTexture, SharedBackend, TextureId};
use super::region::{BlockRegion, DirtyRegion};
use super::voxel_data::VoxelData;

/// Bit-packed world occupancy plus its GPU mirror
pub struct VoxelWorld {
    /// Full-resolution size in voxels
    dimensions: UVec3,
    /// `dimensions / 2`, the size of the packed grid in blocks
    half_dimensions: UVec3,
    packed: Vec<u8>,
    dirty: DirtyRegion,
    /// GPU copy of `packed`, absent for CPU-only worlds
    mirror: Option<GpuTexture>,
    /// Reused gather buffer for sub-region uploads
    staging: Vec<u8>,
}

impl VoxelWorld {
    /// Create a CPU-only world; every axis of `dimensions` must be even and non-zero
    pub fn new(dimensions: UVec3) -> Result<Self> {
        if dimensions.cmpeq(UVec3::ZERO).any() || (dimensions % 2).cmpne(UVec3::ZERO).any() {
            return Err(Error::InvalidWorldDimensions(dimensions));
        }

        let half_dimensions = dimensions / 2;
        let len = half_dimensions.x as usize * half_dimensions.y as usize * half_dimensions.z as usize;

        Ok(Self {
            dimensions,
            half_dimensions,
            packed: vec![0; len],
            dirty: DirtyRegion::new(),
            mirror: None,
            staging: Vec::new(),
        })
    }

    /// Create a world and allocate its mirrored occupancy texture
    pub fn with_gpu_mirror(dimensions: UVec3, backend: &SharedBackend) -> Result<Self> {
        let mut world = Self::new(dimensions)?;
        let mirror = GpuTexture::new_volume(backend, "voxel_world", &world.packed, world.half_dimensions)?;
        log::info!(
            "Voxel world {}x{}x{} created ({} KB packed, texture {:?})",
            dimensions.x, dimensions.y, dimensions.z,
            world.packed.len() / 1024,
            mirror.id()
        );
        world.mirror = Some(mirror);
        Ok(world)
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn half_dimensions(&self) -> UVec3 {
        self.half_dimensions
    }

    /// Packed occupancy bytes, one per 2x2x2 block
    pub fn packed(&self) -> &[u8] {
        &self.packed
    }

    /// Handle of the GPU mirror, if one was allocated
    pub fn texture(&self) -> Option<TextureId> {
        self.mirror.as_ref().map(GpuTexture::id)
    }

    /// Byte index of the block containing `pos`, or `None` outside the world
    pub fn block_index(&self, pos: IVec3) -> Option<usize> {
        let block = self.block_of(pos)?;
        Some(self.linear_block_index(block))
    }

    /// Bit of `pos` within its block byte
    pub fn bit_mask(pos: IVec3) -> u8 {
        let bx = pos.x & 1;
        let by = pos.y & 1;
        let bz = pos.z & 1;
        1 << (bx + bz * 2 + by * 4)
    }

    /// Mark `pos` occupied; no-op outside the world
    pub fn set_voxel(&mut self, pos: IVec3) {
        if let Some(block) = self.block_of(pos) {
            let index = self.linear_block_index(block);
            self.packed[index] |= Self::bit_mask(pos);
            self.dirty.mark(block);
        }
    }

    /// Mark `pos` empty; no-op outside the world
    pub fn clear_voxel(&mut self, pos: IVec3) {
        if let Some(block) = self.block_of(pos) {
            let index = self.linear_block_index(block);
            self.packed[index] &= !Self::bit_mask(pos);
            self.dirty.mark(block);
        }
    }

    /// Whether `pos` is occupied; false outside the world
    pub fn is_occupied(&self, pos: IVec3) -> bool {
        self.block_index(pos)
            .is_some_and(|index| self.packed[index] & Self::bit_mask(pos) != 0)
    }

    /// Total number of occupied voxels
    pub fn occupied_count(&self) -> usize {
        self.packed.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// World cells an object's solid voxels map to at the given pose
    pub fn footprint<'a>(
        origin: Vec3,
        rotation: Quat,
        voxel_data: &'a VoxelData,
    ) -> impl Iterator<Item = IVec3> + 'a {
        voxel_data
            .solid_voxels()
            .map(move |(local, _)| (origin + rotation * local.as_vec3()).round().as_ivec3())
    }

    /// Add (`clear == false`) or remove (`clear == true`) an object's footprint.
    ///
    /// Callers remove the previous pose before adding the new one; cells
    /// outside the object's footprint are never touched. Returns the number
    /// of solid voxels visited.
    pub fn rasterize_voxel_data(
        &mut self,
        origin: Vec3,
        rotation: Quat,
        voxel_data: &VoxelData,
        clear: bool,
    ) -> usize {
        let mut visited = 0;
        for world_pos in Self::footprint(origin, rotation, voxel_data) {
            if clear {
                self.clear_voxel(world_pos);
            } else {
                self.set_voxel(world_pos);
            }
            visited += 1;
        }
        log::debug!(
            "{} {} voxels at {:?}",
            if clear { "Cleared" } else { "Rasterized" },
            visited,
            origin
        );
        visited
    }

    /// Whether there are changes the GPU mirror has not seen yet
    pub fn has_pending_upload(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Push the region modified since the last sync to the GPU mirror.
    ///
    /// Call once per frame, after all rasterization and before any draw
    /// that samples the world texture. Returns the uploaded region, or
    /// `None` when nothing changed.
    pub fn sync(&mut self) -> Result<Option<BlockRegion>> {
        let Some(region) = self.dirty.take() else {
            return Ok(None);
        };

        if let Some(mirror) = &self.mirror {
            self.staging.clear();
            self.staging.reserve(region.volume());
            let row = region.size().x as usize;
            for z in region.min.z..region.max.z {
                for y in region.min.y..region.max.y {
                    let start = self.linear_block_index(UVec3::new(region.min.x, y, z));
                    self.staging.extend_from_slice(&self.packed[start..start + row]);
                }
            }

            if let Err(err) = mirror.upload_subregion(&self.staging, region.min, region.size()) {
                // Keep the region so a later sync can still converge
                self.dirty.mark_region(region);
                return Err(err);
            }
            log::trace!("Synced {} packed bytes at block {:?}", self.staging.len(), region.min);
        }

        Ok(Some(region))
    }

    fn block_of(&self, pos: IVec3) -> Option<UVec3> {
        let dims = self.dimensions.as_ivec3();
        if pos.x < 0 || pos.y < 0 || pos.z < 0 || pos.x >= dims.x || pos.y >= dims.y || pos.z >= dims.z {
            return None;
        }
        Some((pos >> 1i32).as_uvec3())
    }

    fn linear_block_index(&self, block: UVec3) -> usize {
        let half = self.half_dimensions;
        block.x as usize
            + block.y as usize * half.x as usize
            + block.z as usize * half.x as usize * half.y as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::gpu::GpuBackend;
    use crate::render::headless::HeadlessBackend;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn world(size: u32) -> VoxelWorld {
        VoxelWorld::new(UVec3::splat(size)).unwrap()
    }

    /// Occupied cells of a world, for set comparisons
    fn occupied(world: &VoxelWorld) -> Vec<IVec3> {
        let dims = world.dimensions().as_ivec3();
        let mut cells = Vec::new();
        for z in 0..dims.z {
            for y in 0..dims.y {
                for x in 0..dims.x {
                    let p = IVec3::new(x, y, z);
                    if world.is_occupied(p) {
                        cells.push(p);
                    }
                }
            }
        }
        cells
    }

    #[test]
    fn test_invalid_dimensions() {
        for dims in [UVec3::new(0, 8, 8), UVec3::new(7, 8, 8), UVec3::new(8, 8, 3)] {
            assert!(matches!(VoxelWorld::new(dims), Err(Error::InvalidWorldDimensions(_))));
        }
    }

    #[test]
    fn test_packed_size_is_half_resolution() {
        let world = VoxelWorld::new(UVec3::new(16, 8, 4)).unwrap();
        assert_eq!(world.half_dimensions(), UVec3::new(8, 4, 2));
        assert_eq!(world.packed().len(), 8 * 4 * 2);
    }

    #[test]
    fn test_index_and_bit_decomposition() {
        let world = VoxelWorld::new(UVec3::new(8, 6, 4)).unwrap();
        let half = world.half_dimensions().as_ivec3();
        let mut seen = std::collections::HashSet::new();

        for z in 0..4 {
            for y in 0..6 {
                for x in 0..8 {
                    let p = IVec3::new(x, y, z);
                    let index = world.block_index(p).unwrap();
                    let block = p >> 1i32;
                    let local = p & 1i32;
                    assert_eq!(index as i32, block.x + block.y * half.x + block.z * half.x * half.y);
                    assert_eq!(VoxelWorld::bit_mask(p), 1 << (local.x + local.z * 2 + local.y * 4));
                    // Every voxel owns a distinct (byte, bit) pair
                    assert!(seen.insert((index, VoxelWorld::bit_mask(p))));
                }
            }
        }
        assert_eq!(seen.len(), 8 * 6 * 4);
    }

    #[test]
    fn test_set_and_clear_voxel() {
        let mut world = world(8);
        let p = IVec3::new(3, 2, 5);
        world.set_voxel(p);
        assert!(world.is_occupied(p));
        assert_eq!(world.occupied_count(), 1);
        world.clear_voxel(p);
        assert!(!world.is_occupied(p));
        assert_eq!(world.occupied_count(), 0);
    }

    #[test]
    fn test_out_of_range_is_noop() {
        let mut world = world(8);
        for p in [
            IVec3::new(-1, 0, 0),
            IVec3::new(0, -3, 0),
            IVec3::new(0, 0, 8),
            IVec3::new(8, 0, 0),
            IVec3::new(0, 100, 0),
        ] {
            world.set_voxel(p);
            world.clear_voxel(p);
            assert!(world.block_index(p).is_none());
            assert!(!world.is_occupied(p));
        }
        assert!(world.packed().iter().all(|&b| b == 0));
        assert!(!world.has_pending_upload());
    }

    #[test]
    fn test_solid_2x2x2_fills_one_block() {
        let mut world = world(8);
        let data = VoxelData::filled(UVec3::splat(2), 1);
        world.rasterize_voxel_data(Vec3::ZERO, Quat::IDENTITY, &data, false);

        assert_eq!(world.packed()[0], 0xFF);
        assert!(world.packed()[1..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_empty_cells_are_not_rasterized() {
        let mut world = world(8);
        let mut data = VoxelData::new(UVec3::splat(2));
        data.set_voxel(IVec3::new(1, 1, 0), 3).unwrap();
        let visited = world.rasterize_voxel_data(Vec3::ZERO, Quat::IDENTITY, &data, false);

        assert_eq!(visited, 1);
        // bx=1, by=1, bz=0 -> bit 5
        assert_eq!(world.packed()[0], 1 << 5);
    }

    #[test]
    fn test_rasterize_then_clear_restores_buffer() {
        let mut world = world(16);
        world.set_voxel(IVec3::new(15, 15, 15));
        let before = world.packed().to_vec();

        let mut data = VoxelData::new(UVec3::new(3, 4, 2));
        data.fill(2);
        data.set_voxel(IVec3::new(1, 1, 1), 0).unwrap();
        let origin = Vec3::new(4.0, 3.0, 6.0);
        let rotation = Quat::from_rotation_y(0.7);

        world.rasterize_voxel_data(origin, rotation, &data, false);
        assert_ne!(world.packed(), &before[..]);
        world.rasterize_voxel_data(origin, rotation, &data, true);
        assert_eq!(world.packed(), &before[..]);
    }

    #[test]
    fn test_rotation_rounds_to_nearest_voxel() {
        let mut world = world(16);
        let mut data = VoxelData::new(UVec3::new(3, 1, 1));
        data.fill(1);
        // 90 degrees about Y maps +X onto -Z
        let rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        world.rasterize_voxel_data(Vec3::new(8.0, 0.0, 8.0), rotation, &data, false);

        assert_eq!(
            occupied(&world),
            vec![IVec3::new(8, 0, 6), IVec3::new(8, 0, 7), IVec3::new(8, 0, 8)]
        );
    }

    #[test]
    fn test_rotated_footprint_outside_world_is_clamped() {
        let mut world = world(8);
        let data = VoxelData::filled(UVec3::new(4, 1, 1), 1);
        let rotation = Quat::from_rotation_y(std::f32::consts::PI);
        // Points back along -X, half of it leaves the world
        world.rasterize_voxel_data(Vec3::new(1.0, 0.0, 0.0), rotation, &data, false);
        assert_eq!(occupied(&world), vec![IVec3::new(0, 0, 0), IVec3::new(1, 0, 0)]);
    }

    #[test]
    fn test_overlap_clear_erases_shared_cell() {
        // A covers x=0..=2, B covers x=2..=4 on the same row; x=2 is shared
        let mut world = world(8);
        let a = VoxelData::filled(UVec3::new(3, 1, 1), 1);
        let b = VoxelData::filled(UVec3::new(3, 1, 1), 1);
        let a_origin = Vec3::ZERO;
        let b_origin = Vec3::new(2.0, 0.0, 0.0);

        world.rasterize_voxel_data(a_origin, Quat::IDENTITY, &a, false);
        world.rasterize_voxel_data(b_origin, Quat::IDENTITY, &b, false);
        assert_eq!(world.occupied_count(), 5);

        world.rasterize_voxel_data(a_origin, Quat::IDENTITY, &a, true);

        // Cells only B occupies survive
        assert!(world.is_occupied(IVec3::new(3, 0, 0)));
        assert!(world.is_occupied(IVec3::new(4, 0, 0)));
        // The shared cell is gone even though B still covers it: occupancy
        // is a set union without per-object ownership
        assert!(!world.is_occupied(IVec3::new(2, 0, 0)));

        let b_alone: Vec<_> = VoxelWorld::footprint(b_origin, Quat::IDENTITY, &b)
            .filter(|p| *p != IVec3::new(2, 0, 0))
            .collect();
        assert_eq!(occupied(&world), b_alone);
    }

    #[test]
    fn test_sync_without_mirror_clears_dirty_region() {
        let mut world = world(8);
        assert_eq!(world.sync().unwrap(), None);

        world.set_voxel(IVec3::new(2, 2, 2));
        world.set_voxel(IVec3::new(5, 3, 2));
        assert!(world.has_pending_upload());

        let region = world.sync().unwrap().unwrap();
        assert_eq!(region, BlockRegion::new(UVec3::new(1, 1, 1), UVec3::new(3, 2, 2)));
        assert!(!world.has_pending_upload());
        assert_eq!(world.sync().unwrap(), None);
    }

    #[test]
    fn test_sync_uploads_dirty_subregion_to_mirror() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();
        let mut world = VoxelWorld::with_gpu_mirror(UVec3::new(16, 8, 16), &shared).unwrap();
        let texture = world.texture().unwrap();

        let data = VoxelData::filled(UVec3::new(3, 2, 5), 1);
        world.rasterize_voxel_data(Vec3::new(5.0, 2.0, 7.0), Quat::IDENTITY, &data, false);
        let region = world.sync().unwrap().unwrap();
        assert_eq!(region.min, UVec3::new(2, 1, 3));

        let backend = backend.borrow();
        assert_eq!(backend.upload_count(texture), 1);
        assert_eq!(backend.texture_bytes(texture).unwrap(), world.packed());
    }

    #[test]
    fn test_failed_upload_keeps_dirty_region() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();
        let mut world = VoxelWorld::with_gpu_mirror(UVec3::splat(8), &shared).unwrap();
        let texture = world.texture().unwrap();

        world.set_voxel(IVec3::new(1, 1, 1));
        backend.borrow_mut().set_fail_uploads(true);
        assert!(matches!(world.sync(), Err(Error::Gpu(_))));
        assert!(world.has_pending_upload());
        assert_eq!(backend.borrow().upload_count(texture), 0);

        // The next sync uploads the failed region together with new edits
        backend.borrow_mut().set_fail_uploads(false);
        world.set_voxel(IVec3::new(6, 6, 6));
        let region = world.sync().unwrap().unwrap();
        assert_eq!(region, BlockRegion::new(UVec3::ZERO, UVec3::splat(4)));
        assert!(!world.has_pending_upload());
        assert_eq!(backend.borrow().texture_bytes(texture).unwrap(), world.packed());
    }

    #[test]
    fn test_upload_to_lost_mirror_keeps_dirty_region() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();
        let mut world = VoxelWorld::with_gpu_mirror(UVec3::splat(8), &shared).unwrap();
        let texture = world.texture().unwrap();
        backend.borrow_mut().delete_texture(texture);

        world.set_voxel(IVec3::new(2, 3, 4));
        assert!(matches!(world.sync(), Err(Error::Gpu(_))));
        assert!(world.has_pending_upload());
        assert!(matches!(world.sync(), Err(Error::Gpu(_))));
        assert!(world.has_pending_upload());
    }

    #[test]
    fn test_mirror_texture_freed_with_world() {
        let backend = Rc::new(RefCell::new(HeadlessBackend::new()));
        let shared: SharedBackend = backend.clone();
        let world = VoxelWorld::with_gpu_mirror(UVec3::splat(8), &shared).unwrap();
        assert_eq!(backend.borrow().live_texture_count(), 1);
        drop(world);
        assert_eq!(backend.borrow().live_texture_count(), 0);
    }
}
