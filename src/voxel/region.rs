//! Dirty-region tracking for packed occupancy blocks.

use crate::core::types::UVec3;

/// Box of packed blocks, `min` inclusive and `max` exclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRegion {
    pub min: UVec3,
    pub max: UVec3,
}

impl BlockRegion {
    pub fn new(min: UVec3, max: UVec3) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> UVec3 {
        self.max - self.min
    }

    /// Number of blocks (bytes) covered
    pub fn volume(&self) -> usize {
        let size = self.size();
        size.x as usize * size.y as usize * size.z as usize
    }

    pub fn contains(&self, block: UVec3) -> bool {
        block.cmpge(self.min).all() && block.cmplt(self.max).all()
    }
}

/// Tracks which part of the packed grid changed since the last upload.
///
/// Touching a block grows a single bounding box; taking the region
/// resets it. The generation counter increments on every take that
/// returned a region.
#[derive(Debug, Default)]
pub struct DirtyRegion {
    bounds: Option<BlockRegion>,
    generation: u32,
}

impl DirtyRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a single block as modified
    pub fn mark(&mut self, block: UVec3) {
        let next = block + UVec3::ONE;
        self.bounds = Some(match self.bounds {
            Some(region) => BlockRegion::new(region.min.min(block), region.max.max(next)),
            None => BlockRegion::new(block, next),
        });
    }

    /// Mark a whole region as modified
    pub fn mark_region(&mut self, region: BlockRegion) {
        self.bounds = Some(match self.bounds {
            Some(current) => BlockRegion::new(current.min.min(region.min), current.max.max(region.max)),
            None => region,
        });
    }

    /// Take the dirty box and clear it
    pub fn take(&mut self) -> Option<BlockRegion> {
        let taken = self.bounds.take();
        if taken.is_some() {
            self.generation = self.generation.wrapping_add(1);
        }
        taken
    }

    pub fn peek(&self) -> Option<BlockRegion> {
        self.bounds
    }

    pub fn is_dirty(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}
