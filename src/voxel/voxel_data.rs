//! Dense per-object voxel grid

use crate::core::error::Error;
use crate::core::types::{IVec3, Result, UVec3};

/// Value of an empty cell; anything else is a material index
pub const EMPTY: u8 = 0;

/// Dense 3-D grid of one-byte voxels owned by a single placed object.
///
/// Cells are stored x-fastest, then y, then z. The buffer length always
/// equals `width * height * depth`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelData {
    dimensions: UVec3,
    cells: Vec<u8>,
}

impl VoxelData {
    /// Create an empty (all zero) grid
    pub fn new(dimensions: UVec3) -> Self {
        let mut data = Self::default();
        data.resize(dimensions);
        data
    }

    /// Create a grid with every cell set to `voxel`
    pub fn filled(dimensions: UVec3, voxel: u8) -> Self {
        let mut data = Self::new(dimensions);
        data.fill(voxel);
        data
    }

    /// Reallocate storage; every previous cell value is discarded
    pub fn resize(&mut self, dimensions: UVec3) {
        self.dimensions = dimensions;
        let len = dimensions.x as usize * dimensions.y as usize * dimensions.z as usize;
        self.cells.clear();
        self.cells.resize(len, EMPTY);
    }

    pub fn set_voxel(&mut self, pos: IVec3, voxel: u8) -> Result<()> {
        let index = self.index(pos)?;
        self.cells[index] = voxel;
        Ok(())
    }

    pub fn voxel(&self, pos: IVec3) -> Result<u8> {
        let index = self.index(pos)?;
        Ok(self.cells[index])
    }

    pub fn fill(&mut self, voxel: u8) {
        self.cells.fill(voxel);
    }

    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    pub fn byte_size(&self) -> usize {
        self.cells.len() * std::mem::size_of::<u8>()
    }

    /// Raw cell buffer, laid out for a 3-D texture upload
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Number of non-empty cells
    pub fn solid_count(&self) -> usize {
        self.cells.iter().filter(|&&v| v != EMPTY).count()
    }

    /// Iterate over every non-empty cell as (local position, value)
    pub fn solid_voxels(&self) -> impl Iterator<Item = (IVec3, u8)> + '_ {
        let width = self.dimensions.x.max(1) as usize;
        let height = self.dimensions.y.max(1) as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != EMPTY)
            .map(move |(i, &v)| {
                let x = i % width;
                let y = (i / width) % height;
                let z = i / (width * height);
                (IVec3::new(x as i32, y as i32, z as i32), v)
            })
    }

    fn index(&self, pos: IVec3) -> Result<usize> {
        let dims = self.dimensions.as_ivec3();
        if pos.x < 0 || pos.y < 0 || pos.z < 0 || pos.x >= dims.x || pos.y >= dims.y || pos.z >= dims.z {
            return Err(Error::VoxelOutOfRange {
                pos,
                dimensions: self.dimensions,
            });
        }
        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        let (w, h) = (self.dimensions.x as usize, self.dimensions.y as usize);
        Ok(x + y * w + z * w * h)
    }
}
