use std::sync::Arc;

use crate::chunk::BlockStates;
use crate::err::WorldError;
use crate::{SECTION_BLOCKS, SECTION_EDGE};

/// Narrowest packed index width the format allows.
const MIN_BIT_WIDTH: usize = 4;

/// Bits per packed palette index for a palette of the given size: the bit
/// length of `palette_len - 1`, floored at 4.
pub(crate) fn bit_width(palette_len: usize) -> usize {
    let needed = (usize::BITS - palette_len.saturating_sub(1).leading_zeros()) as usize;
    needed.max(MIN_BIT_WIDTH)
}

pub(crate) fn linear_to_xyz(i: usize) -> (usize, usize, usize) {
    (i % 16, i / 256, (i % 256) / 16)
}

pub(crate) fn xyz_to_linear(x: usize, y: usize, z: usize) -> usize {
    y * 256 + z * 16 + x
}

/// Expand a section's packed long array into 4096 palette indices.
///
/// Each 64-bit word holds `64 / bit_width` indices in its low bits; indices
/// never straddle a word boundary and the high leftover bits are padding.
/// Slots past 4096 in the final word are discarded.
fn unpack_indices(longs: &[i64], palette_len: usize) -> Result<Vec<u16>, WorldError> {
    let width = bit_width(palette_len);
    let per_long = 64 / width;
    let mask = (1u64 << width) - 1;

    let mut indices = Vec::with_capacity(SECTION_BLOCKS);
    for i in 0..SECTION_BLOCKS {
        let word = match longs.get(i / per_long) {
            Some(&word) => word as u64,
            None => {
                return Err(WorldError::CorruptChunk(format!(
                    "packed data has {} words, too few for 4096 indices at {} bits",
                    longs.len(),
                    width
                )))
            }
        };
        let idx = (word >> ((i % per_long) * width)) & mask;
        if idx as usize >= palette_len {
            return Err(WorldError::CorruptChunk(format!(
                "palette index {} out of range for palette of {}",
                idx, palette_len
            )));
        }
        indices.push(idx as u16);
    }
    Ok(indices)
}

/// A decoded 16x16x16 sub-volume: a palette of block names plus, unless the
/// section is uniform, one palette index per voxel.
#[derive(Debug)]
pub struct Section {
    palette: Vec<Arc<str>>,
    /// 4096 entries in linear order, `None` when the whole section resolves
    /// to `palette[0]`.
    indices: Option<Vec<u16>>,
}

impl Section {
    pub(crate) fn decode(states: BlockStates) -> Result<Self, WorldError> {
        if states.palette.is_empty() {
            return Err(WorldError::MalformedChunk("section palette is empty".into()));
        }
        let palette: Vec<Arc<str>> = states
            .palette
            .into_iter()
            .map(|entry| Arc::from(entry.name))
            .collect();
        let indices = match states.data {
            // Sections storing a single kind of block omit the index array.
            None => None,
            Some(data) => {
                let longs: Vec<i64> = data.iter().copied().collect();
                Some(unpack_indices(&longs, palette.len())?)
            }
        };
        Ok(Section { palette, indices })
    }

    pub fn palette(&self) -> &[Arc<str>] {
        &self.palette
    }

    /// True iff the palette holds a single entry, so every voxel is that
    /// one block.
    pub fn is_uniform(&self) -> bool {
        self.palette.len() == 1
    }

    /// Block name at in-section coordinates, `None` out of bounds.
    pub fn block(&self, x: usize, y: usize, z: usize) -> Option<&str> {
        self.block_ref(x, y, z).map(|name| name.as_ref())
    }

    pub(crate) fn block_ref(&self, x: usize, y: usize, z: usize) -> Option<&Arc<str>> {
        if x >= SECTION_EDGE || y >= SECTION_EDGE || z >= SECTION_EDGE {
            return None;
        }
        Some(self.block_linear(xyz_to_linear(x, y, z)))
    }

    pub(crate) fn block_linear(&self, i: usize) -> &Arc<str> {
        match &self.indices {
            Some(indices) => &self.palette[indices[i] as usize],
            None => &self.palette[0],
        }
    }
}
