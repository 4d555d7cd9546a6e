//! Read-only decoder for Minecraft's Anvil world format.
//!
//! A world directory holds region files (`r.<x>.<z>.mca`), each packing up
//! to 1024 chunks; a chunk is a column of up to 24 paletted 16x16x16
//! sections. [`World`] maps global block coordinates onto that hierarchy and
//! answers `get_block` queries or streams every block through
//! [`World::iter_blocks`].

pub mod chunk;
pub mod err;
pub mod region;
pub mod section;
pub mod world;

pub use chunk::Chunk;
pub use err::WorldError;
pub use region::{ChunkCache, ExternalCodec, Region, RegionLocation};
pub use section::Section;
pub use world::{Blocks, IterOptions, World};

/// Edge length of a section, in blocks.
pub const SECTION_EDGE: usize = 16;
/// Blocks per section (16^3).
pub const SECTION_BLOCKS: usize = SECTION_EDGE * SECTION_EDGE * SECTION_EDGE;
/// Vertical sections per chunk column.
pub const SECTION_COUNT: usize = 24;
/// Lowest section Y slot of the column.
pub const MIN_SECTION_Y: i32 = -4;
/// Highest section Y slot of the column.
pub const MAX_SECTION_Y: i32 = 19;

/// Edge length of a region, in chunks.
pub const REGION_EDGE: usize = 32;
/// Chunk slots per region (32x32).
pub const REGION_CHUNKS: usize = REGION_EDGE * REGION_EDGE;
/// Storage unit of a region file, in bytes.
pub const SECTOR_BYTES: usize = 4096;
/// Edge length of a region, in blocks (32 chunks of 16).
pub const REGION_BLOCK_EDGE: i32 = 512;
