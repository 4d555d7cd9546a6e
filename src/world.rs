use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::task::JoinSet;

use crate::err::WorldError;
use crate::region::{slot_coords, ChunkCache, Region};
use crate::section::linear_to_xyz;
use crate::{REGION_BLOCK_EDGE, REGION_CHUNKS, SECTION_BLOCKS, SECTION_COUNT};

/**
 * A world: a sparse mapping from region grid coordinates to regions.
 *
 * Regions come either from a directory scan (`open` lazily, `load` eagerly
 * and in parallel) or from the caller via `insert_region`. Block lookups
 * decompose global coordinates region -> chunk -> section -> voxel; any
 * absent level answers `None` rather than an error.
 */
#[derive(Default)]
pub struct World {
    regions: BTreeMap<(i32, i32), Region>,
    /// Chunks decoded on behalf of `get_block`, kept per region so repeated
    /// point queries don't re-decode. `clear_cache` drops them.
    lookup_cache: Mutex<HashMap<(i32, i32), ChunkCache>>,
}

/// First two signed integers in a region file name, e.g. `r.-3.12.mca`.
fn region_coords(name: &str) -> Option<(i32, i32)> {
    let bytes = name.as_bytes();
    let mut nums: Vec<i32> = Vec::with_capacity(2);
    let mut i = 0;
    while i < bytes.len() && nums.len() < 2 {
        let signed = bytes[i] == b'-' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit();
        if signed || bytes[i].is_ascii_digit() {
            let start = i;
            i += if signed { 1 } else { 0 };
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            nums.push(name[start..i].parse().ok()?);
        } else {
            i += 1;
        }
    }
    match nums[..] {
        [x, z] => Some((x, z)),
        _ => None,
    }
}

fn match_region_file(name: &str) -> Option<(i32, i32)> {
    if !name.starts_with("r.") || !name.ends_with(".mca") {
        return None;
    }
    region_coords(name)
}

/// Worlds keep their region files under a `region/` subdirectory; accept
/// being pointed at either level.
fn region_dir(dir: &Path) -> PathBuf {
    let sub = dir.join("region");
    if sub.is_dir() {
        sub
    } else {
        dir.to_path_buf()
    }
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Scan a world directory and read every region file, leaving chunk
     * decoding for first access.
     */
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, WorldError> {
        let dir = region_dir(dir.as_ref());
        let mut world = World::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((rx, rz)) = match_region_file(name) else {
                continue;
            };
            debug!("reading region r.{}.{}", rx, rz);
            let region = Region::from_bytes(fs::read(&path)?)?;
            world.insert_region(rx, rz, region);
        }
        Ok(world)
    }

    /**
     * Scan a world directory and decode every region file up front, fanning
     * the files out over the runtime's workers. Each region decode is a pure
     * function of its own buffer, so the tasks need no coordination; the
     * results are merged once all of them finish.
     */
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self, WorldError> {
        let dir = region_dir(dir.as_ref());
        let mut set: JoinSet<Result<((i32, i32), Region), WorldError>> = JoinSet::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some((rx, rz)) = match_region_file(name) else {
                continue;
            };
            set.spawn(async move {
                let buf = tokio::fs::read(&path).await?;
                let region = tokio::task::spawn_blocking(move || Region::decode(buf))
                    .await
                    .map_err(|e| WorldError::Io(std::io::Error::other(e)))??;
                Ok(((rx, rz), region))
            });
        }

        let mut world = World::new();
        while let Some(joined) = set.join_next().await {
            let ((rx, rz), region) =
                joined.map_err(|e| WorldError::Io(std::io::Error::other(e)))??;
            debug!("loaded region r.{}.{}", rx, rz);
            world.insert_region(rx, rz, region);
        }
        Ok(world)
    }

    pub fn insert_region(&mut self, rx: i32, rz: i32, region: Region) {
        if self.regions.insert((rx, rz), region).is_some() {
            warn!("replacing region r.{}.{}", rx, rz);
        }
    }

    pub fn region(&self, rx: i32, rz: i32) -> Option<&Region> {
        self.regions.get(&(rx, rz))
    }

    /// Region grid coordinates, ascending.
    pub fn region_coords(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.regions.keys().copied()
    }

    /// Drop chunks cached by `get_block`.
    pub fn clear_cache(&self) {
        self.lookup_cache.lock().unwrap().clear();
    }

    /**
     * The block name at global coordinates, `None` wherever the region,
     * chunk or section is absent. Division is euclidean so negative
     * coordinates land in the right region and chunk.
     */
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Result<Option<Arc<str>>, WorldError> {
        let rx = x.div_euclid(REGION_BLOCK_EDGE);
        let rz = z.div_euclid(REGION_BLOCK_EDGE);
        let Some(region) = self.regions.get(&(rx, rz)) else {
            return Ok(None);
        };
        let lx = x.rem_euclid(REGION_BLOCK_EDGE);
        let lz = z.rem_euclid(REGION_BLOCK_EDGE);

        let chunk = {
            let mut caches = self.lookup_cache.lock().unwrap();
            caches
                .entry((rx, rz))
                .or_default()
                .get_or_decode(region, (lx / 16) as u32, (lz / 16) as u32)?
        };
        let Some(chunk) = chunk else {
            return Ok(None);
        };
        let Some(section) = chunk.section(y.div_euclid(16)) else {
            return Ok(None);
        };
        Ok(section
            .block_ref(
                (lx % 16) as usize,
                y.rem_euclid(16) as usize,
                (lz % 16) as usize,
            )
            .cloned())
    }

    /**
     * Lazily walk every stored block in ascending coordinate order:
     * regions, then chunk slots, then sections bottom-up, then voxels in
     * linear order. Every call returns an independent cursor, so concurrent
     * traversals of the same world don't interfere. The cursor keeps at
     * most one region's chunks decoded at a time and drops them when it
     * crosses a region boundary.
     */
    pub fn iter_blocks(&self, opts: IterOptions) -> Blocks<'_> {
        Blocks {
            regions: self.regions.iter().map(|(&c, r)| (c, r)).collect(),
            opts,
            region_i: 0,
            slot: 0,
            cache: ChunkCache::new(),
            chunk: None,
            section_slot: 0,
            voxel: 0,
        }
    }
}

/// Traversal options for [`World::iter_blocks`].
#[derive(Default)]
pub struct IterOptions {
    /// Skip sections whose palette has a single entry.
    pub skip_uniform_sections: bool,
    /// Block names to omit from the stream.
    pub exclude: Option<HashSet<String>>,
}

/// Cursor over every block of a [`World`]. Yields decode failures as `Err`
/// items and keeps going, leaving skip-or-abort to the consumer.
pub struct Blocks<'a> {
    regions: Vec<((i32, i32), &'a Region)>,
    opts: IterOptions,
    region_i: usize,
    /// Chunk slot within the current region, 0..1024.
    slot: usize,
    cache: ChunkCache,
    chunk: Option<Arc<crate::chunk::Chunk>>,
    section_slot: usize,
    voxel: usize,
}

impl Iterator for Blocks<'_> {
    type Item = Result<((i32, i32, i32), Arc<str>), WorldError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let ((rx, rz), region) = *self.regions.get(self.region_i)?;

            if self.slot >= REGION_CHUNKS {
                self.cache.clear();
                self.region_i += 1;
                self.slot = 0;
                continue;
            }
            let (cx, cz) = slot_coords(self.slot);

            let chunk = match &self.chunk {
                Some(chunk) => chunk.clone(),
                None => match self.cache.get_or_decode(region, cx, cz) {
                    Err(e) => {
                        self.slot += 1;
                        return Some(Err(e));
                    }
                    Ok(None) => {
                        self.slot += 1;
                        continue;
                    }
                    Ok(Some(chunk)) => {
                        self.section_slot = 0;
                        self.voxel = 0;
                        self.chunk = Some(chunk.clone());
                        chunk
                    }
                },
            };

            if self.section_slot >= SECTION_COUNT {
                self.chunk = None;
                self.slot += 1;
                continue;
            }
            let Some(section) = chunk.section_slot(self.section_slot) else {
                self.section_slot += 1;
                continue;
            };
            if self.opts.skip_uniform_sections && section.is_uniform() {
                self.section_slot += 1;
                continue;
            }

            while self.voxel < SECTION_BLOCKS {
                let i = self.voxel;
                self.voxel += 1;
                let name = section.block_linear(i);
                if let Some(exclude) = &self.opts.exclude {
                    if exclude.contains(name.as_ref()) {
                        continue;
                    }
                }
                let (bx, by, bz) = linear_to_xyz(i);
                let section_y = self.section_slot as i32 + crate::MIN_SECTION_Y;
                let x = rx * REGION_BLOCK_EDGE + cx as i32 * 16 + bx as i32;
                let y = section_y * 16 + by as i32;
                let z = rz * REGION_BLOCK_EDGE + cz as i32 * 16 + bz as i32;
                return Some(Ok(((x, y, z), name.clone())));
            }
            self.voxel = 0;
            self.section_slot += 1;
        }
    }
}
