use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::chunk::{decode_envelope, Chunk};
use crate::err::WorldError;
use crate::{REGION_CHUNKS, REGION_EDGE, SECTOR_BYTES};

/// One entry of the region file's location table.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RegionLocation {
    /// Offset of the chunk's first sector, in 4096-byte units.
    pub sector_offset: u32,
    /// Number of sectors the chunk occupies.
    pub sector_count: u8,
}

impl RegionLocation {
    /// Both fields zero means no chunk is stored at this slot.
    pub fn is_absent(&self) -> bool {
        self.sector_offset == 0 && self.sector_count == 0
    }
}

/// Decompressor for the reserved compression tag 127, supplied by the
/// caller via [`Region::with_codec`].
pub trait ExternalCodec: Send + Sync {
    fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>>;
}

fn decompress(
    tag: u8,
    payload: &[u8],
    codec: Option<&dyn ExternalCodec>,
) -> Result<Vec<u8>, WorldError> {
    match tag {
        // gzip (RFC 1952)
        1 => {
            let mut out = Vec::new();
            GzDecoder::new(payload)
                .read_to_end(&mut out)
                .map_err(|e| WorldError::CorruptChunk(format!("gzip stream: {}", e)))?;
            Ok(out)
        }
        // zlib (RFC 1950)
        2 => {
            let mut out = Vec::new();
            ZlibDecoder::new(payload)
                .read_to_end(&mut out)
                .map_err(|e| WorldError::CorruptChunk(format!("zlib stream: {}", e)))?;
            Ok(out)
        }
        // stored as-is
        3 => Ok(payload.to_vec()),
        // LZ4; the format reserves the tag but names no codec
        4 => Err(WorldError::UnsupportedCompression(4)),
        // reserved for an externally supplied codec
        127 => match codec {
            Some(codec) => codec
                .decompress(payload)
                .map_err(|e| WorldError::CorruptChunk(format!("external codec: {}", e))),
            None => Err(WorldError::UnsupportedCompression(127)),
        },
        other => Err(WorldError::CorruptChunk(format!(
            "unknown compression tag {}",
            other
        ))),
    }
}

/// One region file: a 32x32 grid of optional chunks over an immutable byte
/// buffer.
///
/// Built lazily with [`Region::from_bytes`] (header parsed, chunks decoded
/// on demand via [`Region::decode_chunk`] or a caller-owned [`ChunkCache`])
/// or eagerly with [`Region::decode`].
pub struct Region {
    buf: Vec<u8>,
    locations: Vec<RegionLocation>,
    codec: Option<Arc<dyn ExternalCodec>>,
    /// Fully materialized chunks, present in eager mode only.
    chunks: Option<Vec<Option<Arc<Chunk>>>>,
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("buf_len", &self.buf.len())
            .field("locations", &self.locations)
            .field("codec", &self.codec.as_ref().map(|_| ".."))
            .field("chunks", &self.chunks)
            .finish()
    }
}

impl Region {
    /// Parse the location table; chunk payloads stay untouched.
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, WorldError> {
        if buf.len() < 2 * SECTOR_BYTES {
            return Err(WorldError::CorruptRegion(format!(
                "region file of {} bytes is shorter than its 8192-byte header",
                buf.len()
            )));
        }
        let mut locations = Vec::with_capacity(REGION_CHUNKS);
        for index in 0..REGION_CHUNKS {
            let entry = &buf[index * 4..index * 4 + 4];
            let location = RegionLocation {
                sector_offset: u32::from_be_bytes([0, entry[0], entry[1], entry[2]]),
                sector_count: entry[3],
            };
            if !location.is_absent() {
                let start = location.sector_offset as usize * SECTOR_BYTES;
                let end = (location.sector_offset as usize + location.sector_count as usize)
                    * SECTOR_BYTES;
                if start + 5 > buf.len() || end > buf.len() {
                    return Err(WorldError::CorruptRegion(format!(
                        "slot {}: sectors {}..{} exceed the {}-byte buffer",
                        index,
                        location.sector_offset,
                        location.sector_offset as usize + location.sector_count as usize,
                        buf.len()
                    )));
                }
            }
            locations.push(location);
        }
        Ok(Region {
            buf,
            locations,
            codec: None,
            chunks: None,
        })
    }

    /// Parse the header and decode every stored chunk up front.
    pub fn decode(buf: Vec<u8>) -> Result<Self, WorldError> {
        let mut region = Self::from_bytes(buf)?;
        region.materialize()?;
        Ok(region)
    }

    /// Install a decompressor for compression tag 127.
    pub fn with_codec(mut self, codec: Arc<dyn ExternalCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Decode all 1024 slots and keep the results on the region.
    pub fn materialize(&mut self) -> Result<(), WorldError> {
        if self.chunks.is_some() {
            return Ok(());
        }
        let mut chunks = Vec::with_capacity(REGION_CHUNKS);
        for index in 0..REGION_CHUNKS {
            chunks.push(self.decode_slot(index)?.map(Arc::new));
        }
        self.chunks = Some(chunks);
        Ok(())
    }

    pub fn is_materialized(&self) -> bool {
        self.chunks.is_some()
    }

    /// Location entry for an in-region chunk coordinate, `None` out of
    /// range.
    pub fn location(&self, cx: u32, cz: u32) -> Option<RegionLocation> {
        if cx as usize >= REGION_EDGE || cz as usize >= REGION_EDGE {
            return None;
        }
        Some(self.locations[slot_index(cx, cz)])
    }

    /// The chunk at in-region coordinates `(cx, cz)`: the materialized one
    /// in eager mode, a fresh decode otherwise. `Ok(None)` for absent slots
    /// and out-of-range coordinates.
    pub fn decode_chunk(&self, cx: u32, cz: u32) -> Result<Option<Arc<Chunk>>, WorldError> {
        if cx as usize >= REGION_EDGE || cz as usize >= REGION_EDGE {
            return Ok(None);
        }
        let index = slot_index(cx, cz);
        if let Some(chunks) = &self.chunks {
            return Ok(chunks[index].clone());
        }
        Ok(self.decode_slot(index)?.map(Arc::new))
    }

    /// All 1024 slots in index order, decoding as it goes.
    pub fn chunks(
        &self,
    ) -> impl Iterator<Item = ((u32, u32), Result<Option<Arc<Chunk>>, WorldError>)> + '_ {
        (0..REGION_CHUNKS).map(move |index| {
            let (cx, cz) = slot_coords(index);
            ((cx, cz), self.decode_chunk(cx, cz))
        })
    }

    fn decode_slot(&self, index: usize) -> Result<Option<Chunk>, WorldError> {
        let location = self.locations[index];
        if location.is_absent() {
            return Ok(None);
        }
        // Bounds of the 5-byte header were validated against the buffer
        // when the location table was parsed.
        let start = location.sector_offset as usize * SECTOR_BYTES;
        let len = u32::from_be_bytes([
            self.buf[start],
            self.buf[start + 1],
            self.buf[start + 2],
            self.buf[start + 3],
        ]) as usize;
        let tag = self.buf[start + 4];
        let payload_start = start + 5;
        let payload_end = payload_start + len;
        if payload_end > self.buf.len() {
            return Err(WorldError::CorruptChunk(format!(
                "slot {}: payload of {} bytes runs past the buffer",
                index, len
            )));
        }
        let raw = decompress(tag, &self.buf[payload_start..payload_end], self.codec.as_deref())?;
        let envelope = decode_envelope(&raw)?;
        Ok(Some(Chunk::from_envelope(envelope)?))
    }
}

pub(crate) fn slot_index(cx: u32, cz: u32) -> usize {
    cx as usize * REGION_EDGE + cz as usize
}

pub(crate) fn slot_coords(index: usize) -> (u32, u32) {
    ((index / REGION_EDGE) as u32, (index % REGION_EDGE) as u32)
}

/// Decode cache keyed by chunk slot, owned by whoever is traversing a
/// region. Dropping or clearing it bounds peak memory without losing the
/// ability to re-decode.
#[derive(Default)]
pub struct ChunkCache {
    slots: HashMap<usize, Option<Arc<Chunk>>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached chunk for `(cx, cz)`, decoding and retaining it on first
    /// access. Decode failures are not cached.
    pub fn get_or_decode(
        &mut self,
        region: &Region,
        cx: u32,
        cz: u32,
    ) -> Result<Option<Arc<Chunk>>, WorldError> {
        if cx as usize >= REGION_EDGE || cz as usize >= REGION_EDGE {
            return Ok(None);
        }
        let index = slot_index(cx, cz);
        if let Some(cached) = self.slots.get(&index) {
            return Ok(cached.clone());
        }
        let chunk = region.decode_chunk(cx, cz)?;
        self.slots.insert(index, chunk.clone());
        Ok(chunk)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
