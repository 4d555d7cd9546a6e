//! In-memory region file fixtures for the decode tests.
#![allow(dead_code)]

use std::io::Write;

use fastnbt::LongArray;
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::Serialize;

pub const SECTOR: usize = 4096;

#[derive(Serialize)]
pub struct PaletteEntryNbt {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Serialize)]
pub struct BlockStatesNbt {
    pub palette: Vec<PaletteEntryNbt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<LongArray>,
}

#[derive(Serialize)]
pub struct SectionNbt {
    #[serde(rename = "Y")]
    pub y: i8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_states: Option<BlockStatesNbt>,
}

#[derive(Serialize)]
pub struct ChunkNbt {
    #[serde(rename = "xPos")]
    pub x_pos: i32,
    #[serde(rename = "zPos")]
    pub z_pos: i32,
    pub sections: Vec<SectionNbt>,
}

pub fn bit_width(palette_len: usize) -> usize {
    let needed = (usize::BITS - palette_len.saturating_sub(1).leading_zeros()) as usize;
    needed.max(4)
}

/// Pack palette indices with the format's forward formula: each 64-bit word
/// holds `64 / bit_width` indices in its low bits, none straddling words.
pub fn pack_indices(indices: &[u16], palette_len: usize) -> Vec<i64> {
    let width = bit_width(palette_len);
    let per_long = 64 / width;
    let mut longs = vec![0i64; (indices.len() + per_long - 1) / per_long];
    for (i, &idx) in indices.iter().enumerate() {
        longs[i / per_long] |= (idx as i64) << ((i % per_long) * width);
    }
    longs
}

pub fn section(y: i8, palette: &[&str], indices: Option<&[u16]>) -> SectionNbt {
    SectionNbt {
        y,
        block_states: Some(BlockStatesNbt {
            palette: palette
                .iter()
                .map(|name| PaletteEntryNbt {
                    name: name.to_string(),
                })
                .collect(),
            data: indices.map(|idx| LongArray::new(pack_indices(idx, palette.len()))),
        }),
    }
}

pub fn chunk_payload(chunk: &ChunkNbt) -> Vec<u8> {
    fastnbt::to_bytes(chunk).expect("serialize chunk fixture")
}

/// Compress a chunk payload for the given tag (1 gzip, 2 zlib, 3 stored).
pub fn compress(tag: u8, payload: &[u8]) -> Vec<u8> {
    match tag {
        1 => {
            let mut enc = GzEncoder::new(Vec::new(), Compression::default());
            enc.write_all(payload).unwrap();
            enc.finish().unwrap()
        }
        2 => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(payload).unwrap();
            enc.finish().unwrap()
        }
        3 => payload.to_vec(),
        other => panic!("no fixture compressor for tag {other}"),
    }
}

/// Assembles region file bytes: 8192-byte header, then one sector-aligned
/// run per chunk of `4-byte BE payload length | tag | payload`.
pub struct RegionBuilder {
    chunks: Vec<(u32, u32, u8, Vec<u8>)>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        RegionBuilder { chunks: Vec::new() }
    }

    /// Add a chunk, zlib-compressed (tag 2).
    pub fn chunk(self, cx: u32, cz: u32, chunk: &ChunkNbt) -> Self {
        let payload = compress(2, &chunk_payload(chunk));
        self.raw_chunk(cx, cz, 2, payload)
    }

    /// Add an already-encoded payload under an arbitrary compression tag.
    pub fn raw_chunk(mut self, cx: u32, cz: u32, tag: u8, payload: Vec<u8>) -> Self {
        self.chunks.push((cx, cz, tag, payload));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = vec![0u8; 2 * SECTOR];
        let mut body = Vec::new();
        let mut sector = 2u32;

        for (cx, cz, tag, payload) in &self.chunks {
            let mut run = Vec::with_capacity(5 + payload.len());
            run.extend_from_slice(&(payload.len() as u32).to_be_bytes());
            run.push(*tag);
            run.extend_from_slice(payload);
            let sectors = (run.len() + SECTOR - 1) / SECTOR;
            run.resize(sectors * SECTOR, 0);

            let slot = (cx * 32 + cz) as usize * 4;
            header[slot] = (sector >> 16) as u8;
            header[slot + 1] = (sector >> 8) as u8;
            header[slot + 2] = sector as u8;
            header[slot + 3] = sectors as u8;

            body.extend_from_slice(&run);
            sector += sectors as u32;
        }

        let mut out = header;
        out.extend_from_slice(&body);
        out
    }
}

/// Linear voxel index for in-section coordinates.
pub fn voxel_index(x: usize, y: usize, z: usize) -> usize {
    y * 256 + z * 16 + x
}
