use std::array;

use log::warn;
use serde::Deserialize;

use crate::err::WorldError;
use crate::section::Section;
use crate::{MAX_SECTION_Y, MIN_SECTION_Y, SECTION_COUNT};

/// Root of a chunk's decompressed NBT payload. Transient: consumed while
/// building a [`Chunk`].
#[derive(Debug, Deserialize)]
pub(crate) struct ChunkEnvelope {
    #[serde(rename = "xPos")]
    pub(crate) x_pos: i32,
    #[serde(rename = "zPos")]
    pub(crate) z_pos: i32,
    pub(crate) sections: Vec<SectionRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SectionRecord {
    #[serde(rename = "Y")]
    pub(crate) y: i8,
    pub(crate) block_states: Option<BlockStates>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlockStates {
    pub(crate) palette: Vec<PaletteEntry>,
    pub(crate) data: Option<fastnbt::LongArray>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaletteEntry {
    #[serde(rename = "Name")]
    pub(crate) name: String,
}

pub(crate) fn decode_envelope(payload: &[u8]) -> Result<ChunkEnvelope, WorldError> {
    fastnbt::from_bytes(payload).map_err(|e| WorldError::MalformedChunk(e.to_string()))
}

/// A vertical column of the world: 24 optional sections at Y slots -4..=19.
#[derive(Debug)]
pub struct Chunk {
    x_pos: i32,
    z_pos: i32,
    sections: [Option<Section>; SECTION_COUNT],
}

impl Chunk {
    pub(crate) fn from_envelope(env: ChunkEnvelope) -> Result<Self, WorldError> {
        let mut sections: [Option<Section>; SECTION_COUNT] = array::from_fn(|_| None);
        for record in env.sections {
            // A record without block_states carries no geometry; its slot
            // stays absent.
            let Some(states) = record.block_states else {
                continue;
            };
            let y = record.y as i32;
            if !(MIN_SECTION_Y..=MAX_SECTION_Y).contains(&y) {
                // Some worlds carry a padding section below the column.
                warn!(
                    "chunk ({}, {}): skipping section at Y {} outside the column",
                    env.x_pos, env.z_pos, y
                );
                continue;
            }
            let slot = (y - MIN_SECTION_Y) as usize;
            if sections[slot].is_some() {
                warn!(
                    "chunk ({}, {}): duplicate section at Y {}, keeping the later one",
                    env.x_pos, env.z_pos, y
                );
            }
            sections[slot] = Some(Section::decode(states)?);
        }
        Ok(Chunk {
            x_pos: env.x_pos,
            z_pos: env.z_pos,
            sections,
        })
    }

    pub fn x_pos(&self) -> i32 {
        self.x_pos
    }

    pub fn z_pos(&self) -> i32 {
        self.z_pos
    }

    /// Section at vertical slot `y`, `None` if out of range or unset.
    pub fn section(&self, y: i32) -> Option<&Section> {
        if !(MIN_SECTION_Y..=MAX_SECTION_Y).contains(&y) {
            return None;
        }
        self.sections[(y - MIN_SECTION_Y) as usize].as_ref()
    }

    pub(crate) fn section_slot(&self, slot: usize) -> Option<&Section> {
        self.sections[slot].as_ref()
    }

    /// Present sections as `(Y, section)` pairs, Y ascending.
    pub fn sections(&self) -> impl Iterator<Item = (i32, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .filter_map(|(slot, section)| {
                section.as_ref().map(|s| (slot as i32 + MIN_SECTION_Y, s))
            })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn envelope(sections: Vec<SectionRecord>) -> ChunkEnvelope {
        ChunkEnvelope {
            x_pos: 3,
            z_pos: -7,
            sections,
        }
    }

    fn record(y: i8, palette: &[&str]) -> SectionRecord {
        SectionRecord {
            y,
            block_states: Some(BlockStates {
                palette: palette
                    .iter()
                    .map(|name| PaletteEntry {
                        name: name.to_string(),
                    })
                    .collect(),
                data: None,
            }),
        }
    }

    #[test]
    fn test_sections_land_on_their_slots() {
        let chunk = Chunk::from_envelope(envelope(vec![
            record(-4, &["minecraft:bedrock"]),
            record(0, &["minecraft:stone"]),
            record(19, &["minecraft:air"]),
        ]))
        .unwrap();
        assert_eq!(chunk.x_pos(), 3);
        assert_eq!(chunk.z_pos(), -7);
        assert_eq!(chunk.section(-4).unwrap().palette()[0].as_ref(), "minecraft:bedrock");
        assert_eq!(chunk.section(0).unwrap().palette()[0].as_ref(), "minecraft:stone");
        assert!(chunk.section(1).is_none());
        assert!(chunk.section(20).is_none());
        assert!(chunk.section(-5).is_none());

        let ys: Vec<i32> = chunk.sections().map(|(y, _)| y).collect();
        assert_eq!(ys, vec![-4, 0, 19]);
    }

    #[test]
    fn test_out_of_range_section_is_skipped() {
        let chunk = Chunk::from_envelope(envelope(vec![
            record(-5, &["minecraft:void_air"]),
            record(0, &["minecraft:stone"]),
        ]))
        .unwrap();
        assert_eq!(chunk.sections().count(), 1);
    }

    #[test]
    fn test_record_without_block_states_stays_absent() {
        let chunk = Chunk::from_envelope(envelope(vec![SectionRecord {
            y: 2,
            block_states: None,
        }]))
        .unwrap();
        assert!(chunk.section(2).is_none());
        assert_eq!(chunk.sections().count(), 0);
    }

    #[test]
    fn test_missing_position_fields_are_malformed() {
        // An envelope is only valid with xPos, zPos and sections present.
        let payload = fastnbt::to_bytes(&fastnbt::nbt!({ "xPos": 1 })).unwrap();
        let err = decode_envelope(&payload).unwrap_err();
        assert!(matches!(err, WorldError::MalformedChunk(_)));
    }
}
