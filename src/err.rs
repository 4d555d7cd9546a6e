use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug)]
pub enum WorldError {
    /// The region header is inconsistent with the file's size.
    CorruptRegion(String),
    /// A chunk's compressed stream or packed index data is damaged.
    CorruptChunk(String),
    /// Compression tag with no available codec (tag 4, or tag 127 without
    /// an injected external codec).
    UnsupportedCompression(u8),
    /// The decoded chunk tree is missing required fields or has an empty
    /// palette.
    MalformedChunk(String),
    Io(std::io::Error),
}

impl Display for WorldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::CorruptRegion(v) => write!(f, "Corrupt region: {}", v),
            WorldError::CorruptChunk(v) => write!(f, "Corrupt chunk: {}", v),
            WorldError::UnsupportedCompression(tag) => {
                write!(f, "Unsupported compression tag: {}", tag)
            }
            WorldError::MalformedChunk(v) => write!(f, "Malformed chunk: {}", v),
            WorldError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl Error for WorldError {}

impl From<std::io::Error> for WorldError {
    fn from(e: std::io::Error) -> Self {
        WorldError::Io(e)
    }
}
