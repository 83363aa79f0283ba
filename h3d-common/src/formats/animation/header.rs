//! Animation header structure and operations

use crate::formats::FormatError;

/// Magic bytes at the start of every animation file
pub const ANIMATION_MAGIC: [u8; 4] = *b"H3DA";
/// Current animation format version
pub const ANIMATION_VERSION: u32 = 3;

/// Animation file header (16 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// Number of node tracks that follow
    pub node_count: u32,
    /// Total number of frames in the clip
    pub frame_count: u32,
}

impl AnimationHeader {
    pub const SIZE: usize = 16;

    pub fn new(node_count: u32, frame_count: u32) -> Self {
        Self {
            magic: ANIMATION_MAGIC,
            version: ANIMATION_VERSION,
            node_count,
            frame_count,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.node_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.frame_count.to_le_bytes());
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        Some(Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: word(4),
            node_count: word(8),
            frame_count: word(12),
        })
    }

    /// Check magic and version
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.magic != ANIMATION_MAGIC {
            return Err(FormatError::BadMagic {
                expected: ANIMATION_MAGIC,
                found: self.magic,
            });
        }
        if self.version != ANIMATION_VERSION {
            return Err(FormatError::UnsupportedVersion {
                expected: ANIMATION_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }
}
