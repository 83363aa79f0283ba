//! Decoded animation files

use super::{AnimationHeader, FrameTransform};
use crate::formats::reader::ByteReader;
use crate::formats::{decode_name, FormatError, NAME_FIELD_SIZE};

/// Sampled frames for one node
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationTrack {
    pub name: String,
    /// One stored frame stands for every frame of the clip
    pub compressed: bool,
    pub frames: Vec<FrameTransform>,
}

impl AnimationTrack {
    /// Transform at a frame index
    ///
    /// Compressed tracks return their single stored frame for any index.
    pub fn frame(&self, index: usize) -> Option<&FrameTransform> {
        if self.compressed {
            self.frames.first()
        } else {
            self.frames.get(index)
        }
    }
}

/// Fully decoded animation file
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFile {
    pub frame_count: u32,
    pub tracks: Vec<AnimationTrack>,
}

impl AnimationFile {
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(data);
        let header = AnimationHeader::from_bytes(r.take(AnimationHeader::SIZE)?).ok_or(
            FormatError::UnexpectedEof {
                offset: 0,
                needed: AnimationHeader::SIZE,
            },
        )?;
        header.validate()?;

        let mut tracks = Vec::new();
        for _ in 0..header.node_count {
            let name = decode_name(r.take(NAME_FIELD_SIZE)?)?;
            let compressed = r.u8()? != 0;
            let stored = if compressed { 1 } else { header.frame_count };
            let frames = r.elements(stored, FrameTransform::SIZE, |r| {
                let bytes = r.take(FrameTransform::SIZE)?;
                Ok(FrameTransform::from_bytes(bytes).unwrap_or_default())
            })?;
            tracks.push(AnimationTrack {
                name,
                compressed,
                frames,
            });
        }

        Ok(Self {
            frame_count: header.frame_count,
            tracks,
        })
    }

    /// Find a track by node name
    pub fn track(&self, name: &str) -> Option<&AnimationTrack> {
        self.tracks.iter().find(|track| track.name == name)
    }
}
