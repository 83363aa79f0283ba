//! Animation (.anim) writer

use anyhow::Result;
use std::io::Write;

use super::write_record;
use crate::animation::AnimationClip;
use crate::context::ConversionContext;
use h3d_common::{encode_name, AnimationHeader, FrameTransform};

/// Write one sampled clip
///
/// Compressed tracks store a single frame that holds for the whole clip.
pub fn write_animation<W: Write>(
    w: &mut W,
    clip: &AnimationClip,
    ctx: &ConversionContext,
) -> Result<()> {
    let header = AnimationHeader::new(clip.tracks.len() as u32, clip.frame_count);
    write_record(w, &header)?;

    for track in &clip.tracks {
        w.write_all(&encode_name(&ctx.node(track.node).name))?;
        w.write_all(&[u8::from(track.compressed)])?;
        for matrix in &track.frames {
            write_record(w, &FrameTransform::from_matrix(matrix))?;
        }
    }

    Ok(())
}
