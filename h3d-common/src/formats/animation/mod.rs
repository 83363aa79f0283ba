//! Animation binary format (.anim)
//!
//! Sampled per-node transforms for one animation clip. Tracks for joints
//! come first, followed by tracks for meshes, each matched to a scene graph
//! node by name.
//!
//! # Layout
//! ```text
//! Header (16 bytes):
//! 0x00: magic [u8; 4]        - "H3DA"
//! 0x04: version u32          - 3
//! 0x08: node_count u32       - Number of animated nodes
//! 0x0C: frame_count u32      - Frames in the clip
//!
//! Per node:
//!     name [u8; 256]
//!     compressed u8          - 1: one stored frame stands for every frame
//!     frames                 - 1 or frame_count × 40 bytes:
//!                              rotation [f32; 4] (x, y, z, w)
//!                              translation [f32; 3]
//!                              scale [f32; 3]
//! ```

mod file;
mod header;
mod types;


pub use file::{AnimationFile, AnimationTrack};
pub use header::{AnimationHeader, ANIMATION_MAGIC, ANIMATION_VERSION};
pub use types::FrameTransform;
