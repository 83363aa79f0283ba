//! Horde3D runtime asset formats
//!
//! - `.geo` - joint matrices, vertex streams, triangle indices and morph targets
//! - `.anim` - per-node sampled transforms
//! - `.scene.xml` - the node hierarchy referencing both (text, written by the exporter)
//!
//! All binary values are little-endian. Names are stored in fixed 256-byte,
//! NUL-padded fields.

mod animation;
mod error;
mod geometry;
mod reader;
mod serialization;

pub use animation::{
    AnimationFile, AnimationHeader, AnimationTrack, FrameTransform, ANIMATION_MAGIC,
    ANIMATION_VERSION,
};
pub use error::FormatError;
pub use geometry::{
    GeometryFile, GeometryHeader, MorphStream, MorphTargetData, VertexStream, GEOMETRY_MAGIC,
    GEOMETRY_VERSION, MORPH_STREAM_COUNT,
};
pub use serialization::BinarySerializable;

/// File extension for geometry files
pub const GEOMETRY_EXT: &str = "geo";
/// File extension for animation files
pub const ANIMATION_EXT: &str = "anim";
/// File extension for scene graph files
pub const SCENE_GRAPH_EXT: &str = "scene.xml";

/// Size of a fixed name field in geometry and animation files
pub const NAME_FIELD_SIZE: usize = 256;
/// Longest name that fits a name field with its terminating NUL
pub const MAX_NAME_LEN: usize = NAME_FIELD_SIZE - 1;

/// Encode a name into a NUL-padded fixed field
///
/// Names longer than [`MAX_NAME_LEN`] bytes are cut at the byte limit.
pub fn encode_name(name: &str) -> [u8; NAME_FIELD_SIZE] {
    let mut field = [0u8; NAME_FIELD_SIZE];
    let bytes = name.as_bytes();
    let len = bytes.len().min(MAX_NAME_LEN);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Decode a NUL-padded name field
pub fn decode_name(field: &[u8]) -> Result<String, FormatError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end])
        .map(str::to_owned)
        .map_err(|_| FormatError::InvalidName)
}
